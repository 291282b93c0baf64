mod cities;
mod comments;
mod flights;
mod posts;
mod users;

pub use cities::CityService;
pub use comments::CommentService;
pub use flights::FlightService;
pub use posts::PostService;
pub use users::UserService;
