pub mod city;
pub mod flight;
pub mod pagination;
pub mod post;
pub mod user;

use serde::{Deserialize, Deserializer};

pub use city::{City, CityCreate, CityRead, CityUpdate, Photo, PhotoBase, PhotoRead, Review, ReviewCreate, ReviewRead, ReviewUpdate};
pub use flight::{Flight, FlightCreate, FlightRead, FlightStatus, FlightUpdate};
pub use pagination::{Page, PageParams};
pub use post::{Comment, CommentCreate, CommentRead, CommentUpdate, Post, PostCreate, PostFilter, PostRead, PostUpdate};
pub use user::{AuthResponse, LoginRequest, RefreshRequest, Token, TokenForm, User, UserCreate, UserOut, UserRead};

/// Deserialize a present field as `Some`, so `Option<Option<T>>` can tell
/// an explicit `null` (`Some(None)`) from an absent key (`None`).
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
