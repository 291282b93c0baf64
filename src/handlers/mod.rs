pub mod auth;
pub mod cities;
pub mod docs;
pub mod flights;
pub mod posts;
pub mod root;


use actix_web::{web, HttpMessage, HttpRequest};

use crate::auth::{extract_token_from_request, Claims};
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::services::UserService;

/// Register every API route plus the extractor error handlers that turn
/// malformed bodies, forms and query strings into 422 responses.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::Validation(vec![err.to_string()]).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::Validation(vec![err.to_string()]).into()),
    )
    .app_data(
        web::FormConfig::default()
            .error_handler(|err, _req| AppError::Validation(vec![err.to_string()]).into()),
    )
    .route("/", web::get().to(root::index))
    .route("/health", web::get().to(root::health))
    .service(
        web::scope("/auth")
            .route("/register", web::post().to(auth::register))
            .route("/login", web::post().to(auth::login))
            .route("/token", web::post().to(auth::token))
            .route("/refresh", web::post().to(auth::refresh)),
    )
    .service(
        web::scope("/cities")
            .route("", web::get().to(cities::list_cities))
            .route("/", web::get().to(cities::list_cities))
            .route("", web::post().to(cities::create_city))
            .route("/", web::post().to(cities::create_city))
            .route("/{city_id}", web::get().to(cities::get_city))
            .route("/{city_id}", web::patch().to(cities::update_city))
            .route("/{city_id}", web::delete().to(cities::delete_city))
            .route("/{city_id}/restore", web::post().to(cities::restore_city))
            .route("/{city_id}/reviews", web::post().to(cities::add_review))
            .route("/{city_id}/reviews/{review_id}", web::patch().to(cities::update_review)),
    )
    .service(
        web::scope("/flights")
            .route("", web::get().to(flights::list_flights))
            .route("/", web::get().to(flights::list_flights))
            .route("", web::post().to(flights::create_flight))
            .route("/", web::post().to(flights::create_flight))
            .route("/{flight_id}", web::get().to(flights::get_flight))
            .route("/{flight_id}", web::patch().to(flights::update_flight))
            .route("/{flight_id}", web::delete().to(flights::delete_flight))
            .route("/{flight_id}/restore", web::post().to(flights::restore_flight)),
    )
    .service(
        web::scope("/posts")
            .route("", web::get().to(posts::list_posts))
            .route("/", web::get().to(posts::list_posts))
            .route("", web::post().to(posts::create_post))
            .route("/", web::post().to(posts::create_post))
            .route("/{post_id}", web::get().to(posts::get_post))
            .route("/{post_id}", web::patch().to(posts::update_post))
            .route("/{post_id}", web::delete().to(posts::delete_post))
            .route("/{post_id}/restore", web::post().to(posts::restore_post))
            .route("/{post_id}/toggle-like", web::post().to(posts::toggle_like))
            .route("/{post_id}/comments", web::post().to(posts::create_comment))
            .route("/{post_id}/comments/{comment_id}", web::patch().to(posts::update_comment))
            .route("/{post_id}/comments/{comment_id}/delete", web::delete().to(posts::delete_comment))
            .route("/{post_id}/comments/{comment_id}/restore", web::post().to(posts::restore_comment)),
    );
}

/// Resolve the caller. Claims attached by the auth middleware are used
/// when present; otherwise the bearer token is verified here.
pub(crate) async fn current_user(req: &HttpRequest, users: &UserService) -> AppResult<User> {
    let attached = req.extensions().get::<Claims>().cloned();
    let claims = match attached {
        Some(claims) => claims,
        None => {
            let token = extract_token_from_request(req).ok_or_else(AppError::invalid_credentials)?;
            users
                .auth
                .verify_access(&token)
                .map_err(|_| AppError::invalid_credentials())?
        }
    };
    users.current_user(&claims).await
}
