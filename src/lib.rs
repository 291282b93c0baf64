pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

// Items are reached through their module paths, e.g. `crate::models::CityRead`
// or `crate::services::PostService`.
