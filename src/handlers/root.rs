use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::config::AppSettings;
use crate::database::DatabaseService;

/// Welcome message with the running status
pub async fn index(settings: web::Data<AppSettings>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": format!("Welcome to {}", settings.project_name),
        "status": settings.app_status,
    }))
}

/// Health check endpoint
pub async fn health(db: Option<web::Data<Arc<DatabaseService>>>) -> HttpResponse {
    if let Some(db) = db {
        if let Err(e) = db.ping().await {
            log::warn!("Health check failed: {}", e);
            return HttpResponse::ServiceUnavailable().json(serde_json::json!({ "status": "unhealthy" }));
        }
    }
    HttpResponse::Ok().json(serde_json::json!({ "status": "healthy" }))
}
