use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;

use crate::error::AppResult;
use crate::models::{LoginRequest, RefreshRequest, TokenForm, UserCreate};
use crate::services::UserService;

/// Register user endpoint
pub async fn register(
    payload: web::Json<UserCreate>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    payload.validate()?;
    let response = users.register(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Login user endpoint
pub async fn login(
    payload: web::Json<LoginRequest>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    payload.validate()?;
    let response = users.login(&payload.email, &payload.password).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// OAuth2 password flow; `username` carries the email
pub async fn token(
    form: web::Form<TokenForm>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let token = users.issue_token(&form.username, &form.password).await?;
    Ok(HttpResponse::Ok().json(token))
}

/// Refresh token endpoint
pub async fn refresh(
    payload: web::Json<RefreshRequest>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    payload.validate()?;
    let token = users.refresh(&payload.refresh_token).await?;
    Ok(HttpResponse::Ok().json(token))
}
