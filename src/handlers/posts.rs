use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::current_user;
use crate::error::AppResult;
use crate::models::{CommentCreate, CommentUpdate, PageParams, PostCreate, PostFilter, PostUpdate};
use crate::services::{CommentService, PostService, UserService};
use crate::utils::parse_id;

const POST_NOT_FOUND: &str = "Post not found";
const COMMENT_NOT_FOUND: &str = "Comment not found";

fn comment_path(path: web::Path<(String, String)>) -> AppResult<(Uuid, Uuid)> {
    let (post_id, comment_id) = path.into_inner();
    // Comment lookup precedes the post ownership check.
    let comment_id = parse_id(&comment_id, COMMENT_NOT_FOUND)?;
    let post_id = parse_id(&post_id, POST_NOT_FOUND)?;
    Ok((post_id, comment_id))
}

pub async fn list_posts(
    page: web::Query<PageParams>,
    filter: web::Query<PostFilter>,
    posts: web::Data<Arc<PostService>>,
) -> AppResult<HttpResponse> {
    page.validate()?;
    Ok(HttpResponse::Ok().json(posts.list(&page, &filter).await?))
}

pub async fn get_post(path: web::Path<String>, posts: web::Data<Arc<PostService>>) -> AppResult<HttpResponse> {
    let id = parse_id(&path, POST_NOT_FOUND)?;
    Ok(HttpResponse::Ok().json(posts.get(id).await?))
}

pub async fn create_post(
    req: HttpRequest,
    payload: web::Json<PostCreate>,
    posts: web::Data<Arc<PostService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req, &users).await?;
    payload.validate()?;

    let post = posts.create(&user, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(post))
}

pub async fn update_post(
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<PostUpdate>,
    posts: web::Data<Arc<PostService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req, &users).await?;
    let id = parse_id(&path, POST_NOT_FOUND)?;
    payload.validate()?;

    Ok(HttpResponse::Ok().json(posts.update(id, &user, payload.into_inner()).await?))
}

pub async fn delete_post(
    req: HttpRequest,
    path: web::Path<String>,
    posts: web::Data<Arc<PostService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req, &users).await?;
    let id = parse_id(&path, POST_NOT_FOUND)?;
    posts.delete(id, &user).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Post successfully deleted" })))
}

pub async fn restore_post(
    req: HttpRequest,
    path: web::Path<String>,
    posts: web::Data<Arc<PostService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req, &users).await?;
    let id = parse_id(&path, "Post not found or was not deleted")?;
    Ok(HttpResponse::Ok().json(posts.restore(id, &user).await?))
}

pub async fn toggle_like(
    req: HttpRequest,
    path: web::Path<String>,
    posts: web::Data<Arc<PostService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req, &users).await?;
    let id = parse_id(&path, POST_NOT_FOUND)?;
    Ok(HttpResponse::Ok().json(posts.toggle_like(id, &user).await?))
}

pub async fn create_comment(
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<CommentCreate>,
    comments: web::Data<Arc<CommentService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req, &users).await?;
    let post_id = parse_id(&path, POST_NOT_FOUND)?;
    payload.validate()?;

    let comment = comments.create(post_id, &user, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(comment))
}

pub async fn update_comment(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    payload: web::Json<CommentUpdate>,
    comments: web::Data<Arc<CommentService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req, &users).await?;
    let (post_id, comment_id) = comment_path(path)?;
    payload.validate()?;

    let comment = comments
        .update(post_id, comment_id, &user, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(comment))
}

pub async fn delete_comment(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    comments: web::Data<Arc<CommentService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req, &users).await?;
    let (post_id, comment_id) = comment_path(path)?;
    comments.delete(post_id, comment_id, &user).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Comment successfully deleted" })))
}

pub async fn restore_comment(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    comments: web::Data<Arc<CommentService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req, &users).await?;
    let (post_id, comment_id) = comment_path(path)?;
    comments.restore(post_id, comment_id, &user).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Comment successfully restored" })))
}
