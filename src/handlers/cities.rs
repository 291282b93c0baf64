use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use validator::Validate;

use super::current_user;
use crate::error::{AppError, AppResult};
use crate::models::{CityCreate, CityUpdate, PageParams, PhotoBase, ReviewCreate, ReviewUpdate};
use crate::services::{CityService, UserService};
use crate::utils::{flatten_validation_errors, parse_id};

const CITY_NOT_FOUND: &str = "City not found";

fn validate_photos(photos: &[PhotoBase]) -> AppResult<()> {
    let messages: Vec<String> = photos
        .iter()
        .filter_map(|p| p.validate().err())
        .flat_map(|e| flatten_validation_errors(&e))
        .collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(messages))
    }
}

pub async fn list_cities(
    query: web::Query<PageParams>,
    cities: web::Data<Arc<CityService>>,
) -> AppResult<HttpResponse> {
    query.validate()?;
    Ok(HttpResponse::Ok().json(cities.list(&query).await?))
}

pub async fn get_city(path: web::Path<String>, cities: web::Data<Arc<CityService>>) -> AppResult<HttpResponse> {
    let id = parse_id(&path, CITY_NOT_FOUND)?;
    Ok(HttpResponse::Ok().json(cities.get(id).await?))
}

pub async fn create_city(
    req: HttpRequest,
    payload: web::Json<CityCreate>,
    cities: web::Data<Arc<CityService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    current_user(&req, &users).await?;
    payload.validate()?;
    validate_photos(&payload.photos)?;

    let city = cities.create(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(city))
}

pub async fn update_city(
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<CityUpdate>,
    cities: web::Data<Arc<CityService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    current_user(&req, &users).await?;
    let id = parse_id(&path, CITY_NOT_FOUND)?;
    payload.validate()?;
    validate_photos(payload.photos.as_deref().unwrap_or_default())?;

    Ok(HttpResponse::Ok().json(cities.update(id, payload.into_inner()).await?))
}

pub async fn delete_city(
    req: HttpRequest,
    path: web::Path<String>,
    cities: web::Data<Arc<CityService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    current_user(&req, &users).await?;
    let id = parse_id(&path, CITY_NOT_FOUND)?;
    cities.delete(id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "City successfully deleted",
        "data": {},
    })))
}

pub async fn restore_city(
    req: HttpRequest,
    path: web::Path<String>,
    cities: web::Data<Arc<CityService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    current_user(&req, &users).await?;
    let id = parse_id(&path, "City not found or was not deleted")?;
    Ok(HttpResponse::Ok().json(cities.restore(id).await?))
}

pub async fn add_review(
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<ReviewCreate>,
    cities: web::Data<Arc<CityService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req, &users).await?;
    let city_id = parse_id(&path, CITY_NOT_FOUND)?;
    payload.validate()?;

    let review = cities.add_review(city_id, &user, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(review))
}

pub async fn update_review(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    payload: web::Json<ReviewUpdate>,
    cities: web::Data<Arc<CityService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    let user = current_user(&req, &users).await?;
    let (city_id, review_id) = path.into_inner();
    let city_id = parse_id(&city_id, "Review not found")?;
    let review_id = parse_id(&review_id, "Review not found")?;
    payload.validate()?;

    let review = cities
        .update_review(city_id, review_id, &user, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(review))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_errors_are_collected() {
        let photos = vec![
            PhotoBase {
                url: "https://img/ok.jpg".to_string(),
                caption: None,
                position: 0,
            },
            PhotoBase {
                url: String::new(),
                caption: Some("c".repeat(201)),
                position: -2,
            },
        ];
        match validate_photos(&photos) {
            Err(AppError::Validation(messages)) => assert_eq!(messages.len(), 3),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(validate_photos(&[]).is_ok());
    }
}
