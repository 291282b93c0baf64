use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use validator::Validate;

use super::current_user;
use crate::error::AppResult;
use crate::models::{FlightCreate, FlightUpdate, PageParams};
use crate::services::{FlightService, UserService};
use crate::utils::parse_id;

const FLIGHT_NOT_FOUND: &str = "Flight not found";

pub async fn list_flights(
    query: web::Query<PageParams>,
    flights: web::Data<Arc<FlightService>>,
) -> AppResult<HttpResponse> {
    query.validate()?;
    Ok(HttpResponse::Ok().json(flights.list(&query).await?))
}

pub async fn get_flight(
    path: web::Path<String>,
    flights: web::Data<Arc<FlightService>>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, FLIGHT_NOT_FOUND)?;
    Ok(HttpResponse::Ok().json(flights.get(id).await?))
}

pub async fn create_flight(
    req: HttpRequest,
    payload: web::Json<FlightCreate>,
    flights: web::Data<Arc<FlightService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    current_user(&req, &users).await?;
    payload.validate()?;

    let flight = flights.create(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(flight))
}

pub async fn update_flight(
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<FlightUpdate>,
    flights: web::Data<Arc<FlightService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    current_user(&req, &users).await?;
    let id = parse_id(&path, FLIGHT_NOT_FOUND)?;
    payload.validate()?;

    Ok(HttpResponse::Ok().json(flights.update(id, payload.into_inner()).await?))
}

pub async fn delete_flight(
    req: HttpRequest,
    path: web::Path<String>,
    flights: web::Data<Arc<FlightService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    current_user(&req, &users).await?;
    let id = parse_id(&path, FLIGHT_NOT_FOUND)?;
    flights.delete(id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Flight successfully deleted" })))
}

pub async fn restore_flight(
    req: HttpRequest,
    path: web::Path<String>,
    flights: web::Data<Arc<FlightService>>,
    users: web::Data<Arc<UserService>>,
) -> AppResult<HttpResponse> {
    current_user(&req, &users).await?;
    let id = parse_id(&path, "Flight not found or was not deleted")?;
    Ok(HttpResponse::Ok().json(flights.restore(id).await?))
}
