use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::cities::load_city_reads;
use crate::database::{distinct_ids, is_unique_violation, DatabaseService};
use crate::error::{AppError, AppResult};
use crate::models::{CityRead, Flight, FlightCreate, FlightRead, FlightUpdate, Page, PageParams};

const FLIGHT_NOT_FOUND: &str = "Flight not found";
const DUPLICATE_NUMBER: &str = "Flight with this flight number already exists.";
const CITY_MISSING: &str = "Origin or destination city not found.";

/// Expand both endpoint cities for a batch of flights
pub(crate) async fn load_flight_reads(db: &DatabaseService, flights: Vec<Flight>) -> AppResult<Vec<FlightRead>> {
    let city_ids = distinct_ids(
        flights
            .iter()
            .flat_map(|f| [f.origin_city_id, f.destination_city_id]),
    );
    let cities = db.get_cities_by_ids(&city_ids).await?;
    let reads = load_city_reads(db, cities.into_values().collect()).await?;
    let by_id: HashMap<Uuid, CityRead> = reads.into_iter().map(|c| (c.id, c)).collect();

    flights
        .into_iter()
        .map(|flight| {
            let origin = city_for(&by_id, flight.origin_city_id)?;
            let destination = city_for(&by_id, flight.destination_city_id)?;
            Ok(FlightRead::assemble(flight, origin, destination))
        })
        .collect()
}

fn city_for(cities: &HashMap<Uuid, CityRead>, id: Uuid) -> AppResult<CityRead> {
    cities
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::Internal(format!("flight references missing city {}", id)))
}

pub struct FlightService {
    pub db: Arc<DatabaseService>,
}

impl FlightService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn list(&self, params: &PageParams) -> AppResult<Page<FlightRead>> {
        let total = self.db.count_flights().await?;
        let flights = self.db.list_flights(params.limit(), params.offset()).await?;
        let items = load_flight_reads(&self.db, flights).await?;
        Ok(Page::new(items, total, params))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<FlightRead> {
        let flight = self.live_flight(id).await?;
        self.read_one(flight).await
    }

    pub async fn create(&self, payload: FlightCreate) -> AppResult<FlightRead> {
        if self.db.flight_number_taken(&payload.flight_number, None).await? {
            return Err(AppError::bad_request(DUPLICATE_NUMBER));
        }
        if !self
            .db
            .check_cities_exist(&[payload.origin_city_id, payload.destination_city_id])
            .await?
        {
            return Err(AppError::not_found(CITY_MISSING));
        }

        let flight = match self.db.create_flight(&payload).await {
            Ok(flight) => flight,
            Err(AppError::Database(err)) if is_unique_violation(&err) => {
                return Err(AppError::bad_request(DUPLICATE_NUMBER));
            }
            Err(err) => return Err(err),
        };

        log::info!("Flight {} created ({})", flight.flight_number, flight.id);
        self.read_one(flight).await
    }

    pub async fn update(&self, id: Uuid, payload: FlightUpdate) -> AppResult<FlightRead> {
        let current = self.live_flight(id).await?;

        if let Some(number) = payload.flight_number.as_deref() {
            if number != current.flight_number && self.db.flight_number_taken(number, Some(id)).await? {
                return Err(AppError::bad_request(DUPLICATE_NUMBER));
            }
        }

        if !payload.referenced_cities().is_empty() {
            let origin = payload.origin_city_id.unwrap_or(current.origin_city_id);
            let destination = payload.destination_city_id.unwrap_or(current.destination_city_id);
            if !self.db.check_cities_exist(&[origin, destination]).await? {
                return Err(AppError::not_found(CITY_MISSING));
            }
        }

        let updated = match self.db.update_flight(id, &payload).await {
            Ok(Some(flight)) => flight,
            Ok(None) => return Err(AppError::not_found(FLIGHT_NOT_FOUND)),
            Err(AppError::Database(err)) if is_unique_violation(&err) => {
                return Err(AppError::bad_request(DUPLICATE_NUMBER));
            }
            Err(err) => return Err(err),
        };
        self.read_one(updated).await
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        if !self.db.soft_delete_flight(id).await? {
            return Err(AppError::not_found(FLIGHT_NOT_FOUND));
        }
        log::info!("Flight {} soft-deleted", id);
        Ok(())
    }

    pub async fn restore(&self, id: Uuid) -> AppResult<FlightRead> {
        let flight = self
            .db
            .restore_flight(id)
            .await?
            .ok_or_else(|| AppError::not_found("Flight not found or was not deleted"))?;
        self.read_one(flight).await
    }

    async fn live_flight(&self, id: Uuid) -> AppResult<Flight> {
        self.db
            .get_flight(id)
            .await?
            .ok_or_else(|| AppError::not_found(FLIGHT_NOT_FOUND))
    }

    async fn read_one(&self, flight: Flight) -> AppResult<FlightRead> {
        load_flight_reads(&self.db, vec![flight])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("flight vanished while loading".to_string()))
    }
}
