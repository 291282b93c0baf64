use std::collections::HashMap;
use uuid::Uuid;

use super::DatabaseService;
use crate::error::AppResult;
use crate::models::{Flight, FlightCreate, FlightUpdate};

const FLIGHT_COLUMNS: &str = "id, flight_number, airline, description, origin_city_id, destination_city_id, \
                              status, departure, arrival, created_at, updated_at, deleted_at";

impl DatabaseService {
    pub async fn count_flights(&self) -> AppResult<i64> {
        let client = self.get_client().await?;
        let row = client
            .query_one("SELECT COUNT(*) FROM flights WHERE deleted_at IS NULL", &[])
            .await?;
        Ok(row.get(0))
    }

    /// Live flights ordered by departure
    pub async fn list_flights(&self, limit: i64, offset: i64) -> AppResult<Vec<Flight>> {
        let client = self.get_client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM flights WHERE deleted_at IS NULL ORDER BY departure, id LIMIT $1 OFFSET $2",
                    FLIGHT_COLUMNS
                ),
                &[&limit, &offset],
            )
            .await?;
        Ok(rows.iter().map(row_to_flight).collect())
    }

    /// Get a flight that has not been soft-deleted
    pub async fn get_flight(&self, id: Uuid) -> AppResult<Option<Flight>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM flights WHERE id = $1 AND deleted_at IS NULL", FLIGHT_COLUMNS),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_flight))
    }

    /// Flights by id regardless of deletion, for embedding into posts
    pub async fn get_flights_by_ids(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Flight>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let client = self.get_client().await?;
        let rows = client
            .query(&format!("SELECT {} FROM flights WHERE id = ANY($1)", FLIGHT_COLUMNS), &[&ids])
            .await?;
        Ok(rows.iter().map(row_to_flight).map(|f| (f.id, f)).collect())
    }

    pub async fn flight_number_taken(&self, flight_number: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let client = self.get_client().await?;
        let row = client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM flights WHERE flight_number = $1 AND ($2::uuid IS NULL OR id <> $2))",
                &[&flight_number, &exclude],
            )
            .await?;
        Ok(row.get(0))
    }

    pub async fn create_flight(&self, flight: &FlightCreate) -> AppResult<Flight> {
        let client = self.get_client().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO flights (flight_number, airline, description, origin_city_id, destination_city_id, \
                                          status, departure, arrival) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
                    FLIGHT_COLUMNS
                ),
                &[
                    &flight.flight_number,
                    &flight.airline,
                    &flight.description,
                    &flight.origin_city_id,
                    &flight.destination_city_id,
                    &flight.status.as_str(),
                    &flight.departure,
                    &flight.arrival,
                ],
            )
            .await?;
        Ok(row_to_flight(&row))
    }

    /// Apply a partial update to a live flight
    pub async fn update_flight(&self, id: Uuid, update: &FlightUpdate) -> AppResult<Option<Flight>> {
        let client = self.get_client().await?;

        let description = update.description.as_ref().and_then(|d| d.as_deref());
        let status = update.status.map(|s| s.as_str());

        let row = client
            .query_opt(
                &format!(
                    "UPDATE flights SET \
                        flight_number = COALESCE($2::varchar, flight_number), \
                        airline = COALESCE($3::varchar, airline), \
                        description = CASE WHEN $4::bool THEN $5::text ELSE description END, \
                        origin_city_id = COALESCE($6::uuid, origin_city_id), \
                        destination_city_id = COALESCE($7::uuid, destination_city_id), \
                        status = COALESCE($8::varchar, status), \
                        departure = COALESCE($9::timestamptz, departure), \
                        arrival = COALESCE($10::timestamptz, arrival), \
                        updated_at = NOW() \
                     WHERE id = $1 AND deleted_at IS NULL \
                     RETURNING {}",
                    FLIGHT_COLUMNS
                ),
                &[
                    &id,
                    &update.flight_number,
                    &update.airline,
                    &update.description.is_some(),
                    &description,
                    &update.origin_city_id,
                    &update.destination_city_id,
                    &status,
                    &update.departure,
                    &update.arrival,
                ],
            )
            .await?;
        Ok(row.as_ref().map(row_to_flight))
    }

    pub async fn soft_delete_flight(&self, id: Uuid) -> AppResult<bool> {
        let client = self.get_client().await?;
        let affected = client
            .execute(
                "UPDATE flights SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
                &[&id],
            )
            .await?;
        Ok(affected == 1)
    }

    pub async fn restore_flight(&self, id: Uuid) -> AppResult<Option<Flight>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE flights SET deleted_at = NULL, updated_at = NOW() \
                     WHERE id = $1 AND deleted_at IS NOT NULL RETURNING {}",
                    FLIGHT_COLUMNS
                ),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_flight))
    }
}

fn row_to_flight(row: &tokio_postgres::Row) -> Flight {
    let status: String = row.get(6);
    Flight {
        id: row.get(0),
        flight_number: row.get(1),
        airline: row.get(2),
        description: row.get(3),
        origin_city_id: row.get(4),
        destination_city_id: row.get(5),
        // the CHECK constraint keeps this column to known values
        status: status.parse().unwrap_or_default(),
        departure: row.get(7),
        arrival: row.get(8),
        created_at: row.get(9),
        updated_at: row.get(10),
        deleted_at: row.get(11),
    }
}
