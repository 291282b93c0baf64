use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::city::CityRead;
use super::deserialize_some;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightStatus {
    #[default]
    Scheduled,
    Boarding,
    Departed,
    Arrived,
    Delayed,
    Canceled,
}

impl FlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightStatus::Scheduled => "scheduled",
            FlightStatus::Boarding => "boarding",
            FlightStatus::Departed => "departed",
            FlightStatus::Arrived => "arrived",
            FlightStatus::Delayed => "delayed",
            FlightStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlightStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scheduled" => Ok(FlightStatus::Scheduled),
            "boarding" => Ok(FlightStatus::Boarding),
            "departed" => Ok(FlightStatus::Departed),
            "arrived" => Ok(FlightStatus::Arrived),
            "delayed" => Ok(FlightStatus::Delayed),
            "canceled" => Ok(FlightStatus::Canceled),
            other => Err(format!("unknown flight status: {}", other)),
        }
    }
}

/// Stored flight between two cities
#[derive(Debug, Clone)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub airline: String,
    pub description: Option<String>,
    pub origin_city_id: Uuid,
    pub destination_city_id: Uuid,
    pub status: FlightStatus,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FlightCreate {
    #[validate(length(min = 1, max = 20, message = "Flight number must be 1-20 characters"))]
    pub flight_number: String,

    #[validate(length(min = 1, max = 100, message = "Airline must be 1-100 characters"))]
    pub airline: String,

    pub description: Option<String>,
    pub origin_city_id: Uuid,
    pub destination_city_id: Uuid,

    #[serde(default)]
    pub status: FlightStatus,

    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct FlightUpdate {
    #[validate(length(min = 1, max = 20, message = "Flight number must be 1-20 characters"))]
    pub flight_number: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Airline must be 1-100 characters"))]
    pub airline: Option<String>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,

    pub origin_city_id: Option<Uuid>,
    pub destination_city_id: Option<Uuid>,
    pub status: Option<FlightStatus>,
    pub departure: Option<DateTime<Utc>>,
    pub arrival: Option<DateTime<Utc>>,
}

impl FlightUpdate {
    /// The city ids this update would point the flight at, if any
    pub fn referenced_cities(&self) -> Vec<Uuid> {
        self.origin_city_id
            .into_iter()
            .chain(self.destination_city_id)
            .collect()
    }
}

/// Flight view with both endpoint cities expanded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightRead {
    pub id: Uuid,
    pub flight_number: String,
    pub airline: String,
    pub description: Option<String>,
    pub origin_city_id: Uuid,
    pub destination_city_id: Uuid,
    pub status: FlightStatus,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub origin: CityRead,
    pub destination: CityRead,
}

impl FlightRead {
    pub fn assemble(flight: Flight, origin: CityRead, destination: CityRead) -> Self {
        Self {
            id: flight.id,
            flight_number: flight.flight_number,
            airline: flight.airline,
            description: flight.description,
            origin_city_id: flight.origin_city_id,
            destination_city_id: flight.destination_city_id,
            status: flight.status,
            departure: flight.departure,
            arrival: flight.arrival,
            created_at: Some(flight.created_at),
            updated_at: Some(flight.updated_at),
            origin,
            destination,
        }
    }
}
