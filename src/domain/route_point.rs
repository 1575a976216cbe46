use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TripId;

pub type PointId = Uuid;

/// Order indexes live in `0..=MAX_ORDER`.
pub const MAX_ORDER: i64 = 1_000_000;

/// A candidate location on the trip's route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePoint {
    pub id: PointId,
    pub trip_id: TripId,
    pub name: String,
    /// Decimal degrees, -90..=90
    pub latitude: f64,
    /// Decimal degrees, -180..=180
    pub longitude: f64,
    pub description: Option<String>,
    /// Position in the itinerary; also the final ranking tie-break
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

impl RoutePoint {
    pub fn new(
        trip_id: TripId,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        order: i64,
    ) -> Result<Self, PointError> {
        validate_coordinates(latitude, longitude)?;
        validate_order(order)?;
        Ok(Self {
            id: Uuid::new_v4(),
            trip_id,
            name: name.into(),
            latitude,
            longitude,
            description: None,
            order,
            created_at: Utc::now(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn move_to(&mut self, latitude: f64, longitude: f64) -> Result<(), PointError> {
        validate_coordinates(latitude, longitude)?;
        self.latitude = latitude;
        self.longitude = longitude;
        Ok(())
    }

    pub fn reorder(&mut self, order: i64) -> Result<(), PointError> {
        validate_order(order)?;
        self.order = order;
        Ok(())
    }
}

/// Order index for a point appended after `points`.
pub fn next_order(points: &[RoutePoint]) -> Result<i64, PointError> {
    let next = points
        .iter()
        .map(|p| p.order.saturating_add(1))
        .max()
        .unwrap_or(0);
    validate_order(next)?;
    Ok(next)
}

pub fn validate_order(order: i64) -> Result<(), PointError> {
    if !(0..=MAX_ORDER).contains(&order) {
        return Err(PointError::OrderOutOfRange(order));
    }
    Ok(())
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), PointError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(PointError::InvalidLatitude(latitude));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(PointError::InvalidLongitude(longitude));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointError {
    InvalidLatitude(f64),
    InvalidLongitude(f64),
    OrderOutOfRange(i64),
}

impl std::fmt::Display for PointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointError::InvalidLatitude(v) => write!(f, "latitude {} is outside -90..90", v),
            PointError::InvalidLongitude(v) => write!(f, "longitude {} is outside -180..180", v),
            PointError::OrderOutOfRange(v) => {
                write!(f, "order {} is outside 0..={}", v, MAX_ORDER)
            }
        }
    }
}

impl std::error::Error for PointError {}
