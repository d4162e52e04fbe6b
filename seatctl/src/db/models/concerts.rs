//! Database models for concerts and their seat counters.

use crate::types::ConcertId;
use chrono::{DateTime, Utc};

/// Database request for creating a new concert. Available seats start at `total_seats`.
#[derive(Debug, Clone)]
pub struct ConcertCreateDBRequest {
    pub name: String,
    pub description: String,
    pub total_seats: i32,
}

/// Database request for updating the descriptive fields of a concert.
///
/// Capacity changes never go through here; they use the conditional capacity adjustment so the
/// reserved count is respected.
#[derive(Debug, Clone, Default)]
pub struct ConcertUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ConcertUpdateDBRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Database response for a concert
#[derive(Debug, Clone, PartialEq)]
pub struct ConcertDBResponse {
    pub id: ConcertId,
    pub name: String,
    pub description: String,
    pub total_seats: i32,
    pub available_seats: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConcertDBResponse {
    /// Number of seats currently held by active reservations
    pub fn reserved_seats(&self) -> i32 {
        self.total_seats - self.available_seats
    }
}
