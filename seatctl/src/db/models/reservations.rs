//! Database models for the reservation ledger.

use crate::types::{ConcertId, ReservationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Reservation status stored as TEXT in database
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Cancelled,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Active => write!(f, "active"),
            ReservationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Database request for inserting a new ledger row
#[derive(Debug, Clone)]
pub struct ReservationCreateDBRequest {
    pub user_id: UserId,
    pub concert_id: ConcertId,
    pub status: ReservationStatus,
    /// Used for both `created_at` and `updated_at`
    pub at: DateTime<Utc>,
}

impl ReservationCreateDBRequest {
    pub fn active(user_id: UserId, concert_id: ConcertId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            concert_id,
            status: ReservationStatus::Active,
            at,
        }
    }
}

/// Database response for a reservation
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationDBResponse {
    pub id: ReservationId,
    pub user_id: UserId,
    pub concert_id: ConcertId,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationDBResponse {
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }
}
