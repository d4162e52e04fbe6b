//! API request/response models for reservations.

use super::pagination::Pagination;
use crate::db::models::{
    concerts::ConcertDBResponse,
    reservations::{ReservationDBResponse, ReservationStatus},
    users::UserDBResponse,
};
use crate::reservations::ReservationDetails;
use crate::types::{ConcertId, ReservationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Body of `POST /reservations`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReservationCreate {
    #[schema(value_type = String, format = "uuid")]
    pub concert_id: ConcertId,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ReservationId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub concert_id: ConcertId,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    /// Last status change; for a cancelled reservation, when it was cancelled
    pub updated_at: DateTime<Utc>,
    /// The booked concert, included in listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concert: Option<ReservationConcert>,
    /// The holder, included in the admin listing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ReservationHolder>,
}

/// Concert summary embedded in reservation listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationConcert {
    #[schema(value_type = String, format = "uuid")]
    pub id: ConcertId,
    pub name: String,
    pub total_seats: i32,
    pub available_seats: i32,
}

impl From<ConcertDBResponse> for ReservationConcert {
    fn from(c: ConcertDBResponse) -> Self {
        Self {
            id: c.id,
            name: c.name,
            total_seats: c.total_seats,
            available_seats: c.available_seats,
        }
    }
}

/// Holder summary embedded in the admin reservation listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationHolder {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
}

impl From<UserDBResponse> for ReservationHolder {
    fn from(u: UserDBResponse) -> Self {
        Self {
            id: u.id,
            email: u.email,
            display_name: u.display_name,
        }
    }
}

impl From<ReservationDBResponse> for ReservationResponse {
    fn from(r: ReservationDBResponse) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            concert_id: r.concert_id,
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
            concert: None,
            user: None,
        }
    }
}

impl From<ReservationDetails> for ReservationResponse {
    fn from(details: ReservationDetails) -> Self {
        Self {
            concert: details.concert.map(Into::into),
            user: details.user.map(Into::into),
            ..details.reservation.into()
        }
    }
}

/// Query parameters for the caller's own reservations
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListOwnReservationsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// Query parameters for listing all reservations (admin)
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListReservationsQuery {
    /// Only reservations with this status
    #[param(value_type = Option<String>)]
    pub status: Option<ReservationStatus>,

    /// Only reservations for this concert
    #[param(value_type = Option<String>, format = "uuid")]
    pub concert_id: Option<ConcertId>,

    /// Case-insensitive match on the concert name or the user's email
    pub search: Option<String>,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
