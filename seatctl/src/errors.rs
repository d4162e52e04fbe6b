use crate::db::errors::DbError;
use crate::types::{ConcertId, Operation, Permission, ReservationId};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// User lacks required permissions for the operation
    #[error("Insufficient permissions to {action:?} {resource}")]
    InsufficientPermissions {
        required: Permission,
        action: Operation,
        resource: String,
    },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// The concert has no free seat, either at the pre-check or at the conditional decrement
    #[error("No seats available for concert {concert_id}")]
    NoSeatsAvailable { concert_id: ConcertId },

    /// The user already holds an active reservation for this concert
    #[error("Active reservation already exists for concert {concert_id}")]
    AlreadyReserved { concert_id: ConcertId },

    /// Re-booking attempted before the cooldown since cancellation elapsed
    #[error("Re-booking cooldown active, {remaining_minutes} minute(s) remaining")]
    CooldownActive { remaining_minutes: i64 },

    /// The requester may not act on this reservation
    #[error("{message}")]
    Forbidden { message: String },

    /// The reservation was already cancelled
    #[error("Reservation {reservation_id} is already cancelled")]
    AlreadyCancelled { reservation_id: ReservationId },

    /// A capacity change would drop below the seats already reserved
    #[error("Cannot set capacity to {requested}, {reserved} seats are already reserved")]
    CapacityBelowReserved { reserved: i32, requested: i32 },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::NoSeatsAvailable { .. } => StatusCode::CONFLICT,
            Error::AlreadyReserved { .. } => StatusCode::CONFLICT,
            Error::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::AlreadyCancelled { .. } => StatusCode::CONFLICT,
            Error::CapacityBelowReserved { .. } => StatusCode::BAD_REQUEST,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable kind for the domain errors, used as the `error` field of JSON bodies
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            Error::NotFound { .. } => Some("not_found"),
            Error::NoSeatsAvailable { .. } => Some("no_seats_available"),
            Error::AlreadyReserved { .. } => Some("already_reserved"),
            Error::CooldownActive { .. } => Some("cooldown_active"),
            Error::Forbidden { .. } => Some("forbidden"),
            Error::AlreadyCancelled { .. } => Some("already_cancelled"),
            Error::CapacityBelowReserved { .. } => Some("capacity_below_reserved"),
            Error::BadRequest { .. } => Some("bad_request"),
            _ => None,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::InsufficientPermissions { action, resource, .. } => {
                format!("Insufficient permissions to {action} {resource}")
            }
            Error::BadRequest { message } | Error::Forbidden { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::NoSeatsAvailable { .. } => "No seats available".to_string(),
            Error::AlreadyReserved { .. } => "You already have an active reservation for this concert".to_string(),
            Error::CooldownActive { remaining_minutes } => {
                format!("You can re-book this concert in {remaining_minutes} minute(s)")
            }
            Error::AlreadyCancelled { .. } => "Reservation is already cancelled".to_string(),
            Error::CapacityBelowReserved { reserved, requested } => {
                format!("Cannot reduce total seats to {requested}: {reserved} seats are already reserved")
            }
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => match (table.as_deref(), constraint.as_deref()) {
                    (Some("users"), Some(c)) if c.contains("email") => "An account with this email address already exists".to_string(),
                    (Some("reservations"), Some("reservations_user_concert_unique")) => {
                        "You already have a reservation for this concert".to_string()
                    }
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match self.kind() {
            Some(kind) => {
                let body = json!({
                    "error": kind,
                    "message": self.user_message(),
                });
                let mut response = (status, Json(body)).into_response();
                if let Error::CooldownActive { remaining_minutes } = &self {
                    if let Ok(value) = HeaderValue::from_str(&(remaining_minutes * 60).to_string()) {
                        response.headers_mut().insert(header::RETRY_AFTER, value);
                    }
                }
                response
            }
            // For all other errors, return simple text message
            None => (status, self.user_message()).into_response(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
