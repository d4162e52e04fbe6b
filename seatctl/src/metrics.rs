//! Reservation outcome counters.
//!
//! Recorded through the `metrics` facade. When metrics are enabled the axum-prometheus layer
//! installs the global recorder and `/internal/metrics` renders these alongside the HTTP metrics.
//! With no recorder installed the calls are no-ops.

use crate::errors::Error;

const RESERVATION_OPERATIONS: &str = "seatctl_reservation_operations_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationOperation {
    Reserve,
    Cancel,
}

impl ReservationOperation {
    fn as_str(self) -> &'static str {
        match self {
            ReservationOperation::Reserve => "reserve",
            ReservationOperation::Cancel => "cancel",
        }
    }
}

/// Outcome label for a finished protocol call
pub fn outcome_label<T>(result: &Result<T, Error>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(err) => err.kind().unwrap_or("error"),
    }
}

/// Count one reserve or cancel call by outcome
pub fn record_reservation_outcome<T>(operation: ReservationOperation, result: &Result<T, Error>) {
    metrics::counter!(
        RESERVATION_OPERATIONS,
        "operation" => operation.as_str(),
        "outcome" => outcome_label(result)
    )
    .increment(1);
}
