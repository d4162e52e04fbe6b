//! Database record models matching table schemas.
//!
//! This module contains struct definitions that directly correspond to database
//! table rows. These models are used by repositories to return query results
//! and accept insertion/update data.
//!
//! # Design Principles
//!
//! - **Schema Mapping**: Each model struct matches a database table schema
//! - **Separation**: Database models are distinct from API models to allow
//!   independent evolution of storage and API representations
//! - **Type Safety**: Uses type aliases for IDs (UserId, ConcertId, ReservationId)
//!
//! # Model Categories
//!
//! - [`concerts`]: Concerts and their seat counters (the inventory)
//! - [`reservations`]: Reservation ledger rows and their status
//! - [`users`]: User accounts resolved from the trusted proxy header
//!
//! # Conversion to API Models
//!
//! Database models implement `From` conversions to API models:
//!
//! ```ignore
//! use seatctl::db::models::concerts::ConcertDBResponse;
//! use seatctl::api::models::concerts::ConcertResponse;
//!
//! let db_concert: ConcertDBResponse = /* ... */;
//! let api_response: ConcertResponse = db_concert.into();
//! ```

pub mod concerts;
pub mod reservations;
pub mod users;
