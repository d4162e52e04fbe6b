//! Repository implementations for database access.
//!
//! This module provides repository structs for each table in the system.
//! Repositories follow a consistent pattern and implement the [`Repository`] trait.
//!
//! # Design Pattern
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed CRUD operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//! - Uses the connection's transaction for ACID guarantees
//!
//! # Available Repositories
//!
//! - [`Concerts`]: Concert catalogue and the conditional seat counter updates
//! - [`Reservations`]: The reservation ledger, with row-locking lookups
//! - [`Users`]: User accounts resolved from the trusted proxy header
//!
//! # Common Pattern
//!
//! ```ignore
//! use seatctl::db::handlers::{Concerts, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut repo = Concerts::new(&mut tx);
//!
//!     let taken = repo.decrement_if_available(concert_id).await?;
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! Application code does not use these directly; it goes through the store traits in
//! [`crate::db::store`], which the Postgres backend implements on top of these repositories.

pub mod concerts;
pub mod repository;
pub mod reservations;
pub mod users;

pub use concerts::{ConcertFilter, Concerts};
pub use repository::Repository;
pub use reservations::{ReservationFilter, Reservations};
pub use users::Users;

/// Build an ILIKE pattern matching `term` anywhere, with LIKE wildcards in the term escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term.trim().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}
