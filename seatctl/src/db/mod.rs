//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ Services         │  (reservations, inventory)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │ Store traits     │  (db::store - Database / Transaction)
//! └───┬──────────┬───┘
//!     │          │
//!     ↓          ↓
//! ┌────────┐ ┌───────────┐
//! │Postgres│ │ In-memory │
//! └───┬────┘ └───────────┘
//!     │
//!     ↓
//! ┌──────────────────┐
//! │ Repositories     │  (db::handlers - queries)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │ Models           │  (db::models - database records)
//! └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`store`]: Storage traits the services are written against
//! - [`postgres`]: Postgres implementation of the store traits
//! - [`in_memory`]: In-memory implementation used by tests
//! - [`handlers`]: Repository implementations for each table
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Transactions
//!
//! Every seat-touching operation runs in one transaction:
//!
//! ```ignore
//! let mut tx = db.begin().await?;
//! if tx.decrement_if_available(concert_id).await? {
//!     tx.create_reservation(&request).await?;
//! }
//! tx.commit().await?;
//! ```
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator:
//!
//! ```ignore
//! seatctl::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use in_memory::InMemoryDatabase;
pub use postgres::PgDatabase;
pub use store::{ConcertStore, Database, ReservationLedger, Transaction, UserDirectory};
