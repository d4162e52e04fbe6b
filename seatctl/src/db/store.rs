//! Storage traits the reservation protocol and the inventory service are written against.
//!
//! Every operation that touches seats runs inside one [`Transaction`]: the protocol reads the
//! concert and the ledger row, takes or returns a seat through the conditional counter updates,
//! writes the ledger row, then commits. Dropping a transaction without committing discards its
//! writes.
//!
//! Two backends implement these traits:
//! - [`crate::db::postgres::PgDatabase`]: the production backend over the repositories in
//!   [`crate::db::handlers`]
//! - [`crate::db::in_memory::InMemoryDatabase`]: a single-process backend used by tests

use crate::{
    api::models::users::Role,
    db::{
        errors::Result,
        handlers::{ConcertFilter, ReservationFilter},
        models::{
            concerts::{ConcertCreateDBRequest, ConcertDBResponse, ConcertUpdateDBRequest},
            reservations::{ReservationCreateDBRequest, ReservationDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    types::{ConcertId, ReservationId, UserId},
};
use std::collections::HashMap;

/// Concert catalogue and seat counters.
#[async_trait::async_trait]
pub trait ConcertStore: Send {
    async fn create_concert(&mut self, request: &ConcertCreateDBRequest) -> Result<ConcertDBResponse>;

    async fn get_concert(&mut self, id: ConcertId) -> Result<Option<ConcertDBResponse>>;

    /// Several concerts keyed by id. Unknown ids are left out of the map.
    async fn get_concerts_bulk(&mut self, ids: &[ConcertId]) -> Result<HashMap<ConcertId, ConcertDBResponse>>;

    async fn list_concerts(&mut self, filter: &ConcertFilter) -> Result<Vec<ConcertDBResponse>>;

    async fn count_concerts(&mut self, filter: &ConcertFilter) -> Result<i64>;

    /// Update name and/or description. `None` if the concert doesn't exist.
    async fn update_concert_details(&mut self, id: ConcertId, request: &ConcertUpdateDBRequest) -> Result<Option<ConcertDBResponse>>;

    /// Delete a concert and, by cascade, its ledger rows.
    async fn delete_concert(&mut self, id: ConcertId) -> Result<bool>;

    /// Atomically take one seat if `available_seats > 0`. Returns whether a seat was taken.
    async fn decrement_if_available(&mut self, id: ConcertId) -> Result<bool>;

    /// Return one seat. Returns false if the concert doesn't exist.
    async fn increment_available(&mut self, id: ConcertId) -> Result<bool>;

    /// Set `total_seats` to `new_total`, keeping the reserved count.
    ///
    /// `None` if the concert doesn't exist or more than `new_total` seats are reserved.
    async fn adjust_capacity(&mut self, id: ConcertId, new_total: i32) -> Result<Option<ConcertDBResponse>>;
}

/// The reservation ledger: at most one row per (user, concert) pair.
#[async_trait::async_trait]
pub trait ReservationLedger: Send {
    /// Fetch a row, locking it for the rest of the transaction where the backend supports it.
    async fn get_reservation(&mut self, id: ReservationId) -> Result<Option<ReservationDBResponse>>;

    /// The row for a (user, concert) pair in any status, locked like [`Self::get_reservation`].
    async fn find_by_user_and_concert(&mut self, user_id: UserId, concert_id: ConcertId) -> Result<Option<ReservationDBResponse>>;

    /// The row for a (user, concert) pair if it is active.
    async fn find_active_by_user_and_concert(&mut self, user_id: UserId, concert_id: ConcertId) -> Result<Option<ReservationDBResponse>> {
        Ok(self
            .find_by_user_and_concert(user_id, concert_id)
            .await?
            .filter(ReservationDBResponse::is_active))
    }

    /// Insert a new row. A second row for the same pair is a unique violation.
    async fn create_reservation(&mut self, request: &ReservationCreateDBRequest) -> Result<ReservationDBResponse>;

    /// Persist `status` and `updated_at` of an existing row.
    async fn save_reservation(&mut self, reservation: &ReservationDBResponse) -> Result<ReservationDBResponse>;

    async fn list_reservations(&mut self, filter: &ReservationFilter) -> Result<Vec<ReservationDBResponse>>;

    async fn count_reservations(&mut self, filter: &ReservationFilter) -> Result<i64>;

    async fn count_active_for_concert(&mut self, concert_id: ConcertId) -> Result<i64>;
}

/// User accounts.
#[async_trait::async_trait]
pub trait UserDirectory: Send {
    async fn get_user(&mut self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Several users keyed by id. Unknown ids are left out of the map.
    async fn get_users_bulk(&mut self, ids: &[UserId]) -> Result<HashMap<UserId, UserDBResponse>>;

    /// Emails compare case-insensitively.
    async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>>;

    async fn create_user(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    async fn set_user_role(&mut self, id: UserId, role: Role) -> Result<Option<UserDBResponse>>;
}

/// A unit of work over all three stores.
#[async_trait::async_trait]
pub trait Transaction: ConcertStore + ReservationLedger + UserDirectory + Sized {
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// A handle to a storage backend, cheap to clone and shared across request handlers.
#[async_trait::async_trait]
pub trait Database: Clone + Send + Sync + 'static {
    type Tx: Transaction + 'static;

    async fn begin(&self) -> Result<Self::Tx>;
}
