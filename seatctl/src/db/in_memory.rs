//! In-memory backend for the store traits.
//!
//! All state lives behind one async mutex. A transaction holds the lock from `begin` until it is
//! committed, rolled back or dropped, and works on a private copy of the state that replaces the
//! shared state only on commit. Transactions are therefore fully serialized. Suitable for tests
//! and single-process use; everything is lost on restart.
//!
//! The same constraints as the Postgres schema are enforced: unique user emails, at most one
//! ledger row per (user, concert) pair, seat counter bounds, and foreign keys from the ledger.
//!
//! # Example
//! ```ignore
//! let db = InMemoryDatabase::new();
//! let mut tx = db.begin().await?;
//! let concert = tx.create_concert(&request).await?;
//! tx.commit().await?;
//! ```

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    api::models::users::Role,
    db::{
        errors::{DbError, Result},
        handlers::{ConcertFilter, ReservationFilter},
        models::{
            concerts::{ConcertCreateDBRequest, ConcertDBResponse, ConcertUpdateDBRequest},
            reservations::{ReservationCreateDBRequest, ReservationDBResponse, ReservationStatus},
            users::{UserCreateDBRequest, UserDBResponse},
        },
        store::{ConcertStore, Database, ReservationLedger, Transaction, UserDirectory},
    },
    types::{ConcertId, ReservationId, UserId},
};

// Rows are kept in insertion order so that ties on created_at list newest-inserted first.
#[derive(Debug, Clone, Default)]
struct State {
    users: Vec<UserDBResponse>,
    concerts: Vec<ConcertDBResponse>,
    reservations: Vec<ReservationDBResponse>,
}

impl State {
    fn concert_mut(&mut self, id: ConcertId) -> Option<&mut ConcertDBResponse> {
        self.concerts.iter_mut().find(|c| c.id == id)
    }

    fn concert_matches(concert: &ConcertDBResponse, filter: &ConcertFilter) -> bool {
        match &filter.search {
            Some(term) => {
                let term = term.trim().to_lowercase();
                concert.name.to_lowercase().contains(&term) || concert.description.to_lowercase().contains(&term)
            }
            None => true,
        }
    }

    fn reservation_matches(&self, reservation: &ReservationDBResponse, filter: &ReservationFilter) -> bool {
        if filter.user_id.is_some_and(|id| id != reservation.user_id) {
            return false;
        }
        if filter.concert_id.is_some_and(|id| id != reservation.concert_id) {
            return false;
        }
        if filter.status.is_some_and(|status| status != reservation.status) {
            return false;
        }
        if let Some(term) = &filter.search {
            let term = term.trim().to_lowercase();
            let concert_hit = self
                .concerts
                .iter()
                .any(|c| c.id == reservation.concert_id && c.name.to_lowercase().contains(&term));
            let user_hit = self
                .users
                .iter()
                .any(|u| u.id == reservation.user_id && u.email.to_lowercase().contains(&term));
            if !concert_hit && !user_hit {
                return false;
            }
        }
        true
    }
}

fn unique_violation(constraint: &str, table: &str) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        table: Some(table.to_string()),
        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
    }
}

fn check_violation(constraint: &str, table: &str) -> DbError {
    DbError::CheckViolation {
        constraint: Some(constraint.to_string()),
        table: Some(table.to_string()),
        message: format!("new row for relation \"{table}\" violates check constraint \"{constraint}\""),
    }
}

fn foreign_key_violation(constraint: &str, table: &str) -> DbError {
    DbError::ForeignKeyViolation {
        constraint: Some(constraint.to_string()),
        table: Some(table.to_string()),
        message: format!("insert or update on table \"{table}\" violates foreign key constraint \"{constraint}\""),
    }
}

fn page<T: Clone>(rows: Vec<&T>, skip: i64, limit: i64) -> Vec<T> {
    rows.into_iter()
        .skip(skip.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

/// Shared handle to the in-memory state.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Database for InMemoryDatabase {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }
}

/// An open transaction. Holds the state lock until it is finished.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait::async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self) -> Result<()> {
        let InMemoryTransaction { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConcertStore for InMemoryTransaction {
    async fn create_concert(&mut self, request: &ConcertCreateDBRequest) -> Result<ConcertDBResponse> {
        if request.total_seats < 1 {
            return Err(check_violation("concerts_total_seats_positive", "concerts"));
        }
        let now = Utc::now();
        let concert = ConcertDBResponse {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            description: request.description.clone(),
            total_seats: request.total_seats,
            available_seats: request.total_seats,
            created_at: now,
            updated_at: now,
        };
        self.working.concerts.push(concert.clone());
        Ok(concert)
    }

    async fn get_concert(&mut self, id: ConcertId) -> Result<Option<ConcertDBResponse>> {
        Ok(self.working.concerts.iter().find(|c| c.id == id).cloned())
    }

    async fn get_concerts_bulk(&mut self, ids: &[ConcertId]) -> Result<HashMap<ConcertId, ConcertDBResponse>> {
        Ok(self
            .working
            .concerts
            .iter()
            .filter(|c| ids.contains(&c.id))
            .map(|c| (c.id, c.clone()))
            .collect())
    }

    async fn list_concerts(&mut self, filter: &ConcertFilter) -> Result<Vec<ConcertDBResponse>> {
        let mut rows: Vec<&ConcertDBResponse> = self
            .working
            .concerts
            .iter()
            .rev()
            .filter(|c| State::concert_matches(c, filter))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, filter.skip, filter.limit))
    }

    async fn count_concerts(&mut self, filter: &ConcertFilter) -> Result<i64> {
        Ok(self
            .working
            .concerts
            .iter()
            .filter(|c| State::concert_matches(c, filter))
            .count() as i64)
    }

    async fn update_concert_details(&mut self, id: ConcertId, request: &ConcertUpdateDBRequest) -> Result<Option<ConcertDBResponse>> {
        let Some(concert) = self.working.concert_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = &request.name {
            concert.name = name.clone();
        }
        if let Some(description) = &request.description {
            concert.description = description.clone();
        }
        concert.updated_at = Utc::now();
        Ok(Some(concert.clone()))
    }

    async fn delete_concert(&mut self, id: ConcertId) -> Result<bool> {
        let before = self.working.concerts.len();
        self.working.concerts.retain(|c| c.id != id);
        if self.working.concerts.len() == before {
            return Ok(false);
        }
        self.working.reservations.retain(|r| r.concert_id != id);
        Ok(true)
    }

    async fn decrement_if_available(&mut self, id: ConcertId) -> Result<bool> {
        match self.working.concert_mut(id) {
            Some(concert) if concert.available_seats > 0 => {
                concert.available_seats -= 1;
                concert.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_available(&mut self, id: ConcertId) -> Result<bool> {
        let Some(concert) = self.working.concert_mut(id) else {
            return Ok(false);
        };
        if concert.available_seats >= concert.total_seats {
            return Err(check_violation("concerts_available_seats_bounds", "concerts"));
        }
        concert.available_seats += 1;
        concert.updated_at = Utc::now();
        Ok(true)
    }

    async fn adjust_capacity(&mut self, id: ConcertId, new_total: i32) -> Result<Option<ConcertDBResponse>> {
        let Some(concert) = self.working.concert_mut(id) else {
            return Ok(None);
        };
        let reserved = concert.reserved_seats();
        if reserved > new_total {
            return Ok(None);
        }
        if new_total < 1 {
            return Err(check_violation("concerts_total_seats_positive", "concerts"));
        }
        concert.total_seats = new_total;
        concert.available_seats = new_total - reserved;
        concert.updated_at = Utc::now();
        Ok(Some(concert.clone()))
    }
}

#[async_trait::async_trait]
impl ReservationLedger for InMemoryTransaction {
    async fn get_reservation(&mut self, id: ReservationId) -> Result<Option<ReservationDBResponse>> {
        Ok(self.working.reservations.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_user_and_concert(&mut self, user_id: UserId, concert_id: ConcertId) -> Result<Option<ReservationDBResponse>> {
        Ok(self
            .working
            .reservations
            .iter()
            .find(|r| r.user_id == user_id && r.concert_id == concert_id)
            .cloned())
    }

    async fn create_reservation(&mut self, request: &ReservationCreateDBRequest) -> Result<ReservationDBResponse> {
        if !self.working.users.iter().any(|u| u.id == request.user_id) {
            return Err(foreign_key_violation("reservations_user_id_fkey", "reservations"));
        }
        if !self.working.concerts.iter().any(|c| c.id == request.concert_id) {
            return Err(foreign_key_violation("reservations_concert_id_fkey", "reservations"));
        }
        if self
            .working
            .reservations
            .iter()
            .any(|r| r.user_id == request.user_id && r.concert_id == request.concert_id)
        {
            return Err(unique_violation("reservations_user_concert_unique", "reservations"));
        }

        let reservation = ReservationDBResponse {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            concert_id: request.concert_id,
            status: request.status,
            created_at: request.at,
            updated_at: request.at,
        };
        self.working.reservations.push(reservation.clone());
        Ok(reservation)
    }

    async fn save_reservation(&mut self, reservation: &ReservationDBResponse) -> Result<ReservationDBResponse> {
        let stored = self
            .working
            .reservations
            .iter_mut()
            .find(|r| r.id == reservation.id)
            .ok_or(DbError::NotFound)?;
        stored.status = reservation.status;
        stored.updated_at = reservation.updated_at;
        Ok(stored.clone())
    }

    async fn list_reservations(&mut self, filter: &ReservationFilter) -> Result<Vec<ReservationDBResponse>> {
        let state = &self.working;
        let mut rows: Vec<&ReservationDBResponse> = state
            .reservations
            .iter()
            .rev()
            .filter(|r| state.reservation_matches(r, filter))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, filter.skip, filter.limit))
    }

    async fn count_reservations(&mut self, filter: &ReservationFilter) -> Result<i64> {
        let state = &self.working;
        Ok(state
            .reservations
            .iter()
            .filter(|r| state.reservation_matches(r, filter))
            .count() as i64)
    }

    async fn count_active_for_concert(&mut self, concert_id: ConcertId) -> Result<i64> {
        Ok(self
            .working
            .reservations
            .iter()
            .filter(|r| r.concert_id == concert_id && r.status == ReservationStatus::Active)
            .count() as i64)
    }
}

#[async_trait::async_trait]
impl UserDirectory for InMemoryTransaction {
    async fn get_user(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.working.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_users_bulk(&mut self, ids: &[UserId]) -> Result<HashMap<UserId, UserDBResponse>> {
        Ok(self
            .working
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(|u| (u.id, u.clone()))
            .collect())
    }

    async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.working.users.iter().find(|u| u.email.to_lowercase() == email.to_lowercase()).cloned())
    }

    async fn create_user(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        if self.working.users.iter().any(|u| u.email.to_lowercase() == request.email.to_lowercase()) {
            return Err(unique_violation("users_email_unique", "users"));
        }
        let now = Utc::now();
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            email: request.email.clone(),
            display_name: request.display_name.clone(),
            role: request.role,
            created_at: now,
            updated_at: now,
        };
        self.working.users.push(user.clone());
        Ok(user)
    }

    async fn set_user_role(&mut self, id: UserId, role: Role) -> Result<Option<UserDBResponse>> {
        let Some(user) = self.working.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.role = role;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }
}
