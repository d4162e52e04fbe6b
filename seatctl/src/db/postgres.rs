//! Postgres backend for the store traits.

use crate::{
    api::models::users::Role,
    db::{
        errors::Result,
        handlers::{ConcertFilter, Concerts, Repository, ReservationFilter, Reservations, Users},
        models::{
            concerts::{ConcertCreateDBRequest, ConcertDBResponse, ConcertUpdateDBRequest},
            reservations::{ReservationCreateDBRequest, ReservationDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
        store::{ConcertStore, Database, ReservationLedger, Transaction, UserDirectory},
    },
    types::{ConcertId, ReservationId, UserId},
};
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;

/// Connection pool handle.
#[derive(Clone, Debug)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Database for PgDatabase {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction> {
        Ok(PgTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// An open Postgres transaction. Rolled back by sqlx on drop unless committed.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl Transaction for PgTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConcertStore for PgTransaction {
    async fn create_concert(&mut self, request: &ConcertCreateDBRequest) -> Result<ConcertDBResponse> {
        Concerts::new(&mut self.tx).create(request).await
    }

    async fn get_concert(&mut self, id: ConcertId) -> Result<Option<ConcertDBResponse>> {
        Concerts::new(&mut self.tx).get_by_id(id).await
    }

    async fn get_concerts_bulk(&mut self, ids: &[ConcertId]) -> Result<HashMap<ConcertId, ConcertDBResponse>> {
        Concerts::new(&mut self.tx).get_bulk(ids).await
    }

    async fn list_concerts(&mut self, filter: &ConcertFilter) -> Result<Vec<ConcertDBResponse>> {
        Concerts::new(&mut self.tx).list(filter).await
    }

    async fn count_concerts(&mut self, filter: &ConcertFilter) -> Result<i64> {
        Concerts::new(&mut self.tx).count(filter).await
    }

    async fn update_concert_details(&mut self, id: ConcertId, request: &ConcertUpdateDBRequest) -> Result<Option<ConcertDBResponse>> {
        Concerts::new(&mut self.tx).update_details(id, request).await
    }

    async fn delete_concert(&mut self, id: ConcertId) -> Result<bool> {
        Concerts::new(&mut self.tx).delete(id).await
    }

    async fn decrement_if_available(&mut self, id: ConcertId) -> Result<bool> {
        Concerts::new(&mut self.tx).decrement_if_available(id).await
    }

    async fn increment_available(&mut self, id: ConcertId) -> Result<bool> {
        Concerts::new(&mut self.tx).increment(id).await
    }

    async fn adjust_capacity(&mut self, id: ConcertId, new_total: i32) -> Result<Option<ConcertDBResponse>> {
        Concerts::new(&mut self.tx).adjust_capacity(id, new_total).await
    }
}

#[async_trait::async_trait]
impl ReservationLedger for PgTransaction {
    async fn get_reservation(&mut self, id: ReservationId) -> Result<Option<ReservationDBResponse>> {
        Reservations::new(&mut self.tx).get_for_update(id).await
    }

    async fn find_by_user_and_concert(&mut self, user_id: UserId, concert_id: ConcertId) -> Result<Option<ReservationDBResponse>> {
        Reservations::new(&mut self.tx).find_by_user_and_concert(user_id, concert_id).await
    }

    async fn create_reservation(&mut self, request: &ReservationCreateDBRequest) -> Result<ReservationDBResponse> {
        Reservations::new(&mut self.tx).create(request).await
    }

    async fn save_reservation(&mut self, reservation: &ReservationDBResponse) -> Result<ReservationDBResponse> {
        Reservations::new(&mut self.tx).save(reservation).await
    }

    async fn list_reservations(&mut self, filter: &ReservationFilter) -> Result<Vec<ReservationDBResponse>> {
        Reservations::new(&mut self.tx).list(filter).await
    }

    async fn count_reservations(&mut self, filter: &ReservationFilter) -> Result<i64> {
        Reservations::new(&mut self.tx).count(filter).await
    }

    async fn count_active_for_concert(&mut self, concert_id: ConcertId) -> Result<i64> {
        Reservations::new(&mut self.tx).count_active_for_concert(concert_id).await
    }
}

#[async_trait::async_trait]
impl UserDirectory for PgTransaction {
    async fn get_user(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        Users::new(&mut self.tx).get_by_id(id).await
    }

    async fn get_users_bulk(&mut self, ids: &[UserId]) -> Result<HashMap<UserId, UserDBResponse>> {
        Users::new(&mut self.tx).get_bulk(ids).await
    }

    async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        Users::new(&mut self.tx).get_user_by_email(email).await
    }

    async fn create_user(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        Users::new(&mut self.tx).create(request).await
    }

    async fn set_user_role(&mut self, id: UserId, role: Role) -> Result<Option<UserDBResponse>> {
        Users::new(&mut self.tx).set_role(id, role).await
    }
}
