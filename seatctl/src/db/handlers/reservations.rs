use crate::{
    db::{
        errors::{DbError, Result},
        handlers::{Repository, like_pattern},
        models::reservations::{ReservationCreateDBRequest, ReservationDBResponse, ReservationStatus},
    },
    types::{ConcertId, ReservationId, UserId, abbrev_uuid},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing ledger rows
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub skip: i64,
    pub limit: i64,
    pub user_id: Option<UserId>,
    pub concert_id: Option<ConcertId>,
    pub status: Option<ReservationStatus>,
    /// Case-insensitive match against the concert name or the user's email
    pub search: Option<String>,
}

impl ReservationFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn for_concert(mut self, concert_id: ConcertId) -> Self {
        self.concert_id = Some(concert_id);
        self
    }

    pub fn with_status(mut self, status: Option<ReservationStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|s| !s.trim().is_empty());
        self
    }
}

// Database entity model for a ledger row
#[derive(Debug, Clone, FromRow)]
struct Reservation {
    pub id: ReservationId,
    pub user_id: UserId,
    pub concert_id: ConcertId,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationDBResponse {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            concert_id: r.concert_id,
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const RESERVATION_COLUMNS: &str = "id, user_id, concert_id, status, created_at, updated_at";

// Shared WHERE clause for list and count. The joins are only needed for `search`.
const FILTER_CLAUSE: &str = r#"
    FROM reservations r
    JOIN concerts c ON c.id = r.concert_id
    JOIN users u ON u.id = r.user_id
    WHERE ($1::UUID IS NULL OR r.user_id = $1)
      AND ($2::UUID IS NULL OR r.concert_id = $2)
      AND ($3::TEXT IS NULL OR r.status = $3)
      AND ($4::TEXT IS NULL OR c.name ILIKE $4 OR u.email ILIKE $4)
"#;

pub struct Reservations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Reservations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Fetch a reservation and lock the row until the surrounding transaction ends.
    #[instrument(skip(self), fields(reservation_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: ReservationId) -> Result<Option<ReservationDBResponse>> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(reservation.map(Into::into))
    }

    /// The ledger row for a (user, concert) pair, in any status, locked for update.
    ///
    /// There is at most one such row; re-booking reuses it.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), concert_id = %abbrev_uuid(&concert_id)), err)]
    pub async fn find_by_user_and_concert(&mut self, user_id: UserId, concert_id: ConcertId) -> Result<Option<ReservationDBResponse>> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE user_id = $1 AND concert_id = $2
            FOR UPDATE
            "#
        ))
        .bind(user_id)
        .bind(concert_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(reservation.map(Into::into))
    }

    /// Persist a status change.
    #[instrument(skip(self, reservation), fields(reservation_id = %abbrev_uuid(&reservation.id), status = %reservation.status), err)]
    pub async fn save(&mut self, reservation: &ReservationDBResponse) -> Result<ReservationDBResponse> {
        let saved = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            UPDATE reservations
            SET status = $2, updated_at = $3
            WHERE id = $1
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(reservation.id)
        .bind(reservation.status)
        .bind(reservation.updated_at)
        .fetch_optional(&mut *self.db)
        .await?;

        saved.map(Into::into).ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(concert_id = %abbrev_uuid(&concert_id)), err)]
    pub async fn count_active_for_concert(&mut self, concert_id: ConcertId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE concert_id = $1 AND status = 'active'")
            .bind(concert_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Reservations<'c> {
    type CreateRequest = ReservationCreateDBRequest;
    type Response = ReservationDBResponse;
    type Id = ReservationId;
    type Filter = ReservationFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), concert_id = %abbrev_uuid(&request.concert_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            INSERT INTO reservations (id, user_id, concert_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.concert_id)
        .bind(request.status)
        .bind(request.at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(reservation.into())
    }

    #[instrument(skip(self), fields(reservation_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(reservation.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            SELECT r.id, r.user_id, r.concert_id, r.status, r.created_at, r.updated_at
            {FILTER_CLAUSE}
            ORDER BY r.created_at DESC, r.id
            OFFSET $5
            LIMIT $6
            "#
        ))
        .bind(filter.user_id)
        .bind(filter.concert_id)
        .bind(filter.status)
        .bind(filter.search.as_deref().map(like_pattern))
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(reservations.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {FILTER_CLAUSE}"))
            .bind(filter.user_id)
            .bind(filter.concert_id)
            .bind(filter.status)
            .bind(filter.search.as_deref().map(like_pattern))
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}
