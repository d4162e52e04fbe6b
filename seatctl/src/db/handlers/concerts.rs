use crate::{
    db::{
        errors::Result,
        handlers::{Repository, like_pattern},
        models::concerts::{ConcertCreateDBRequest, ConcertDBResponse, ConcertUpdateDBRequest},
    },
    types::{ConcertId, abbrev_uuid},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing concerts
#[derive(Debug, Clone, Default)]
pub struct ConcertFilter {
    pub skip: i64,
    pub limit: i64,
    /// Case-insensitive match against name or description
    pub search: Option<String>,
}

impl ConcertFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit, search: None }
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|s| !s.trim().is_empty());
        self
    }
}

// Database entity model for a concert row
#[derive(Debug, Clone, FromRow)]
struct Concert {
    pub id: ConcertId,
    pub name: String,
    pub description: String,
    pub total_seats: i32,
    pub available_seats: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Concert> for ConcertDBResponse {
    fn from(c: Concert) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
            total_seats: c.total_seats,
            available_seats: c.available_seats,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

const CONCERT_COLUMNS: &str = "id, name, description, total_seats, available_seats, created_at, updated_at";

pub struct Concerts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Concerts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Take one seat if at least one is free.
    ///
    /// The availability check and the decrement are a single conditional UPDATE, so concurrent
    /// callers serialize on the row and at most `available_seats` of them see a row affected.
    #[instrument(skip(self), fields(concert_id = %abbrev_uuid(&id)), err)]
    pub async fn decrement_if_available(&mut self, id: ConcertId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE concerts
            SET available_seats = available_seats - 1, updated_at = NOW()
            WHERE id = $1 AND available_seats > 0
            "#,
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Return one seat. Returns false if the concert does not exist.
    #[instrument(skip(self), fields(concert_id = %abbrev_uuid(&id)), err)]
    pub async fn increment(&mut self, id: ConcertId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE concerts
            SET available_seats = available_seats + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Set a new capacity, keeping the reserved count.
    ///
    /// Returns `None` when the concert doesn't exist or `new_total` is below the number of seats
    /// already reserved; the caller tells the two apart.
    #[instrument(skip(self), fields(concert_id = %abbrev_uuid(&id)), err)]
    pub async fn adjust_capacity(&mut self, id: ConcertId, new_total: i32) -> Result<Option<ConcertDBResponse>> {
        // SET expressions see the pre-update row, so (total_seats - available_seats) is the
        // reserved count before the change.
        let concert = sqlx::query_as::<_, Concert>(&format!(
            r#"
            UPDATE concerts
            SET available_seats = $2 - (total_seats - available_seats),
                total_seats = $2,
                updated_at = NOW()
            WHERE id = $1 AND (total_seats - available_seats) <= $2
            RETURNING {CONCERT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(new_total)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(concert.map(Into::into))
    }

    #[instrument(skip(self, request), fields(concert_id = %abbrev_uuid(&id)), err)]
    pub async fn update_details(&mut self, id: ConcertId, request: &ConcertUpdateDBRequest) -> Result<Option<ConcertDBResponse>> {
        let concert = sqlx::query_as::<_, Concert>(&format!(
            r#"
            UPDATE concerts
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CONCERT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.name.as_deref())
        .bind(request.description.as_deref())
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(concert.map(Into::into))
    }

    /// Fetch several concerts at once, keyed by id. Unknown ids are skipped.
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn get_bulk(&mut self, ids: &[ConcertId]) -> Result<HashMap<ConcertId, ConcertDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let concerts = sqlx::query_as::<_, Concert>(&format!("SELECT {CONCERT_COLUMNS} FROM concerts WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(concerts.into_iter().map(|c| (c.id, c.into())).collect())
    }

    /// Delete a concert and, by cascade, its ledger rows.
    ///
    /// Cancellation locks a ledger row before the concert row. The cascade would take them the
    /// other way round, so the ledger rows are locked up front to keep one lock order.
    #[instrument(skip(self), fields(concert_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: ConcertId) -> Result<bool> {
        sqlx::query("SELECT id FROM reservations WHERE concert_id = $1 ORDER BY id FOR UPDATE")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        let result = sqlx::query("DELETE FROM concerts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Concerts<'c> {
    type CreateRequest = ConcertCreateDBRequest;
    type Response = ConcertDBResponse;
    type Id = ConcertId;
    type Filter = ConcertFilter;

    #[instrument(skip(self, request), fields(name = %request.name, total_seats = request.total_seats), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let concert = sqlx::query_as::<_, Concert>(&format!(
            r#"
            INSERT INTO concerts (id, name, description, total_seats, available_seats)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {CONCERT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.total_seats)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(concert.into())
    }

    #[instrument(skip(self), fields(concert_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let concert = sqlx::query_as::<_, Concert>(&format!("SELECT {CONCERT_COLUMNS} FROM concerts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(concert.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let concerts = sqlx::query_as::<_, Concert>(&format!(
            r#"
            SELECT {CONCERT_COLUMNS}
            FROM concerts
            WHERE ($1::TEXT IS NULL OR name ILIKE $1 OR description ILIKE $1)
            ORDER BY created_at DESC, id
            OFFSET $2
            LIMIT $3
            "#
        ))
        .bind(filter.search.as_deref().map(like_pattern))
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(concerts.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM concerts
            WHERE ($1::TEXT IS NULL OR name ILIKE $1 OR description ILIKE $1)
            "#,
        )
        .bind(filter.search.as_deref().map(like_pattern))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }
}
