//! Database repository for users.

use crate::types::{UserId, abbrev_uuid};
use crate::{
    api::models::users::Role,
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, email, display_name, role, created_at, updated_at";

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"))
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn get_bulk(&mut self, ids: &[UserId]) -> Result<HashMap<UserId, UserDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(|u| (u.id, u.into())).collect())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id), role = ?role), err)]
    pub async fn set_role(&mut self, id: UserId, role: Role) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user.map(Into::into))
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, display_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&request.email)
        .bind(request.display_name.as_deref())
        .bind(request.role)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user.into())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id OFFSET $1 LIMIT $2"
        ))
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(users.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, _filter), err)]
    async fn count(&mut self, _filter: &Self::Filter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&mut *self.db).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_create_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&UserCreateDBRequest::standard("fan@example.com")).await.unwrap();
        assert_eq!(user.email, "fan@example.com");
        assert_eq!(user.role, Role::User);

        let fetched = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched, user);
    }

    #[sqlx::test]
    async fn test_get_user_by_email_and_promote(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&UserCreateDBRequest::standard("ops@example.com")).await.unwrap();
        let found = repo.get_user_by_email("ops@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(repo.get_user_by_email("nobody@example.com").await.unwrap().is_none());

        let promoted = repo.set_role(user.id, Role::Admin).await.unwrap().unwrap();
        assert_eq!(promoted.role, Role::Admin);
    }

    #[sqlx::test]
    async fn test_duplicate_email_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&UserCreateDBRequest::standard("dup@example.com")).await.unwrap();
        let err = repo.create(&UserCreateDBRequest::standard("dup@example.com")).await.unwrap_err();
        assert!(err.is_unique_violation_on("users_email_unique"));
    }

    #[sqlx::test]
    async fn test_email_lookup_and_uniqueness_ignore_case(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&UserCreateDBRequest::standard("Alice@Example.com")).await.unwrap();
        let found = repo.get_user_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.email, "Alice@Example.com");

        let err = repo.create(&UserCreateDBRequest::standard("ALICE@example.COM")).await.unwrap_err();
        assert!(err.is_unique_violation_on("users_email_unique"));
    }
}
