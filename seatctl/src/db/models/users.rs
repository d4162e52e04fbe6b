//! Database models for users.

use crate::api::models::users::Role;
use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
}

impl UserCreateDBRequest {
    /// A standard user provisioned from the trusted proxy header
    pub fn standard(email: &str) -> Self {
        Self {
            email: email.to_string(),
            display_name: None,
            role: Role::User,
        }
    }
}

/// Database response for a user
#[derive(Debug, Clone, PartialEq)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
