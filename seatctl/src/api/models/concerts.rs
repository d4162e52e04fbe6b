//! API request/response models for concerts.

use super::pagination::Pagination;
use crate::db::models::concerts::{ConcertCreateDBRequest, ConcertDBResponse};
use crate::errors::{Error, Result};
use crate::inventory::ConcertChanges;
use crate::types::ConcertId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const NAME_MIN_CHARS: usize = 3;
pub const NAME_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MIN_CHARS: usize = 10;
pub const MAX_TOTAL_SEATS: i32 = 100_000;

fn validate_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(Error::BadRequest {
            message: format!("Name must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"),
        });
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.trim().chars().count() < DESCRIPTION_MIN_CHARS {
        return Err(Error::BadRequest {
            message: format!("Description must be at least {DESCRIPTION_MIN_CHARS} characters"),
        });
    }
    Ok(())
}

fn validate_total_seats(total_seats: i32) -> Result<()> {
    if !(1..=MAX_TOTAL_SEATS).contains(&total_seats) {
        return Err(Error::BadRequest {
            message: format!("Total seats must be between 1 and {MAX_TOTAL_SEATS}"),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConcertCreate {
    pub name: String,
    pub description: String,
    pub total_seats: i32,
}

impl ConcertCreate {
    /// Validate and convert into the database request. Name and description are trimmed.
    pub fn into_db_request(self) -> Result<ConcertCreateDBRequest> {
        validate_name(&self.name)?;
        validate_description(&self.description)?;
        validate_total_seats(self.total_seats)?;

        Ok(ConcertCreateDBRequest {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            total_seats: self.total_seats,
        })
    }
}

/// Partial update. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConcertUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    /// New capacity. Rejected if fewer than the seats already reserved.
    pub total_seats: Option<i32>,
}

impl ConcertUpdate {
    pub fn into_changes(self) -> Result<ConcertChanges> {
        if self.name.is_none() && self.description.is_none() && self.total_seats.is_none() {
            return Err(Error::BadRequest {
                message: "At least one field must be provided".to_string(),
            });
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(total_seats) = self.total_seats {
            validate_total_seats(total_seats)?;
        }

        Ok(ConcertChanges {
            name: self.name.map(|n| n.trim().to_string()),
            description: self.description.map(|d| d.trim().to_string()),
            total_seats: self.total_seats,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConcertResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ConcertId,
    pub name: String,
    pub description: String,
    pub total_seats: i32,
    pub available_seats: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConcertDBResponse> for ConcertResponse {
    fn from(c: ConcertDBResponse) -> Self {
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

/// Query parameters for listing concerts
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListConcertsQuery {
    /// Case-insensitive match on name or description
    pub search: Option<String>,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(name: &str, description: &str, total_seats: i32) -> ConcertCreate {
        ConcertCreate {
            name: name.to_string(),
            description: description.to_string(),
            total_seats,
        }
    }

    #[test]
    fn test_create_validation() {
        assert!(create("Night Shift", "Late-night jazz trio", 100).into_db_request().is_ok());

        for bad in [
            create("NS", "Late-night jazz trio", 100),
            create(&"x".repeat(201), "Late-night jazz trio", 100),
            create("Night Shift", "Jazz", 100),
            create("Night Shift", "Late-night jazz trio", 0),
            create("Night Shift", "Late-night jazz trio", MAX_TOTAL_SEATS + 1),
        ] {
            assert!(matches!(bad.into_db_request(), Err(Error::BadRequest { .. })));
        }
    }

    #[test]
    fn test_create_trims() {
        let request = create("  Night Shift  ", " Late-night jazz trio ", 5).into_db_request().unwrap();
        assert_eq!(request.name, "Night Shift");
        assert_eq!(request.description, "Late-night jazz trio");
    }

    #[test]
    fn test_update_validation() {
        assert!(matches!(
            ConcertUpdate::default().into_changes(),
            Err(Error::BadRequest { .. })
        ));

        let bad_seats = ConcertUpdate {
            total_seats: Some(-1),
            ..Default::default()
        };
        assert!(matches!(bad_seats.into_changes(), Err(Error::BadRequest { .. })));

        let changes = ConcertUpdate {
            name: Some(" Renamed ".to_string()),
            total_seats: Some(10),
            ..Default::default()
        }
        .into_changes()
        .unwrap();
        assert_eq!(changes.name.as_deref(), Some("Renamed"));
        assert_eq!(changes.total_seats, Some(10));
        assert!(changes.description.is_none());
    }

    #[test]
    fn test_update_body_is_camel_case() {
        let update: ConcertUpdate = serde_json::from_value(serde_json::json!({ "totalSeats": 42 })).unwrap();
        assert_eq!(update.total_seats, Some(42));

        let unknown = serde_json::from_value::<ConcertUpdate>(serde_json::json!({ "availableSeats": 42 }));
        assert!(unknown.is_err());
    }
}
