//! API request and response data models.
//!
//! API models are kept apart from the database models in [`crate::db::models`]; handlers convert
//! between the two. JSON field names are camelCase.
//!
//! - [`concerts`]: concert create/update payloads (with validation) and responses
//! - [`reservations`]: reserve payload, reservation responses, list filters
//! - [`users`]: roles and the authenticated caller
//! - [`pagination`]: `skip`/`limit` query parameters and the paged response envelope

pub mod concerts;
pub mod pagination;
pub mod reservations;
pub mod users;
