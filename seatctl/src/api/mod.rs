//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! Everything is served under `/api/v1`:
//!
//! - **Concerts** (`/api/v1/concerts/*`): catalogue browsing; administration for admins
//! - **Reservations** (`/api/v1/reservations/*`): reserve, cancel, list
//!
//! # OpenAPI Documentation
//!
//! Endpoints are annotated with `utoipa`; the document is served at `/api-docs/openapi.json`.

pub mod handlers;
pub mod models;
