//! HTTP request handlers, one module per resource.
//!
//! Handlers are generic over the storage backend so the same router serves Postgres in
//! production and the in-memory backend in tests. Each handler:
//! - authenticates the caller and checks permissions through extractors
//! - validates the request body
//! - delegates to [`crate::inventory`] or [`crate::reservations`]
//! - converts the result into API models
//!
//! Errors are [`crate::errors::Error`], which renders the status code and JSON body.

pub mod concerts;
pub mod reservations;
