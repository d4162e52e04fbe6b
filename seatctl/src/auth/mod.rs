//! Caller identity and access control.
//!
//! seatctl does not authenticate anyone itself. It runs behind a trusted proxy (oauth2-proxy,
//! vouch, an API gateway) which sets the caller's email in a configurable header
//! (`auth.proxy_header.header_name`, default `x-seatctl-user`). The header is only trustworthy if
//! the proxy strips it from client requests.
//!
//! # Authorization
//!
//! Two roles:
//! - **admin**: manages the concert catalogue and can see every reservation
//! - **user**: browses concerts and manages their own reservations
//!
//! The initial administrator is created (or promoted) at startup from `admin_email`.
//!
//! # Modules
//!
//! - [`current_user`]: the [`CurrentUser`](crate::api::models::users::CurrentUser) extractor
//! - [`permissions`]: role permissions and the [`RequiresPermission`](permissions::RequiresPermission)
//!   extractor
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use seatctl::auth::permissions::{operation, resource, RequiresPermission};
//!
//! async fn create_concert<D: Database>(
//!     State(state): State<AppState<D>>,
//!     _: RequiresPermission<resource::Concerts, operation::CreateAll>,
//!     Json(body): Json<ConcertCreate>,
//! ) -> Result<Json<ConcertResponse>> { ... }
//! ```

pub mod current_user;
pub mod permissions;
