use crate::{
    AppState,
    api::models::users::CurrentUser,
    config::ProxyHeaderAuthConfig,
    db::{
        models::users::UserCreateDBRequest,
        store::{Database, Transaction, UserDirectory},
    },
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

/// Resolve the caller from the trusted proxy header.
///
/// Returns:
/// - None: no usable header on the request
/// - Some(Ok(user)): existing or freshly created user
/// - Some(Err(error)): header present but the lookup or creation failed
#[instrument(skip_all)]
async fn try_proxy_header_auth<D: Database>(parts: &Parts, config: &ProxyHeaderAuthConfig, db: &D) -> Option<Result<CurrentUser>> {
    let user_email = parts
        .headers
        .get(&config.header_name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|email| !email.is_empty())?;

    Some(lookup_or_create(user_email, config.auto_create_users, db).await)
}

async fn lookup_or_create<D: Database>(email: &str, auto_create: bool, db: &D) -> Result<CurrentUser> {
    let mut tx = db.begin().await?;

    let user = match tx.get_user_by_email(email).await? {
        Some(user) => user,
        None if auto_create => {
            debug!("Creating user for first proxy-header request");
            match tx.create_user(&UserCreateDBRequest::standard(email)).await {
                Ok(user) => user,
                // Another request for the same email created it first
                Err(e) if e.is_unique_violation_on("users_email_unique") => {
                    tx.rollback().await?;
                    let mut tx = db.begin().await?;
                    let user = tx.get_user_by_email(email).await?.ok_or(Error::Unauthenticated { message: None })?;
                    tx.commit().await?;
                    return Ok(user.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        None => {
            trace!("Unknown user and auto-creation disabled");
            return Err(Error::Unauthenticated {
                message: Some("Unknown user".to_string()),
            });
        }
    };

    tx.commit().await?;
    Ok(user.into())
}

impl<D: Database> FromRequestParts<AppState<D>> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState<D>) -> Result<Self> {
        match try_proxy_header_auth(parts, &state.config.auth.proxy_header, &state.db).await {
            Some(Ok(user)) => {
                debug!("Found proxy header authenticated user: {}", user.id);
                Ok(user)
            }
            Some(Err(e)) => {
                trace!("Proxy header authentication failed: {:?}", e);
                Err(e)
            }
            None => {
                trace!("No authentication credentials found in request");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}
