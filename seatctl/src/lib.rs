//! # seatctl: Concert Seat Reservations
//!
//! `seatctl` keeps a catalogue of concerts, each with a fixed number of seats, and lets
//! authenticated users reserve and cancel seats. Whatever the concurrency, a concert is never
//! oversold and its available-seat counter always matches the ledger of active reservations.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for persistence. Callers are identified by a header set by a trusted
//! authenticating proxy; there is no login flow of its own.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) serves `/api/v1/concerts` and `/api/v1/reservations`. Handlers
//! are generic over the storage backend so tests can run the full router against an in-memory
//! store.
//!
//! The **authentication layer** ([`auth`]) resolves the proxy header into a user (creating
//! unknown users on first sight) and checks role permissions through extractors.
//!
//! The **reservation protocol** ([`reservations`]) takes and returns seats. Every reserve and
//! cancel runs in one transaction, and a seat is only ever taken through a conditional decrement
//! of the counter, so a stale availability check can never oversell.
//!
//! The **inventory** ([`inventory`]) creates, updates and deletes concerts. Capacity changes are
//! conditional on the seats already reserved.
//!
//! The **database layer** ([`db`]) defines the storage traits and their Postgres and in-memory
//! implementations.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use seatctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = seatctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     seatctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations run automatically on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! seatctl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod inventory;
mod metrics;
mod openapi;
pub mod reservations;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::{
        handlers::{concerts, reservations as reservation_handlers},
        models::users::Role,
    },
    clock::{Clock, SystemClock},
    config::CorsOrigin,
    db::{
        models::users::UserCreateDBRequest,
        postgres::PgDatabase,
        store::{Database, Transaction, UserDirectory},
    },
    inventory::ConcertInventory,
    openapi::ApiDoc,
    reservations::ReservationService,
};
use axum::{
    Json, Router,
    http::{self, HeaderValue, Method},
    routing::{delete, get},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{
    ConnectOptions, PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{ConcertId, ReservationId, UserId};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(PgDatabase::new(pool))
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState<D: Database> {
    pub db: D,
    pub config: Config,
    /// Source of reservation timestamps
    #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)]
    pub clock: Arc<dyn Clock>,
}

impl<D: Database> AppState<D> {
    /// The reservation protocol, with the configured re-booking cooldown.
    pub fn reservations(&self) -> ReservationService<D> {
        ReservationService::new(self.db.clone(), self.config.reservations.policy(), self.clock.clone())
    }

    pub fn inventory(&self) -> ConcertInventory<D> {
        ConcertInventory::new(self.db.clone())
    }
}

/// Get the seatctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user, or promote the existing user with that email.
///
/// Idempotent; called on every startup so there is always an administrator.
#[instrument(skip_all)]
pub async fn create_initial_admin_user<D: Database>(db: &D, email: &str) -> errors::Result<UserId> {
    let mut tx = db.begin().await?;

    if let Some(existing_user) = tx.get_user_by_email(email).await? {
        if existing_user.role != Role::Admin {
            info!("Promoting existing user {} to admin", types::abbrev_uuid(&existing_user.id));
            tx.set_user_role(existing_user.id, Role::Admin).await?;
        }
        tx.commit().await?;
        return Ok(existing_user.id);
    }

    let created_user = tx
        .create_user(&UserCreateDBRequest {
            email: email.to_string(),
            display_name: None,
            role: Role::Admin,
        })
        .await?;

    tx.commit().await?;
    info!("Created initial admin user {}", types::abbrev_uuid(&created_user.id));
    Ok(created_user.id)
}

/// Open the Postgres pool with the configured pool settings and slow-statement logging
async fn connect_pool(config: &Config) -> anyhow::Result<PgPool> {
    let connect_options = PgConnectOptions::from_str(&config.database.url)?.log_slow_statements(
        log::LevelFilter::Warn,
        Duration::from_millis(config.slow_statement_threshold_ms),
    );

    let settings = &config.database.pool;
    let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(secs(settings.idle_timeout_secs))
        .max_lifetime(secs(settings.max_lifetime_secs))
        .connect_with(connect_options)
        .await?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.cors;

    let mut origins = Vec::new();
    for origin in &cors_config.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            // Origins never carry a trailing slash, Url::as_str always adds one
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            http::header::CONTENT_TYPE,
            http::HeaderName::from_str(&config.auth.proxy_header.header_name)?,
        ])
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers(vec![http::header::RETRY_AFTER]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `/api/v1/concerts/*` and `/api/v1/reservations/*`
/// - `/healthz`
/// - `/api-docs/openapi.json` and the `/docs` viewer
/// - `/internal/metrics` when metrics are enabled
///
/// CORS and request tracing wrap everything.
#[instrument(skip_all)]
pub fn build_router<D: Database>(state: AppState<D>) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route(
            "/concerts",
            get(concerts::list_concerts::<D>).post(concerts::create_concert::<D>),
        )
        .route(
            "/concerts/{id}",
            get(concerts::get_concert::<D>)
                .patch(concerts::update_concert::<D>)
                .delete(concerts::delete_concert::<D>),
        )
        .route(
            "/reservations",
            get(reservation_handlers::list_reservations::<D>).post(reservation_handlers::create_reservation::<D>),
        )
        .route("/reservations/me", get(reservation_handlers::list_my_reservations::<D>))
        .route("/reservations/{id}", delete(reservation_handlers::cancel_reservation::<D>))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .nest("/api/v1", api_routes);

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    // Also installs the global recorder behind the reservation counters
    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The seatctl server.
///
/// 1. **Create**: [`Application::new`] connects to Postgres, runs migrations, ensures the
///    admin user and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown signal resolves, then closes the pool and flushes telemetry
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting seatctl with configuration: {:#?}", config);

        let pool = connect_pool(&config).await?;
        migrator().run(&pool).await?;

        let db = PgDatabase::new(pool.clone());
        create_initial_admin_user(&db, &config.admin_email)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

        let state = AppState::builder().db(db).config(config.clone()).build();
        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "seatctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        db::in_memory::InMemoryDatabase,
        test_utils::{create_test_config, create_test_server, create_test_state, create_test_user},
    };
    use axum::http::StatusCode;

    #[test_log::test(tokio::test)]
    async fn test_initial_admin_is_created_once() {
        let db = InMemoryDatabase::new();

        let first = create_initial_admin_user(&db, "boss@example.com").await.unwrap();
        let second = create_initial_admin_user(&db, "boss@example.com").await.unwrap();
        assert_eq!(first, second);

        let mut tx = db.begin().await.unwrap();
        let admin = tx.get_user_by_email("boss@example.com").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[test_log::test(tokio::test)]
    async fn test_existing_user_is_promoted_to_admin() {
        let db = InMemoryDatabase::new();
        let user = create_test_user(&db, "promoted@example.com").await;
        assert_eq!(user.role, Role::User);

        let id = create_initial_admin_user(&db, "promoted@example.com").await.unwrap();
        assert_eq!(id, user.id);

        let mut tx = db.begin().await.unwrap();
        let admin = tx.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[test_log::test(tokio::test)]
    async fn test_healthz_and_openapi_are_public() {
        let server = create_test_server(InMemoryDatabase::new());

        let health = server.get("/healthz").await;
        health.assert_status_ok();
        health.assert_text("OK");

        let doc = server.get("/api-docs/openapi.json").await;
        doc.assert_status_ok();
        let body: serde_json::Value = doc.json();
        assert!(body["paths"]["/concerts"].is_object());
    }

    #[test_log::test(tokio::test)]
    async fn test_metrics_route_absent_when_disabled() {
        let server = create_test_server(InMemoryDatabase::new());
        server
            .get("/internal/metrics")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[test_log::test(tokio::test)]
    async fn test_cors_preflight_allows_configured_origin() {
        let server = create_test_server(InMemoryDatabase::new());

        let response = server
            .method(Method::OPTIONS, "/api/v1/concerts")
            .add_header("origin", "http://localhost:5173")
            .add_header("access-control-request-method", "POST")
            .await;

        assert_eq!(
            response.header("access-control-allow-origin"),
            HeaderValue::from_static("http://localhost:5173")
        );
    }

    #[test]
    fn test_state_uses_configured_cooldown() {
        let mut config = create_test_config();
        config.reservations.rebooking_cooldown = Duration::from_secs(42);
        let state = AppState::builder().db(InMemoryDatabase::new()).config(config).build();
        assert_eq!(state.reservations().policy().rebooking_cooldown(), Duration::from_secs(42));

        let default_state = create_test_state(InMemoryDatabase::new());
        assert_eq!(
            default_state.reservations().policy().rebooking_cooldown(),
            Duration::from_secs(600)
        );
    }
}
