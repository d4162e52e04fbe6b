//! Test helpers: configuration, in-memory application state, seeded rows and a controllable clock.

use crate::{
    AppState,
    api::models::users::Role,
    clock::Clock,
    config::{Config, PoolSettings},
    db::{
        in_memory::InMemoryDatabase,
        models::{
            concerts::{ConcertCreateDBRequest, ConcertDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
        store::{ConcertStore, Database, ReservationLedger, Transaction, UserDirectory},
    },
    types::ConcertId,
};
use axum_test::TestServer;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2025, 6, 1, 19, 30, 0).unwrap())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: crate::config::DatabaseConfig {
            // Postgres tests get their pool from #[sqlx::test]
            url: "postgres://localhost:5432/seatctl_test".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 0,
                ..Default::default()
            },
        },
        admin_email: "admin@test.com".to_string(),
        // The Prometheus recorder is process-global; tests never install it
        enable_metrics: false,
        enable_otel_export: false,
        ..Default::default()
    }
}

pub fn create_test_state(db: InMemoryDatabase) -> AppState<InMemoryDatabase> {
    AppState::builder().db(db).config(create_test_config()).build()
}

/// Full router over the in-memory backend, with the system clock.
pub fn create_test_server(db: InMemoryDatabase) -> TestServer {
    server_for(create_test_state(db))
}

/// Full router over the in-memory backend, with a clock the test controls.
pub fn create_test_server_with_clock(db: InMemoryDatabase, clock: Arc<ManualClock>) -> TestServer {
    let state = AppState::builder()
        .db(db)
        .config(create_test_config())
        .clock(clock as Arc<dyn Clock>)
        .build();
    server_for(state)
}

fn server_for(state: AppState<InMemoryDatabase>) -> TestServer {
    let router = crate::build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

pub async fn create_test_user<D: Database>(db: &D, email: &str) -> UserDBResponse {
    let mut tx = db.begin().await.expect("Failed to begin transaction");
    let user = tx
        .create_user(&UserCreateDBRequest::standard(email))
        .await
        .expect("Failed to create test user");
    tx.commit().await.expect("Failed to commit test user");
    user
}

pub async fn create_test_admin<D: Database>(db: &D, email: &str) -> UserDBResponse {
    let mut tx = db.begin().await.expect("Failed to begin transaction");
    let user = tx
        .create_user(&UserCreateDBRequest {
            email: email.to_string(),
            display_name: Some("Test Admin".to_string()),
            role: Role::Admin,
        })
        .await
        .expect("Failed to create test admin");
    tx.commit().await.expect("Failed to commit test admin");
    user
}

pub async fn create_test_concert<D: Database>(db: &D, total_seats: i32) -> ConcertDBResponse {
    let mut tx = db.begin().await.expect("Failed to begin transaction");
    let concert = tx
        .create_concert(&ConcertCreateDBRequest {
            name: format!("Test concert {}", Uuid::new_v4().simple()),
            description: "An evening of chamber music until dawn".to_string(),
            total_seats,
        })
        .await
        .expect("Failed to create test concert");
    tx.commit().await.expect("Failed to commit test concert");
    concert
}

/// Check the seat counter against the ledger: `available = total - active` and
/// `0 <= available <= total`.
pub async fn assert_seat_invariants<D: Database>(db: &D, concert_id: ConcertId) {
    let mut tx = db.begin().await.expect("Failed to begin transaction");
    let concert = tx
        .get_concert(concert_id)
        .await
        .expect("Failed to load concert")
        .expect("Concert missing");
    let active = tx
        .count_active_for_concert(concert_id)
        .await
        .expect("Failed to count active reservations");
    tx.rollback().await.expect("Failed to roll back");

    assert!(
        (0..=concert.total_seats).contains(&concert.available_seats),
        "available seats {} out of range 0..={}",
        concert.available_seats,
        concert.total_seats
    );
    assert_eq!(
        i64::from(concert.available_seats),
        i64::from(concert.total_seats) - active,
        "seat counter out of step with the ledger"
    );
}
