//! HTTP handlers for seat reservations.

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        reservations::{ListOwnReservationsQuery, ListReservationsQuery, ReservationCreate, ReservationResponse},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{handlers::ReservationFilter, store::Database},
    errors::Result,
    types::ReservationId,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

/// Reserve a seat
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    summary = "Reserve a seat",
    description = "Reserve one seat of a concert for the caller. A cancelled reservation for the same concert is \
                   reactivated (same ID) once the re-booking cooldown has passed.",
    request_body = ReservationCreate,
    responses(
        (status = 201, description = "Seat reserved", body = ReservationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Concert not found"),
        (status = 409, description = "No seats available, or the caller already holds an active reservation"),
        (status = 429, description = "Re-booking cooldown active; Retry-After gives the seconds remaining"),
    ),
    security(("X-Seatctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_reservation<D: Database>(
    State(state): State<AppState<D>>,
    perm: RequiresPermission<resource::Reservations, operation::CreateOwn>,
    Json(body): Json<ReservationCreate>,
) -> Result<(StatusCode, Json<ReservationResponse>)> {
    let reservation = state.reservations().reserve(body.concert_id, perm.user.id).await?;
    Ok((StatusCode::CREATED, Json(reservation.into())))
}

/// Cancel a reservation
#[utoipa::path(
    delete,
    path = "/reservations/{id}",
    tag = "reservations",
    summary = "Cancel a reservation",
    description = "Cancel one of the caller's own reservations and release its seat",
    params(("id" = String, Path, description = "Reservation ID", format = "uuid")),
    responses(
        (status = 200, description = "Reservation cancelled", body = ReservationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "The reservation belongs to another user"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation already cancelled"),
    ),
    security(("X-Seatctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn cancel_reservation<D: Database>(
    State(state): State<AppState<D>>,
    perm: RequiresPermission<resource::Reservations, operation::DeleteOwn>,
    Path(id): Path<ReservationId>,
) -> Result<Json<ReservationResponse>> {
    let reservation = state.reservations().cancel(id, perm.user.id).await?;
    Ok(Json(reservation.into()))
}

/// List the caller's reservations
#[utoipa::path(
    get,
    path = "/reservations/me",
    tag = "reservations",
    summary = "List my reservations",
    description = "The caller's reservations, active and cancelled, newest first",
    params(ListOwnReservationsQuery),
    responses(
        (status = 200, description = "Page of reservations", body = PaginatedResponse<ReservationResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Seatctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_my_reservations<D: Database>(
    State(state): State<AppState<D>>,
    perm: RequiresPermission<resource::Reservations, operation::ReadOwn>,
    Query(query): Query<ListOwnReservationsQuery>,
) -> Result<Json<PaginatedResponse<ReservationResponse>>> {
    let (skip, limit) = query.pagination.params();
    let (reservations, total_count) = state.reservations().list_for_user(perm.user.id, skip, limit).await?;

    Ok(Json(PaginatedResponse::new(
        reservations.into_iter().map(ReservationResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// List all reservations
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    summary = "List all reservations",
    description = "Every reservation, newest first, optionally filtered by status, concert or search term (admin only)",
    params(ListReservationsQuery),
    responses(
        (status = 200, description = "Page of reservations", body = PaginatedResponse<ReservationResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(("X-Seatctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_reservations<D: Database>(
    State(state): State<AppState<D>>,
    _: RequiresPermission<resource::Reservations, operation::ReadAll>,
    Query(query): Query<ListReservationsQuery>,
) -> Result<Json<PaginatedResponse<ReservationResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = ReservationFilter::new(skip, limit)
        .with_status(query.status)
        .with_search(query.search);
    if let Some(concert_id) = query.concert_id {
        filter = filter.for_concert(concert_id);
    }

    let (reservations, total_count) = state.reservations().list_all(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        reservations.into_iter().map(ReservationResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{pagination::PaginatedResponse, reservations::ReservationResponse},
        db::{in_memory::InMemoryDatabase, models::reservations::ReservationStatus},
        test_utils::{
            ManualClock, assert_seat_invariants, create_test_admin, create_test_concert, create_test_server,
            create_test_server_with_clock, create_test_user,
        },
    };
    use axum::http::{StatusCode, header};
    use chrono::TimeDelta;
    use serde_json::json;
    use std::sync::Arc;

    const USER_HEADER: &str = "x-seatctl-user";

    #[test_log::test(tokio::test)]
    async fn test_reserve_requires_identity() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let concert = create_test_concert(&db, 1).await;

        let response = server
            .post("/api/v1/reservations")
            .json(&json!({ "concertId": concert.id }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_reserve_and_cancel_round_trip() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let user = create_test_user(&db, "fan@example.com").await;
        let concert = create_test_concert(&db, 2).await;

        let response = server
            .post("/api/v1/reservations")
            .add_header(USER_HEADER, &user.email)
            .json(&json!({ "concertId": concert.id }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let reservation: ReservationResponse = response.json();
        assert_eq!(reservation.user_id, user.id);
        assert_eq!(reservation.status, ReservationStatus::Active);

        let response = server
            .delete(&format!("/api/v1/reservations/{}", reservation.id))
            .add_header(USER_HEADER, &user.email)
            .await;
        response.assert_status_ok();
        let cancelled: ReservationResponse = response.json();
        assert_eq!(cancelled.id, reservation.id);
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);

        let response = server
            .delete(&format!("/api/v1/reservations/{}", reservation.id))
            .add_header(USER_HEADER, &user.email)
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "already_cancelled");

        assert_seat_invariants(&db, concert.id).await;
    }

    #[test_log::test(tokio::test)]
    async fn test_sold_out_and_duplicate_are_conflicts() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let alice = create_test_user(&db, "alice@example.com").await;
        let bob = create_test_user(&db, "bob@example.com").await;
        let concert = create_test_concert(&db, 1).await;

        server
            .post("/api/v1/reservations")
            .add_header(USER_HEADER, &alice.email)
            .json(&json!({ "concertId": concert.id }))
            .await
            .assert_status(StatusCode::CREATED);

        let duplicate = server
            .post("/api/v1/reservations")
            .add_header(USER_HEADER, &alice.email)
            .json(&json!({ "concertId": concert.id }))
            .await;
        duplicate.assert_status(StatusCode::CONFLICT);
        assert_eq!(duplicate.json::<serde_json::Value>()["error"], "already_reserved");

        let sold_out = server
            .post("/api/v1/reservations")
            .add_header(USER_HEADER, &bob.email)
            .json(&json!({ "concertId": concert.id }))
            .await;
        sold_out.assert_status(StatusCode::CONFLICT);
        assert_eq!(sold_out.json::<serde_json::Value>()["error"], "no_seats_available");
    }

    #[test_log::test(tokio::test)]
    async fn test_cooldown_response() {
        let db = InMemoryDatabase::new();
        let clock = Arc::new(ManualClock::default());
        let server = create_test_server_with_clock(db.clone(), clock.clone());
        let user = create_test_user(&db, "fan@example.com").await;
        let concert = create_test_concert(&db, 5).await;

        let reservation: ReservationResponse = server
            .post("/api/v1/reservations")
            .add_header(USER_HEADER, &user.email)
            .json(&json!({ "concertId": concert.id }))
            .await
            .json();
        server
            .delete(&format!("/api/v1/reservations/{}", reservation.id))
            .add_header(USER_HEADER, &user.email)
            .await
            .assert_status_ok();

        clock.advance(TimeDelta::minutes(7));
        let response = server
            .post("/api/v1/reservations")
            .add_header(USER_HEADER, &user.email)
            .json(&json!({ "concertId": concert.id }))
            .await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.header(header::RETRY_AFTER), "180");
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "cooldown_active");
        assert!(body["message"].as_str().unwrap().contains('3'));

        clock.advance(TimeDelta::minutes(3));
        let response = server
            .post("/api/v1/reservations")
            .add_header(USER_HEADER, &user.email)
            .json(&json!({ "concertId": concert.id }))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<ReservationResponse>().id, reservation.id);
    }

    #[test_log::test(tokio::test)]
    async fn test_cancel_someone_elses_reservation_is_forbidden() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let owner = create_test_user(&db, "owner@example.com").await;
        let other = create_test_user(&db, "other@example.com").await;
        let concert = create_test_concert(&db, 2).await;

        let reservation: ReservationResponse = server
            .post("/api/v1/reservations")
            .add_header(USER_HEADER, &owner.email)
            .json(&json!({ "concertId": concert.id }))
            .await
            .json();

        let response = server
            .delete(&format!("/api/v1/reservations/{}", reservation.id))
            .add_header(USER_HEADER, &other.email)
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<serde_json::Value>()["error"], "forbidden");
        assert_seat_invariants(&db, concert.id).await;
    }

    #[test_log::test(tokio::test)]
    async fn test_list_own_and_all_reservations() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let admin = create_test_admin(&db, "admin@example.com").await;
        let alice = create_test_user(&db, "alice@example.com").await;
        let bob = create_test_user(&db, "bob@example.com").await;
        let concert = create_test_concert(&db, 10).await;

        for user in [&alice, &bob] {
            server
                .post("/api/v1/reservations")
                .add_header(USER_HEADER, &user.email)
                .json(&json!({ "concertId": concert.id }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let mine: PaginatedResponse<ReservationResponse> = server
            .get("/api/v1/reservations/me")
            .add_header(USER_HEADER, &alice.email)
            .await
            .json();
        assert_eq!(mine.total_count, 1);
        assert_eq!(mine.data[0].user_id, alice.id);
        let booked = mine.data[0].concert.as_ref().unwrap();
        assert_eq!(booked.name, concert.name);
        assert_eq!(booked.available_seats, 8);
        assert!(mine.data[0].user.is_none());

        server
            .get("/api/v1/reservations")
            .add_header(USER_HEADER, &alice.email)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let all: PaginatedResponse<ReservationResponse> = server
            .get("/api/v1/reservations")
            .add_query_param("status", "active")
            .add_query_param("concert_id", concert.id)
            .add_header(USER_HEADER, &admin.email)
            .await
            .json();
        assert_eq!(all.total_count, 2);

        let searched: PaginatedResponse<ReservationResponse> = server
            .get("/api/v1/reservations")
            .add_query_param("search", "BOB@")
            .add_header(USER_HEADER, &admin.email)
            .await
            .json();
        assert_eq!(searched.total_count, 1);
        assert_eq!(searched.data[0].user_id, bob.id);
        assert_eq!(searched.data[0].user.as_ref().unwrap().email, "bob@example.com");
        assert_eq!(searched.data[0].concert.as_ref().unwrap().id, concert.id);
    }
}
