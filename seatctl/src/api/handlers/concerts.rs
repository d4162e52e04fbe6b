//! HTTP handlers for the concert catalogue.

use crate::{
    AppState,
    api::models::{
        concerts::{ConcertCreate, ConcertResponse, ConcertUpdate, ListConcertsQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{handlers::ConcertFilter, store::Database},
    errors::Result,
    types::ConcertId,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

/// List concerts
#[utoipa::path(
    get,
    path = "/concerts",
    tag = "concerts",
    summary = "List concerts",
    description = "Paginated list of concerts, newest first, with their current seat availability",
    params(ListConcertsQuery),
    responses(
        (status = 200, description = "Page of concerts", body = PaginatedResponse<ConcertResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(("X-Seatctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_concerts<D: Database>(
    State(state): State<AppState<D>>,
    _: RequiresPermission<resource::Concerts, operation::ReadAll>,
    Query(query): Query<ListConcertsQuery>,
) -> Result<Json<PaginatedResponse<ConcertResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = ConcertFilter::new(skip, limit).with_search(query.search);

    let (concerts, total_count) = state.inventory().list(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        concerts.into_iter().map(ConcertResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Get a concert
#[utoipa::path(
    get,
    path = "/concerts/{id}",
    tag = "concerts",
    summary = "Get a concert",
    params(("id" = String, Path, description = "Concert ID", format = "uuid")),
    responses(
        (status = 200, description = "Concert", body = ConcertResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Concert not found"),
    ),
    security(("X-Seatctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_concert<D: Database>(
    State(state): State<AppState<D>>,
    _: RequiresPermission<resource::Concerts, operation::ReadAll>,
    Path(id): Path<ConcertId>,
) -> Result<Json<ConcertResponse>> {
    let concert = state.inventory().get(id).await?;
    Ok(Json(concert.into()))
}

/// Create a concert
#[utoipa::path(
    post,
    path = "/concerts",
    tag = "concerts",
    summary = "Create a concert",
    description = "Create a concert with all seats available (admin only)",
    request_body = ConcertCreate,
    responses(
        (status = 201, description = "Concert created", body = ConcertResponse),
        (status = 400, description = "Invalid name, description or seat count"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(("X-Seatctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_concert<D: Database>(
    State(state): State<AppState<D>>,
    _: RequiresPermission<resource::Concerts, operation::CreateAll>,
    Json(body): Json<ConcertCreate>,
) -> Result<(StatusCode, Json<ConcertResponse>)> {
    let request = body.into_db_request()?;
    let concert = state.inventory().create(&request).await?;
    Ok((StatusCode::CREATED, Json(concert.into())))
}

/// Update a concert
#[utoipa::path(
    patch,
    path = "/concerts/{id}",
    tag = "concerts",
    summary = "Update a concert",
    description = "Change the name, description or capacity (admin only). Capacity can't drop below the seats already reserved.",
    params(("id" = String, Path, description = "Concert ID", format = "uuid")),
    request_body = ConcertUpdate,
    responses(
        (status = 200, description = "Concert updated", body = ConcertResponse),
        (status = 400, description = "Invalid field, or capacity below the reserved seats"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Concert not found"),
    ),
    security(("X-Seatctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_concert<D: Database>(
    State(state): State<AppState<D>>,
    _: RequiresPermission<resource::Concerts, operation::UpdateAll>,
    Path(id): Path<ConcertId>,
    Json(body): Json<ConcertUpdate>,
) -> Result<Json<ConcertResponse>> {
    let changes = body.into_changes()?;
    let concert = state.inventory().update(id, &changes).await?;
    Ok(Json(concert.into()))
}

/// Delete a concert
#[utoipa::path(
    delete,
    path = "/concerts/{id}",
    tag = "concerts",
    summary = "Delete a concert",
    description = "Delete a concert and all of its reservations (admin only)",
    params(("id" = String, Path, description = "Concert ID", format = "uuid")),
    responses(
        (status = 204, description = "Concert deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Concert not found"),
    ),
    security(("X-Seatctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_concert<D: Database>(
    State(state): State<AppState<D>>,
    _: RequiresPermission<resource::Concerts, operation::DeleteAll>,
    Path(id): Path<ConcertId>,
) -> Result<StatusCode> {
    state.inventory().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{concerts::ConcertResponse, pagination::PaginatedResponse},
        db::in_memory::InMemoryDatabase,
        test_utils::{create_test_admin, create_test_concert, create_test_server, create_test_user},
    };
    use axum::http::StatusCode;
    use serde_json::json;

    const USER_HEADER: &str = "x-seatctl-user";

    #[test_log::test(tokio::test)]
    async fn test_admin_creates_concert() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let admin = create_test_admin(&db, "admin@example.com").await;

        let response = server
            .post("/api/v1/concerts")
            .add_header(USER_HEADER, &admin.email)
            .json(&json!({
                "name": "Midnight Strings",
                "description": "A string quartet plays until dawn",
                "totalSeats": 120
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let concert: ConcertResponse = response.json();
        assert_eq!(concert.total_seats, 120);
        assert_eq!(concert.available_seats, 120);
    }

    #[test_log::test(tokio::test)]
    async fn test_standard_user_cannot_create_concert() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let user = create_test_user(&db, "fan@example.com").await;

        let response = server
            .post("/api/v1/concerts")
            .add_header(USER_HEADER, &user.email)
            .json(&json!({
                "name": "Midnight Strings",
                "description": "A string quartet plays until dawn",
                "totalSeats": 120
            }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[test_log::test(tokio::test)]
    async fn test_create_validation_errors() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let admin = create_test_admin(&db, "admin@example.com").await;

        let response = server
            .post("/api/v1/concerts")
            .add_header(USER_HEADER, &admin.email)
            .json(&json!({ "name": "Ok name", "description": "short", "totalSeats": 10 }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "bad_request");
    }

    #[test_log::test(tokio::test)]
    async fn test_list_and_get_concerts() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let user = create_test_user(&db, "fan@example.com").await;
        let first = create_test_concert(&db, 10).await;
        create_test_concert(&db, 20).await;

        let response = server
            .get("/api/v1/concerts")
            .add_query_param("limit", 1)
            .add_header(USER_HEADER, &user.email)
            .await;
        response.assert_status_ok();
        let page: PaginatedResponse<ConcertResponse> = response.json();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.limit, 1);

        let response = server
            .get(&format!("/api/v1/concerts/{}", first.id))
            .add_header(USER_HEADER, &user.email)
            .await;
        response.assert_status_ok();
        let concert: ConcertResponse = response.json();
        assert_eq!(concert.id, first.id);
    }

    #[test_log::test(tokio::test)]
    async fn test_get_unknown_concert_is_not_found() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let user = create_test_user(&db, "fan@example.com").await;

        let response = server
            .get(&format!("/api/v1/concerts/{}", uuid::Uuid::new_v4()))
            .add_header(USER_HEADER, &user.email)
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "not_found");
    }

    #[test_log::test(tokio::test)]
    async fn test_shrink_below_reserved_is_rejected() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let admin = create_test_admin(&db, "admin@example.com").await;
        let concert = create_test_concert(&db, 3).await;

        for i in 0..2 {
            server
                .post("/api/v1/reservations")
                .add_header(USER_HEADER, format!("fan{i}@example.com"))
                .json(&json!({ "concertId": concert.id }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = server
            .patch(&format!("/api/v1/concerts/{}", concert.id))
            .add_header(USER_HEADER, &admin.email)
            .json(&json!({ "totalSeats": 1 }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "capacity_below_reserved");

        let response = server
            .patch(&format!("/api/v1/concerts/{}", concert.id))
            .add_header(USER_HEADER, &admin.email)
            .json(&json!({ "totalSeats": 2 }))
            .await;
        response.assert_status_ok();
        let updated: ConcertResponse = response.json();
        assert_eq!((updated.total_seats, updated.available_seats), (2, 0));
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_concert() {
        let db = InMemoryDatabase::new();
        let server = create_test_server(db.clone());
        let admin = create_test_admin(&db, "admin@example.com").await;
        let concert = create_test_concert(&db, 3).await;

        server
            .delete(&format!("/api/v1/concerts/{}", concert.id))
            .add_header(USER_HEADER, &admin.email)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .delete(&format!("/api/v1/concerts/{}", concert.id))
            .add_header(USER_HEADER, &admin.email)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
