//! OpenAPI document for the `/api/v1` surface, served at `/api-docs/openapi.json`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Identity header set by the trusted upstream proxy.
struct ProxyHeaderSecurityAddon;

impl Modify for ProxyHeaderSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "X-Seatctl-User",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "X-Seatctl-User",
                    "Email address of the caller, set by the authenticating proxy in front of seatctl. \
                     Unknown addresses are provisioned as standard users.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "seatctl",
        description = "Concert seat inventory and reservations. Seats are never oversold: every reservation \
                       takes exactly one seat and every cancellation returns it."
    ),
    servers((url = "/api/v1")),
    paths(
        api::handlers::concerts::list_concerts,
        api::handlers::concerts::get_concert,
        api::handlers::concerts::create_concert,
        api::handlers::concerts::update_concert,
        api::handlers::concerts::delete_concert,
        api::handlers::reservations::create_reservation,
        api::handlers::reservations::cancel_reservation,
        api::handlers::reservations::list_my_reservations,
        api::handlers::reservations::list_reservations,
    ),
    components(schemas(
        api::models::concerts::ConcertCreate,
        api::models::concerts::ConcertUpdate,
        api::models::concerts::ConcertResponse,
        api::models::reservations::ReservationCreate,
        api::models::reservations::ReservationResponse,
        api::models::reservations::ReservationConcert,
        api::models::reservations::ReservationHolder,
        crate::db::models::reservations::ReservationStatus,
    )),
    modifiers(&ProxyHeaderSecurityAddon),
    tags(
        (name = "concerts", description = "Concert catalogue and administration"),
        (name = "reservations", description = "Reserving and cancelling seats"),
    )
)]
pub struct ApiDoc;
