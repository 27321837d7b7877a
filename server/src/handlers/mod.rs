use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod events;
pub mod organizers;
pub mod tickets;
pub mod tiers;
pub mod transactions;
pub mod users;

pub type ApiResult = Result<Response, AppError>;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
    store: &'static str,
}

pub async fn health_check(State(state): State<AppState>) -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "agora-api",
        store: state.ticketing.backend_tag(),
    };

    success(payload, "Health check successful")
}
