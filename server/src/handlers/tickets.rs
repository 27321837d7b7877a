use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResult;
use crate::state::AppState;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub to_user_id: Uuid,
}

pub async fn get_ticket(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let details = state.ticketing.get_ticket(id).await?;
    Ok(success(details, "Ticket retrieved"))
}

pub async fn cancel_ticket(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let ticket = state.ticketing.cancel_ticket(id).await?;
    Ok(success(ticket, "Ticket cancelled"))
}

pub async fn check_in_ticket(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let ticket = state.ticketing.check_in_ticket(id).await?;
    Ok(success(ticket, "Ticket checked in"))
}

pub async fn transfer_ticket(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let Json(request) = payload?;
    let ticket = state
        .ticketing
        .transfer_ticket(id, request.to_user_id)
        .await?;
    Ok(success(ticket, "Ticket transferred"))
}
