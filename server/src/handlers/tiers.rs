use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResult;
use crate::models::TicketTierChanges;
use crate::state::AppState;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub user_id: Uuid,
    pub currency: Option<String>,
    pub qr_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchPurchaseRequest {
    pub user_id: Uuid,
    pub quantity: i32,
    pub currency: Option<String>,
}

pub async fn get_tier(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let tier = state.ticketing.get_tier(id).await?;
    Ok(success(tier, "Ticket tier retrieved"))
}

pub async fn update_tier(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<TicketTierChanges>, JsonRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let Json(changes) = payload?;
    let tier = state.ticketing.update_tier(id, changes).await?;
    Ok(success(tier, "Ticket tier updated"))
}

pub async fn delete_tier(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    state.ticketing.delete_tier(id).await?;
    Ok(empty_success("Ticket tier deleted"))
}

pub async fn purchase_ticket(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PurchaseRequest>, JsonRejection>,
) -> ApiResult {
    let Path(tier_id) = id?;
    let Json(request) = payload?;
    let purchase = state
        .ticketing
        .purchase_ticket(
            tier_id,
            request.user_id,
            request.currency.as_deref(),
            request.qr_code,
        )
        .await?;
    Ok(created(purchase, "Ticket reserved, payment pending"))
}

pub async fn purchase_tickets(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<BatchPurchaseRequest>, JsonRejection>,
) -> ApiResult {
    let Path(tier_id) = id?;
    let Json(request) = payload?;
    let batch = state
        .ticketing
        .purchase_tickets(
            tier_id,
            request.user_id,
            request.quantity,
            request.currency.as_deref(),
        )
        .await?;
    Ok(created(batch, "Tickets reserved, payments pending"))
}
