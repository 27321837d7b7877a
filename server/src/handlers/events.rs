use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResult;
use crate::models::{EventChanges, EventFilter, NewEvent, NewTicketTier};
use crate::state::AppState;
use crate::utils::response::{created, empty_success, success};

/// Tier payload; the event comes from the path.
#[derive(Debug, Deserialize)]
pub struct CreateTierRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub total_quantity: i32,
    pub available_quantity: Option<i32>,
}

pub async fn list_events(
    State(state): State<AppState>,
    filter: Result<Query<EventFilter>, QueryRejection>,
) -> ApiResult {
    let Query(filter) = filter?;
    let events = state.ticketing.list_events(filter).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<NewEvent>, JsonRejection>,
) -> ApiResult {
    let Json(new_event) = payload?;
    let event = state.ticketing.create_event(new_event).await?;
    Ok(created(event, "Event created"))
}

pub async fn get_event(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let event = state.ticketing.get_event(id).await?;
    Ok(success(event, "Event retrieved"))
}

pub async fn update_event(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<EventChanges>, JsonRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let Json(changes) = payload?;
    let event = state.ticketing.update_event(id, changes).await?;
    Ok(success(event, "Event updated"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    state.ticketing.delete_event(id).await?;
    Ok(empty_success("Event deleted"))
}

pub async fn list_event_tiers(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let tiers = state.ticketing.list_tiers(id).await?;
    Ok(success(tiers, "Ticket tiers retrieved"))
}

pub async fn create_event_tier(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CreateTierRequest>, JsonRejection>,
) -> ApiResult {
    let Path(event_id) = id?;
    let Json(request) = payload?;
    let tier = state
        .ticketing
        .create_tier(NewTicketTier {
            event_id,
            name: request.name,
            description: request.description,
            price: request.price,
            total_quantity: request.total_quantity,
            available_quantity: request.available_quantity,
        })
        .await?;
    Ok(created(tier, "Ticket tier created"))
}
