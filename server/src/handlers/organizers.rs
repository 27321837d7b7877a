use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use super::ApiResult;
use crate::featured::organizer_cards;
use crate::models::{NewOrganizer, OrganizerChanges};
use crate::state::AppState;
use crate::utils::response::{created, empty_success, success};

pub async fn featured_organizers() -> Response {
    success(organizer_cards(), "Featured organizers")
}

pub async fn list_organizers(State(state): State<AppState>) -> ApiResult {
    let organizers = state.ticketing.list_organizers().await?;
    Ok(success(organizers, "Organizers retrieved"))
}

pub async fn create_organizer(
    State(state): State<AppState>,
    payload: Result<Json<NewOrganizer>, JsonRejection>,
) -> ApiResult {
    let Json(new_organizer) = payload?;
    let organizer = state.ticketing.create_organizer(new_organizer).await?;
    Ok(created(organizer, "Organizer created"))
}

pub async fn get_organizer(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let organizer = state.ticketing.get_organizer(id).await?;
    Ok(success(organizer, "Organizer retrieved"))
}

pub async fn update_organizer(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<OrganizerChanges>, JsonRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let Json(changes) = payload?;
    let organizer = state.ticketing.update_organizer(id, changes).await?;
    Ok(success(organizer, "Organizer updated"))
}

pub async fn delete_organizer(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    state.ticketing.delete_organizer(id).await?;
    Ok(empty_success("Organizer deleted"))
}
