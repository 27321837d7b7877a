use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use super::ApiResult;
use crate::models::{NewUser, UserChanges};
use crate::state::AppState;
use crate::utils::response::{created, empty_success, success};

pub async fn list_users(State(state): State<AppState>) -> ApiResult {
    let users = state.ticketing.list_users().await?;
    Ok(success(users, "Users retrieved"))
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult {
    let Json(new_user) = payload?;
    let user = state.ticketing.create_user(new_user).await?;
    Ok(created(user, "User created"))
}

pub async fn get_user(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let user = state.ticketing.get_user(id).await?;
    Ok(success(user, "User retrieved"))
}

pub async fn update_user(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UserChanges>, JsonRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let Json(changes) = payload?;
    let user = state.ticketing.update_user(id, changes).await?;
    Ok(success(user, "User updated"))
}

pub async fn delete_user(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    state.ticketing.delete_user(id).await?;
    Ok(empty_success("User deleted"))
}

pub async fn list_user_tickets(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let tickets = state.ticketing.list_user_tickets(id).await?;
    Ok(success(tickets, "Tickets retrieved"))
}
