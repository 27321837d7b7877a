use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResult;
use crate::state::AppState;
use crate::utils::response::success;

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    pub transaction_hash: Option<String>,
}

pub async fn get_transaction(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let transaction = state.ticketing.get_transaction(id).await?;
    Ok(success(transaction, "Transaction retrieved"))
}

/// A request without a JSON body confirms without a settlement hash; a body
/// that does not parse is rejected, since settlement cannot be redone.
pub async fn confirm_transaction(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let request = match payload {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => ConfirmRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let transaction = state
        .ticketing
        .confirm_transaction(id, request.transaction_hash)
        .await?;
    Ok(success(transaction, "Transaction completed"))
}

pub async fn fail_transaction(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let purchase = state.ticketing.fail_transaction(id).await?;
    Ok(success(purchase, "Transaction failed, ticket cancelled"))
}
