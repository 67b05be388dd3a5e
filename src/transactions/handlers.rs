use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CreateTransactionRequest, TransactionFilters, UpdateTransactionRequest};
use super::repo_types::Transaction;
use super::services;
use crate::{auth::extractors::AuthUser, error::AppError, response::ApiResponse, state::AppState};

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", post(create_transaction).get(list_transactions))
        .route(
            "/transactions/:id",
            get(get_transaction)
                .patch(update_transaction)
                .delete(delete_transaction),
        )
}

/// Ids that are not UUIDs cannot name a stored transaction.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found("Transaction", raw))
}

#[instrument(skip(state, payload))]
pub async fn create_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Transaction>>), AppError> {
    let Json(payload) = payload?;
    let tx = services::create(&state, user.id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(tx).with_message("Transaction created successfully")),
    ))
}

#[instrument(skip(state))]
pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filters): Query<TransactionFilters>,
) -> Json<ApiResponse<Vec<Transaction>>> {
    let txs = services::get_all(&state, user.id, &filters).await;
    Json(ApiResponse::list(txs))
}

#[instrument(skip(state))]
pub async fn get_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Transaction>>, AppError> {
    let tx = services::get_by_id(&state, user.id, parse_id(&id)?).await?;
    Ok(Json(ApiResponse::data(tx)))
}

#[instrument(skip(state, payload))]
pub async fn update_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTransactionRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Transaction>>, AppError> {
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let tx = services::update(&state, user.id, id, payload).await?;
    Ok(Json(
        ApiResponse::data(tx).with_message("Transaction updated successfully"),
    ))
}

#[instrument(skip(state))]
pub async fn delete_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    services::delete(&state, user.id, parse_id(&id)?).await?;
    Ok(Json(ApiResponse::message("Transaction deleted successfully")))
}
