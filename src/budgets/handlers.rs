use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::UpsertBudgetRequest;
use super::repo_types::Budget;
use super::services;
use crate::{auth::extractors::AuthUser, error::AppError, response::ApiResponse, state::AppState};

/// `GET /budgets/:key` reads by month, `DELETE /budgets/:key` deletes by id.
pub fn budget_routes() -> Router<AppState> {
    Router::new()
        .route("/budgets", post(upsert_budget).get(list_budgets))
        .route("/budgets/:key", get(get_budget_by_month).delete(delete_budget))
}

#[instrument(skip(state, payload))]
pub async fn upsert_budget(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<UpsertBudgetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Budget>>), AppError> {
    let Json(payload) = payload?;
    let budget = services::upsert(&state, user.id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(budget).with_message("Budget saved successfully")),
    ))
}

#[instrument(skip(state))]
pub async fn list_budgets(
    State(state): State<AppState>,
    user: AuthUser,
) -> Json<ApiResponse<Vec<Budget>>> {
    Json(ApiResponse::list(services::get_all(&state, user.id).await))
}

#[instrument(skip(state))]
pub async fn get_budget_by_month(
    State(state): State<AppState>,
    user: AuthUser,
    Path(month): Path<String>,
) -> Result<Json<ApiResponse<Budget>>, AppError> {
    let budget = services::get_by_month(&state, user.id, &month).await?;
    Ok(Json(ApiResponse::data(budget)))
}

#[instrument(skip(state))]
pub async fn delete_budget(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::not_found("Budget", &id))?;
    services::delete(&state, user.id, id).await?;
    Ok(Json(ApiResponse::message("Budget deleted successfully")))
}
