use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{BudgetComparison, MonthlyTrend, SavingTips, Summary, SummaryQuery};
use super::services;
use crate::{auth::extractors::AuthUser, error::AppError, response::ApiResponse, state::AppState};

pub fn summary_routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(get_summary))
        .route("/summary/trends", get(get_trends))
        .route("/summary/tips", get(get_tips))
        .route("/summary/budget/:month", get(get_budget_comparison))
}

#[instrument(skip(state))]
pub async fn get_summary(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<ApiResponse<Summary>>, AppError> {
    let summary = services::get_summary(&state, user.id, q.month.as_deref()).await?;
    Ok(Json(ApiResponse::data(summary)))
}

#[instrument(skip(state))]
pub async fn get_trends(
    State(state): State<AppState>,
    user: AuthUser,
) -> Json<ApiResponse<Vec<MonthlyTrend>>> {
    Json(ApiResponse::data(
        services::get_monthly_trends(&state, user.id).await,
    ))
}

#[instrument(skip(state))]
pub async fn get_tips(State(state): State<AppState>, user: AuthUser) -> Json<ApiResponse<SavingTips>> {
    Json(ApiResponse::data(services::get_saving_tips(&state, user.id).await))
}

#[instrument(skip(state))]
pub async fn get_budget_comparison(
    State(state): State<AppState>,
    user: AuthUser,
    Path(month): Path<String>,
) -> Result<Json<ApiResponse<BudgetComparison>>, AppError> {
    let comparison = services::get_budget_comparison(&state, user.id, &month).await?;
    Ok(Json(ApiResponse::data(comparison)))
}
