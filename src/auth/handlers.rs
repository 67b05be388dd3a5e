use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, LogoutRequest, PreferencesRequest, PublicUser, RefreshRequest, RegisterRequest},
        extractors::AuthUser,
        services,
    },
    error::AppError,
    response::ApiResponse,
    sessions::{
        self,
        dto::{ActiveSession, ClientMeta, IssuedSession},
    },
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
        .route("/users/refresh-token", post(refresh))
        .route("/users/logout", post(logout))
        .route("/users/logout-all", post(logout_all))
        .route("/users/sessions", get(list_sessions))
        .route("/users/profile", get(get_profile))
        .route("/users/preferences", patch(update_preferences))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<PublicUser>>), AppError> {
    let Json(payload) = payload?;
    let user = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(user).with_message("User registered successfully")),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    meta: ClientMeta,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let Json(payload) = payload?;
    let res = services::login(&state, payload, meta).await?;
    Ok(Json(ApiResponse::data(res).with_message("Login successful")))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    meta: ClientMeta,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<IssuedSession>>, AppError> {
    let Json(payload) = payload?;
    let token = payload
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::validation("Refresh token is required", vec![]))?;
    let issued = sessions::services::refresh_session(&state, &token, meta).await?;
    Ok(Json(
        ApiResponse::data(issued).with_message("Token refreshed successfully"),
    ))
}

#[instrument(skip(state, payload))]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let Json(payload) = payload?;
    let session_id = payload
        .session_id
        .ok_or_else(|| AppError::validation("Session ID is required", vec![]))?;
    sessions::services::revoke_session(&state, session_id, user.id).await?;
    Ok(Json(ApiResponse::message("Session revoked successfully")))
}

#[instrument(skip(state))]
pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let count = sessions::services::revoke_all_sessions(&state, user.id).await?;
    Ok(Json(ApiResponse::message(format!(
        "{count} session(s) revoked successfully"
    ))))
}

#[instrument(skip(state))]
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Json<ApiResponse<Vec<ActiveSession>>> {
    let active = sessions::services::list_active_sessions(&state, user.id).await;
    Json(ApiResponse::list(active))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<PublicUser>>, AppError> {
    let profile = services::profile(&state, user.id).await?;
    Ok(Json(ApiResponse::data(profile)))
}

#[instrument(skip(state, payload))]
pub async fn update_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<PreferencesRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<PublicUser>>, AppError> {
    let Json(payload) = payload?;
    let updated = services::update_preferences(&state, user.id, payload.preferences).await?;
    Ok(Json(
        ApiResponse::data(updated).with_message("Preferences updated successfully"),
    ))
}
