use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod services;
mod tips;

pub fn router() -> Router<AppState> {
    handlers::summary_routes()
}
