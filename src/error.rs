use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::state::AppState;

/// Every failure a handler can report.
///
/// All variants except `Internal` are expected, user-facing outcomes and are
/// rendered with their message; `Internal` is logged and flattened.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(resource: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{resource} with id '{id}' not found"))
    }

    pub fn validation(message: impl Into<String>, details: Vec<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("Invalid request body", vec![rejection.body_text()])
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Raw cause of a 500, carried on the response so that
/// [`expose_internal_errors`] can surface it in development.
#[derive(Debug, Clone)]
pub struct InternalDetail(pub String);

const GENERIC_MESSAGE: &str = "Something went wrong!";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = if status.is_client_error() { "fail" } else { "error" };

        match self {
            AppError::Internal(e) => {
                error!(error = ?e, "unexpected error");
                let body = ErrorBody {
                    success: false,
                    status: kind,
                    message: GENERIC_MESSAGE.into(),
                    details: None,
                    error: None,
                };
                let mut res = (status, Json(body)).into_response();
                res.extensions_mut().insert(InternalDetail(format!("{e:#}")));
                res
            }
            AppError::Validation { message, details } => {
                warn!(%message, ?details, "validation failed");
                let body = ErrorBody {
                    success: false,
                    status: kind,
                    message,
                    details: Some(details),
                    error: None,
                };
                (status, Json(body)).into_response()
            }
            other => {
                let body = ErrorBody {
                    success: false,
                    status: kind,
                    message: other.to_string(),
                    details: None,
                    error: None,
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

/// In development mode, re-renders 500 responses with the underlying cause.
pub async fn expose_internal_errors(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let res = next.run(req).await;
    if !state.config.is_development() {
        return res;
    }
    let Some(InternalDetail(detail)) = res.extensions().get::<InternalDetail>().cloned() else {
        return res;
    };
    let body = ErrorBody {
        success: false,
        status: "error",
        message: GENERIC_MESSAGE.into(),
        details: None,
        error: Some(detail),
    };
    (res.status(), Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AppError::not_found("Transaction", "abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::validation("bad", vec![]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::unauthorized("no").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Forbidden("nope".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::TooManyRequests("slow down".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::from(anyhow::anyhow!("disk on fire")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_resource_and_id() {
        let err = AppError::not_found("Budget", "2025-01");
        assert_eq!(err.to_string(), "Budget with id '2025-01' not found");
    }

    #[test]
    fn internal_response_hides_cause_but_keeps_detail_extension() {
        let res = AppError::from(anyhow::anyhow!("secret path /etc/x")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = res.extensions().get::<InternalDetail>().unwrap();
        assert!(detail.0.contains("secret path"));
    }
}
