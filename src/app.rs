use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::{Request, State},
    http::{Method, Response, StatusCode, Uri},
    middleware,
    routing::get,
    BoxError, Json, Router,
};
use serde::Serialize;
use time::OffsetDateTime;
use tower::{
    buffer::BufferLayer, limit::RateLimitLayer, load_shed::error::Overloaded,
    load_shed::LoadShedLayer, ServiceBuilder,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{field, Span};
use uuid::Uuid;

use crate::config::RateLimitConfig;
use crate::error::{expose_internal_errors, AppError};
use crate::state::AppState;
use crate::{auth, budgets, summary, transactions};

const RATE_LIMIT_QUEUE: usize = 1024;

#[derive(Debug, Serialize)]
struct Health {
    success: bool,
    message: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    uptime: f64,
    environment: String,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        success: true,
        message: "FinEdge API is running",
        timestamp: OffsetDateTime::now_utc(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        environment: state.config.environment.clone(),
    })
}

async fn route_not_found(method: Method, uri: Uri) -> AppError {
    let target = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
    AppError::NotFound(format!("Route {method} {target} not found"))
}

async fn too_many_requests(err: BoxError) -> AppError {
    if err.is::<Overloaded>() {
        AppError::TooManyRequests("Too many requests. Please try again later.".into())
    } else {
        AppError::Internal(anyhow::anyhow!(err))
    }
}

/// One request budget shared by every route. Requests over the budget are
/// shed with a 429 instead of queued.
fn rate_limited(routes: Router, limit: RateLimitConfig) -> Router {
    let window = Duration::from_millis(limit.window_ms.max(1));
    let service = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(too_many_requests))
        .layer(BufferLayer::<Request>::new(RATE_LIMIT_QUEUE))
        .layer(LoadShedLayer::new())
        .layer(RateLimitLayer::new(limit.max_requests.max(1), window))
        .service(routes);
    Router::new().fallback_service(service)
}

pub fn build_app(state: AppState) -> Router {
    let limit = state.config.rate_limit;
    let routes = Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(transactions::router())
        .merge(budgets::router())
        .merge(summary::router())
        .fallback(route_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            expose_internal_errors,
        ))
        .with_state(state);

    rate_limited(routes, limit)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    tracing::info_span!(
                        "request",
                        id = %Uuid::new_v4(),
                        method = %req.method(),
                        uri = %req.uri(),
                        status = field::Empty,
                        latency_ms = field::Empty,
                    )
                })
                .on_response(|res: &Response<_>, latency: Duration, span: &Span| {
                    let status = res.status();
                    span.record("status", status.as_u16());
                    span.record("latency_ms", latency.as_millis() as u64);
                    if status.is_server_error() {
                        tracing::error!(%status, "request failed");
                    } else if status == StatusCode::TOO_MANY_REQUESTS {
                        tracing::warn!("request rate limited");
                    } else {
                        tracing::debug!(%status, "request done");
                    }
                }),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port).parse()?;
    let app = build_app(state.clone());

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = axum::http::Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Registers and logs in; returns `(access, refresh, session_id)`.
    async fn sign_up(app: &Router, email: &str) -> (String, String, String) {
        let (status, _) = call(
            app,
            "POST",
            "/users",
            None,
            Some(json!({"name": "Test User", "email": email, "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            app,
            "POST",
            "/users/login",
            None,
            Some(json!({"email": email, "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        (
            data["accessToken"].as_str().unwrap().to_string(),
            data["refreshToken"].as_str().unwrap().to_string(),
            data["session"]["id"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn health_and_unknown_route() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(AppState::fake(dir.path()).await);

        let (status, body) = call(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["environment"], "test");

        let (status, body) = call(&app, "GET", "/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "Route GET /nope not found");

        let (_, body) = call(&app, "DELETE", "/nope?page=2", None, None).await;
        assert_eq!(body["message"], "Route DELETE /nope?page=2 not found");
    }

    #[tokio::test]
    async fn requests_over_budget_get_429() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::fake_with(dir.path(), |c| {
            c.rate_limit = RateLimitConfig {
                window_ms: 60_000,
                max_requests: 2,
            }
        })
        .await;
        let app = build_app(state);

        for _ in 0..2 {
            let (status, _) = call(&app, "GET", "/health", None, None).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = call(&app, "GET", "/nope", None, None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body,
            json!({
                "success": false,
                "status": "fail",
                "message": "Too many requests. Please try again later."
            })
        );
    }

    #[tokio::test]
    async fn malformed_summary_month_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(AppState::fake(dir.path()).await);
        let (token, _, _) = sign_up(&app, "month@example.com").await;

        let (status, body) = call(&app, "GET", "/summary?month=junk-1", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0], r#"Field "month" must be in YYYY-MM format"#);
        let (status, _) = call(&app, "GET", "/summary/budget/2025", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, "GET", "/summary/budget/2025-04", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn ledger_flow_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(AppState::fake(dir.path()).await);
        let (token, _, _) = sign_up(&app, "test@example.com").await;

        let (status, body) = call(
            &app,
            "POST",
            "/transactions",
            Some(&token),
            Some(json!({"type": "expense", "amount": 500, "description": "Lunch at restaurant"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Transaction created successfully");
        assert_eq!(body["data"]["category"], "food");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (_, body) = call(&app, "GET", "/summary", Some(&token), None).await;
        assert_eq!(body["data"]["totalExpense"], 500.0);
        let (_, body) = call(&app, "GET", "/summary", Some(&token), None).await;
        assert_eq!(body["data"]["cached"], true);

        let (status, _) = call(
            &app,
            "PATCH",
            &format!("/transactions/{id}"),
            Some(&token),
            Some(json!({"amount": 750})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, "GET", "/summary", Some(&token), None).await;
        assert_eq!(body["data"]["totalExpense"], 750.0);
        assert_eq!(body["data"]["cached"], false);

        let (_, body) = call(&app, "GET", "/transactions?category=FOOD", Some(&token), None).await;
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn users_cannot_touch_each_others_records() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(AppState::fake(dir.path()).await);
        let (alice, _, _) = sign_up(&app, "alice@example.com").await;
        let (bob, _, _) = sign_up(&app, "bob@example.com").await;

        let (_, body) = call(
            &app,
            "POST",
            "/transactions",
            Some(&alice),
            Some(json!({"type": "income", "amount": 1000, "description": "Salary"})),
        )
        .await;
        let tx_id = body["data"]["id"].as_str().unwrap().to_string();
        let (_, body) = call(
            &app,
            "POST",
            "/budgets",
            Some(&alice),
            Some(json!({"month": "2025-01", "monthlyGoal": 500, "savingsTarget": 100})),
        )
        .await;
        let budget_id = body["data"]["id"].as_str().unwrap().to_string();

        let tx_uri = format!("/transactions/{tx_id}");
        for method in ["GET", "DELETE"] {
            let (status, _) = call(&app, method, &tx_uri, Some(&bob), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, _) = call(&app, "PATCH", &tx_uri, Some(&bob), Some(json!({"amount": 1}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, "GET", "/budgets/2025-01", Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) =
            call(&app, "DELETE", &format!("/budgets/{budget_id}"), Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(&app, "GET", "/transactions", Some(&bob), None).await;
        assert_eq!(body["count"], 0);
        let (_, body) = call(&app, "GET", &tx_uri, Some(&alice), None).await;
        assert_eq!(body["data"]["amount"], 1000.0);
    }

    #[tokio::test]
    async fn refresh_rotation_and_logout() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(AppState::fake(dir.path()).await);
        let (token, refresh, session_id) = sign_up(&app, "test@example.com").await;

        let (status, body) = call(&app, "POST", "/users/refresh-token", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Refresh token is required");

        let (status, body) = call(
            &app,
            "POST",
            "/users/refresh-token",
            None,
            Some(json!({"refreshToken": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let new_token = body["data"]["accessToken"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            "POST",
            "/users/refresh-token",
            None,
            Some(json!({"refreshToken": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // the rotated-away session no longer backs its access token
        let (status, body) = call(&app, "GET", "/users/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Session has been revoked. Please login again.");
        let (status, _) = call(&app, "GET", "/users/profile", Some(&new_token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, "GET", "/users/sessions", Some(&new_token), None).await;
        assert_eq!(body["count"], 1);
        assert!(body["data"][0].get("refreshTokenHash").is_none());

        let (status, _) = call(
            &app,
            "POST",
            "/users/logout",
            Some(&new_token),
            Some(json!({"sessionId": session_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "POST", "/users/logout-all", Some(&new_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "1 session(s) revoked successfully");
        let (status, _) = call(&app, "GET", "/users/sessions", Some(&new_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_token_and_bad_body_use_error_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(AppState::fake(dir.path()).await);

        let (status, body) = call(&app, "GET", "/summary", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], "fail");

        let (status, body) = call(
            &app,
            "POST",
            "/users",
            None,
            Some(json!({"name": "A", "email": "nope", "password": "1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User validation failed");
        assert_eq!(body["details"].as_array().unwrap().len(), 3);

        let (status, body) = call(
            &app,
            "POST",
            "/users",
            None,
            Some(json!({"email": "a@b.io", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User validation failed");
        assert_eq!(
            body["details"],
            json!([r#"Field "name" is required and must be at least 2 characters"#])
        );
    }
}
