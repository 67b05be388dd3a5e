mod app;
mod auth;
mod budgets;
mod cache;
mod config;
mod error;
mod response;
mod sessions;
mod state;
mod store;
mod summary;
mod transactions;

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "finedge=debug,axum=info,tower_http=info";

/// `RUST_LOG` filter (falling back to [`DEFAULT_LOG_FILTER`]); `LOG_FORMAT=json`
/// switches to one JSON object per event, carrying the request span.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let app_state = state::AppState::init().await?;
    let config = &app_state.config;
    tracing::info!(
        environment = %config.environment,
        session_binding = ?config.session_binding,
        rate_limit_window_ms = config.rate_limit.window_ms,
        rate_limit_max_requests = config.rate_limit.max_requests,
        "configuration loaded"
    );

    app::serve(app_state).await
}
