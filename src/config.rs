use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    /// Session lifetime as `<N>s|m|h|d`.
    pub refresh_expires_in: String,
}

/// How the authentication gate decides whether an access token is still backed
/// by a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBinding {
    /// The session named by the token's `sid` claim must be active.
    Session,
    /// Any active session of the token's user is enough.
    User,
}

impl SessionBinding {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => SessionBinding::User,
            _ => SessionBinding::Session,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub data_dir: PathBuf,
    pub cache_ttl_seconds: u64,
    pub session_binding: SessionBinding,
    pub rate_limit: RateLimitConfig,
    pub jwt: JwtConfig,
}

/// Global request budget: at most `max_requests` per `window_ms`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 15 * 60 * 1000,
            max_requests: 100,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "finedge".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "finedge-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(15),
            refresh_expires_in: std::env::var("JWT_REFRESH_EXPIRES_IN")
                .unwrap_or_else(|_| "7d".into()),
        };
        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("APP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(3000),
            environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            cache_ttl_seconds: std::env::var("CACHE_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(300),
            session_binding: std::env::var("AUTH_SESSION_BINDING")
                .map(|v| SessionBinding::parse(&v))
                .unwrap_or(SessionBinding::Session),
            rate_limit: RateLimitConfig {
                window_ms: env_parse("RATE_LIMIT_WINDOW_MS")
                    .filter(|ms| *ms > 0)
                    .unwrap_or(RateLimitConfig::default().window_ms),
                max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS")
                    .filter(|n| *n > 0)
                    .unwrap_or(RateLimitConfig::default().max_requests),
            },
            jwt,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_binding_defaults_to_session() {
        assert_eq!(SessionBinding::parse("user"), SessionBinding::User);
        assert_eq!(SessionBinding::parse(" USER "), SessionBinding::User);
        assert_eq!(SessionBinding::parse("session"), SessionBinding::Session);
        assert_eq!(SessionBinding::parse("whatever"), SessionBinding::Session);
    }

    #[test]
    fn rate_limit_defaults_to_100_per_15_minutes() {
        let limit = RateLimitConfig::default();
        assert_eq!(limit.window_ms, 900_000);
        assert_eq!(limit.max_requests, 100);
    }
}
