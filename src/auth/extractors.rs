use std::convert::Infallible;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::{JwtKeys, TokenError};
use crate::{
    config::SessionBinding,
    error::AppError,
    sessions::{dto::ClientMeta, services},
    state::AppState,
};

/// An authenticated caller: a valid access token backed by a live session.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub session_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::unauthorized("Access token is missing. Please provide a Bearer token.")
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| {
                AppError::unauthorized("Access token is missing. Please provide a Bearer token.")
            })?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|e| match e {
            TokenError::Expired => AppError::unauthorized(
                "Access token has expired. Use your refresh token to get a new one.",
            ),
            TokenError::Invalid(reason) => {
                warn!(%reason, "invalid access token");
                AppError::unauthorized("Invalid access token. Please login again.")
            }
        })?;

        let live = match state.config.session_binding {
            SessionBinding::Session => {
                services::is_session_active(state, claims.sid, claims.id).await
            }
            SessionBinding::User => services::validate_session(state, claims.id).await,
        };
        if !live {
            warn!(user_id = %claims.id, session_id = %claims.sid, "token without live session");
            return Err(AppError::unauthorized(
                "Session has been revoked. Please login again.",
            ));
        }

        Ok(AuthUser {
            id: claims.id,
            email: claims.email,
            session_id: claims.sid,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientMeta {
            user_agent,
            ip_address: forwarded.or(peer),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn client_meta_prefers_forwarded_for() {
        let mut p = parts(
            Request::builder()
                .header("user-agent", "curl/8")
                .header("x-forwarded-for", "203.0.113.9, 10.0.0.1"),
        );
        p.extensions
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5000))));
        let meta = ClientMeta::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn client_meta_falls_back_to_peer_then_none() {
        let mut p = parts(Request::builder());
        p.extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 2], 5000))));
        let meta = ClientMeta::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(meta.ip_address.as_deref(), Some("192.168.1.2"));
        assert!(meta.user_agent.is_none());

        let mut p = parts(Request::builder());
        let meta = ClientMeta::from_request_parts(&mut p, &()).await.unwrap();
        assert!(meta.ip_address.is_none());
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::fake(dir.path()).await;

        let mut p = parts(Request::builder());
        let err = AuthUser::from_request_parts(&mut p, &state).await.unwrap_err();
        assert!(err.to_string().contains("missing"));

        let mut p = parts(Request::builder().header("authorization", "Bearer garbage"));
        let err = AuthUser::from_request_parts(&mut p, &state).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid access token. Please login again.");
    }

    #[tokio::test]
    async fn token_for_unknown_session_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::fake(dir.path()).await;
        let token = JwtKeys::from_ref(&state)
            .sign_access(Uuid::new_v4(), "a@b.io", Uuid::new_v4())
            .unwrap();
        let mut p = parts(
            Request::builder().header("authorization", format!("Bearer {token}")),
        );
        let err = AuthUser::from_request_parts(&mut p, &state).await.unwrap_err();
        assert!(err.to_string().contains("revoked"));
    }
}
