//! Session lifecycle: issue, rotate, revoke, and liveness checks.
//!
//! A session is `ACTIVE` until it is revoked (flag) or its `expires_at`
//! passes (time). Neither transition is reversible, and revoked sessions are
//! kept for audit rather than deleted.

use axum::extract::FromRef;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{ActiveSession, ClientMeta, IssuedSession, SessionSummary};
use super::repo_types::Session;
use super::token::{generate_refresh_token, hash_refresh_token, session_expiry};
use crate::{auth::jwt::JwtKeys, auth::repo_types::User, error::AppError, state::AppState};

const UNKNOWN: &str = "unknown";

fn new_session(st: &AppState, user_id: Uuid, user_agent: String, ip_address: String) -> (Session, String) {
    let raw = generate_refresh_token();
    let now = OffsetDateTime::now_utc();
    let session = Session {
        id: Uuid::new_v4(),
        user_id,
        refresh_token_hash: hash_refresh_token(&raw),
        user_agent,
        ip_address,
        is_revoked: false,
        expires_at: session_expiry(now, &st.config.jwt.refresh_expires_in),
        created_at: now,
        updated_at: now,
    };
    (session, raw)
}

fn issue(st: &AppState, user: &User, session: &Session, raw: String) -> Result<IssuedSession, AppError> {
    let access_token = JwtKeys::from_ref(st).sign_access(user.id, &user.email, session.id)?;
    Ok(IssuedSession {
        access_token,
        refresh_token: raw,
        session: SessionSummary {
            id: session.id,
            expires_at: session.expires_at,
        },
    })
}

/// Opens a new session for `user` and returns the token pair. The raw refresh
/// token is not recoverable afterwards.
pub async fn create_session(
    st: &AppState,
    user: &User,
    meta: ClientMeta,
) -> Result<IssuedSession, AppError> {
    let (session, raw) = new_session(
        st,
        user.id,
        meta.user_agent.unwrap_or_else(|| UNKNOWN.into()),
        meta.ip_address.unwrap_or_else(|| UNKNOWN.into()),
    );
    let session = st.store.sessions.insert(session).await?;
    info!(user_id = %user.id, session_id = %session.id, "session created");
    issue(st, user, &session, raw)
}

/// Exchanges a refresh token for a fresh pair, revoking the presented one.
///
/// The old session is revoked and its successor inserted in one store
/// transaction, so of two concurrent refreshes with the same token exactly one
/// succeeds.
pub async fn refresh_session(
    st: &AppState,
    raw_refresh_token: &str,
    meta: ClientMeta,
) -> Result<IssuedSession, AppError> {
    let token_hash = hash_refresh_token(raw_refresh_token);
    let Some(current) = Session::find_unrevoked_by_hash(&st.store.sessions, &token_hash).await
    else {
        warn!("refresh with unknown or revoked token");
        return Err(AppError::unauthorized(
            "Invalid or expired refresh token. Please login again.",
        ));
    };

    let now = OffsetDateTime::now_utc();
    if current.expires_at <= now {
        Session::mark_revoked(&st.store.sessions, current.id, now).await?;
        warn!(session_id = %current.id, user_id = %current.user_id, "expired refresh token, session revoked");
        return Err(AppError::unauthorized(
            "Refresh token has expired. Please login again.",
        ));
    }

    let Some(user) = st.store.users.find_by_id(current.user_id).await else {
        warn!(session_id = %current.id, user_id = %current.user_id, "session owner missing");
        return Err(AppError::unauthorized("User not found. Session invalid."));
    };

    let (next, raw) = new_session(
        st,
        user.id,
        meta.user_agent.unwrap_or_else(|| current.user_agent.clone()),
        meta.ip_address.unwrap_or_else(|| current.ip_address.clone()),
    );

    let rotated = st
        .store
        .sessions
        .transact(|records| {
            let Some(old) = records
                .iter_mut()
                .find(|s| s.id == current.id && s.is_active_at(now))
            else {
                return false;
            };
            old.is_revoked = true;
            old.updated_at = now;
            records.push(next.clone());
            true
        })
        .await?;

    if !rotated {
        warn!(session_id = %current.id, "refresh token already rotated");
        return Err(AppError::unauthorized(
            "Invalid or expired refresh token. Please login again.",
        ));
    }

    info!(user_id = %user.id, old_session = %current.id, new_session = %next.id, "session rotated");
    issue(st, &user, &next, raw)
}

/// Logs out one session. Unknown ids and other users' sessions are reported
/// identically so callers learn nothing about whether a session exists.
pub async fn revoke_session(
    st: &AppState,
    session_id: Uuid,
    requesting_user: Uuid,
) -> Result<(), AppError> {
    match st.store.sessions.find_by_id(session_id).await {
        Some(s) if s.user_id == requesting_user => {}
        _ => {
            warn!(%session_id, user_id = %requesting_user, "revoke of unknown or foreign session");
            return Err(AppError::unauthorized("Session not found."));
        }
    }
    Session::mark_revoked(&st.store.sessions, session_id, OffsetDateTime::now_utc()).await?;
    info!(%session_id, user_id = %requesting_user, "session revoked");
    Ok(())
}

/// Revokes every active session of the user and returns how many there were.
pub async fn revoke_all_sessions(st: &AppState, user_id: Uuid) -> Result<usize, AppError> {
    let count =
        Session::revoke_active_for_user(&st.store.sessions, user_id, OffsetDateTime::now_utc())
            .await?;
    info!(%user_id, count, "all sessions revoked");
    Ok(count)
}

pub async fn list_active_sessions(st: &AppState, user_id: Uuid) -> Vec<ActiveSession> {
    Session::list_active_for_user(&st.store.sessions, user_id, OffsetDateTime::now_utc())
        .await
        .into_iter()
        .map(|s| ActiveSession {
            id: s.id,
            user_agent: s.user_agent,
            ip_address: s.ip_address,
            created_at: s.created_at,
            expires_at: s.expires_at,
        })
        .collect()
}

/// True iff the user has at least one active session. Not tied to any
/// particular token.
pub async fn validate_session(st: &AppState, user_id: Uuid) -> bool {
    !Session::list_active_for_user(&st.store.sessions, user_id, OffsetDateTime::now_utc())
        .await
        .is_empty()
}

/// True iff `session_id` exists, belongs to `user_id`, and is active.
pub async fn is_session_active(st: &AppState, session_id: Uuid, user_id: Uuid) -> bool {
    st.store
        .sessions
        .find_by_id(session_id)
        .await
        .is_some_and(|s| s.user_id == user_id && s.is_active_at(OffsetDateTime::now_utc()))
}
