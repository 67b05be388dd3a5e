use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest};
use super::password::{hash_password_blocking, verify_password_blocking};
use super::repo_types::User;
use crate::{
    error::AppError,
    sessions::{dto::ClientMeta, services::create_session},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 6;
const MIN_NAME_LEN: usize = 2;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

struct NewUser {
    name: String,
    email: String,
    password: String,
}

fn validate_registration(req: RegisterRequest) -> Result<NewUser, AppError> {
    let mut errors = Vec::new();
    let name = req.name.unwrap_or_default();
    if name.trim().chars().count() < MIN_NAME_LEN {
        errors.push(r#"Field "name" is required and must be at least 2 characters"#.to_string());
    }
    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    if email.is_empty() {
        errors.push(r#"Field "email" is required"#.to_string());
    } else if !is_valid_email(&email) {
        errors.push(r#"Field "email" must be a valid email address"#.to_string());
    }
    let password = req.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(
            r#"Field "password" is required and must be at least 6 characters"#.to_string(),
        );
    }
    if !errors.is_empty() {
        return Err(AppError::validation("User validation failed", errors));
    }
    Ok(NewUser {
        name: name.trim().to_string(),
        email,
        password,
    })
}

pub async fn register(st: &AppState, mut req: RegisterRequest) -> Result<PublicUser, AppError> {
    let preferences = req.preferences.take().unwrap_or_default();
    let NewUser {
        name,
        email,
        password,
    } = validate_registration(req)?;

    if User::find_by_email(&st.store.users, &email).await.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict(format!(
            "User with email '{email}' already exists"
        )));
    }

    let password_hash = hash_password_blocking(password).await?;
    let now = OffsetDateTime::now_utc();
    let user = User {
        id: Uuid::new_v4(),
        name,
        email: email.clone(),
        password_hash,
        preferences,
        created_at: now,
        updated_at: now,
    };

    // re-checked under the collection lock
    let Some(user) = User::create_unique(&st.store.users, user).await? else {
        warn!(%email, "email registered concurrently");
        return Err(AppError::Conflict(format!(
            "User with email '{email}' already exists"
        )));
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user.into())
}

pub async fn login(
    st: &AppState,
    req: LoginRequest,
    meta: ClientMeta,
) -> Result<LoginResponse, AppError> {
    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    let password = req.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        warn!("login without credentials");
        return Err(AppError::unauthorized("Invalid email or password"));
    }
    let Some(user) = User::find_by_email(&st.store.users, &email).await else {
        warn!(%email, "login unknown email");
        return Err(AppError::unauthorized("Invalid email or password"));
    };

    if !verify_password_blocking(password, user.password_hash.clone()).await? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("Invalid email or password"));
    }

    let issued = create_session(st, &user, meta).await?;
    info!(user_id = %user.id, session_id = %issued.session.id, "user logged in");
    Ok(LoginResponse {
        user: user.into(),
        access_token: issued.access_token,
        refresh_token: issued.refresh_token,
        session: issued.session,
    })
}

pub async fn profile(st: &AppState, user_id: Uuid) -> Result<PublicUser, AppError> {
    st.store
        .users
        .find_by_id(user_id)
        .await
        .map(PublicUser::from)
        .ok_or_else(|| AppError::not_found("User", user_id))
}

pub async fn update_preferences(
    st: &AppState,
    user_id: Uuid,
    preferences: serde_json::Map<String, serde_json::Value>,
) -> Result<PublicUser, AppError> {
    let user = User::merge_preferences(&st.store.users, user_id, preferences)
        .await?
        .ok_or_else(|| AppError::not_found("User", user_id))?;
    info!(%user_id, "preferences updated");
    Ok(user.into())
}
