//! Password login against provisioned accounts.
//!
//! Flow:
//! 1. POST /auth/login with email and password; the hash check runs first,
//!    then the login-ban gate, then a session token is issued
//! 2. The token authenticates later requests as a bearer header
//! 3. POST /auth/logout revokes just that session
//!
//! There is no self-service registration; accounts are created out-of-band.
//!
//! Endpoints:
//! - POST /auth/login - Exchange credentials for a session token
//! - POST /auth/logout - Revoke the presented session
//! - GET /auth/me - Profile with XP figures and level

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordVerifier},
};
use axum::{
    Json, Router, debug_handler,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::Utc;
use garde::Validate;
use shared::api::{LoginPayload, LoginResponse, MeResponse};

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{BanScope, Role, level_for, utc_day},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// Verifies a password against a stored Argon2 hash. A malformed stored
/// hash counts as a mismatch.
fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = state.repos.users.find_by_email(&payload.email).await?;

    let Some(user) = user else {
        tracing::warn!(email = %payload.email, "login failed: unknown email");
        return Err(AppError::External(
            StatusCode::UNAUTHORIZED,
            "Invalid credentials",
        ));
    };

    if !verify_password(&payload.password, &user.password_hash) {
        tracing::warn!(email = %payload.email, "login failed: bad password");
        return Err(AppError::External(
            StatusCode::UNAUTHORIZED,
            "Invalid credentials",
        ));
    }

    // The ban gate runs after the credential check so it only fires for the
    // account's real owner.
    if let Some(ban) = state
        .repos
        .bans
        .governing_for_user(user.id, BanScope::Login, Utc::now())
        .await?
    {
        tracing::warn!(user_id = %user.id, ban_id = %ban.id, "login rejected: banned");
        return Err(AppError::External(
            StatusCode::FORBIDDEN,
            "Account is banned",
        ));
    }

    let token = state.stores.sessions.create(user.id).await?;

    tracing::info!(user_id = %user.id, "login");

    Ok(Json(LoginResponse { token }))
}

/// Revokes the presented session. Succeeds even if the token was already
/// dead (idempotent).
#[debug_handler]
async fn logout(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<impl IntoResponse, AppError> {
    state.stores.sessions.revoke(bearer.token()).await?;

    Ok(StatusCode::OK)
}

#[debug_handler]
async fn me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let today = utc_day(Utc::now());

    let (daily_xp, daily_posts, lifetime_xp) = match state.repos.xp.get(auth.user.id).await? {
        Some(account) => {
            let (daily_xp, daily_posts) = account.daily_for(today);
            (daily_xp, daily_posts, account.lifetime_xp)
        }
        None => (0, 0, 0),
    };

    // Admins wear the out-of-band tier 0 badge no matter their XP.
    let level = if auth.user.role == Role::Admin {
        0
    } else {
        level_for(lifetime_xp)
    };

    Ok(Json(MeResponse {
        email: auth.user.email,
        role: auth.user.role.as_str().to_string(),
        level,
        lifetime_xp,
        daily_xp,
        daily_posts,
    }))
}
