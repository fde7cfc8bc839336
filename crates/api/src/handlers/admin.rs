//! Admin console: elevation, the ban registry, comment moderation.
//!
//! Every route requires the admin role. Destructive operations also
//! require a live elevation session, opened by submitting the operation
//! code, and only the primary admin may open one. Reads (elevation
//! status, the ban list) work without elevation.
//!
//! Endpoints:
//! - GET /admin/elevation - Current elevation status
//! - POST /admin/elevation - Submit the operation code
//! - GET /admin/bans - List all ban records
//! - POST /admin/bans - Ban a user or an IP
//! - DELETE /admin/bans - Clear bans for a target in one scope
//! - DELETE /admin/comments/{id} - Delete a comment

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use chrono::{DateTime, Utc};
use garde::Validate;
use shared::api::{
    BanView, ClearBansPayload, ClearBansResponse, CreateBanPayload, ElevationStatusResponse,
    VerifyElevationPayload, VerifyElevationResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AdminUser,
    models::{Ban, BanScope, BanWithTarget},
    repos::CreateBanOutcome,
    state::AppState,
    stores::VerifyOutcome,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/elevation", get(elevation_status).post(verify_elevation))
        .route("/bans", get(list_bans).post(create_ban).delete(clear_bans))
        .route("/comments/{id}", delete(delete_comment))
}

/// Destructive admin routes refuse to act without a live elevation session.
async fn require_elevation(
    state: &AppState,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let status = state.stores.elevation.check(user_id, now).await?;
    if !status.elevated {
        tracing::warn!(user_id = %user_id, "rejected: elevation required");
        return Err(AppError::External(
            StatusCode::FORBIDDEN,
            "Elevation required",
        ));
    }
    Ok(())
}

fn view_for(ban: Ban, target: String) -> BanView {
    BanWithTarget {
        id: ban.id,
        scope: ban.scope,
        target,
        reason: ban.reason,
        permanent: ban.permanent,
        expires_at: ban.expires_at,
        created_at: ban.created_at,
    }
    .into()
}

#[debug_handler]
async fn elevation_status(
    admin: AdminUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let status = state.stores.elevation.check(admin.user.id, Utc::now()).await?;

    Ok(Json(ElevationStatusResponse {
        elevated: status.elevated,
        until: status.until,
    }))
}

#[debug_handler]
async fn verify_elevation(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<VerifyElevationPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if admin.user.email != state.config.admin_email {
        tracing::warn!(user_id = %admin.user.id, "elevation rejected: not the primary admin");
        return Err(AppError::External(
            StatusCode::FORBIDDEN,
            "Elevation is restricted to the primary admin",
        ));
    }

    match state
        .stores
        .elevation
        .verify(admin.user.id, &payload.code, Utc::now())
        .await?
    {
        VerifyOutcome::Granted(until) => {
            tracing::info!(user_id = %admin.user.id, %until, "elevation granted");
            Ok(Json(VerifyElevationResponse { until }))
        }
        VerifyOutcome::MissingCode => Err(AppError::External(
            StatusCode::BAD_REQUEST,
            "Operation code is required",
        )),
        VerifyOutcome::InvalidCode => {
            tracing::warn!(user_id = %admin.user.id, "elevation rejected: invalid code");
            Err(AppError::External(
                StatusCode::FORBIDDEN,
                "Invalid operation code",
            ))
        }
    }
}

#[debug_handler]
async fn list_bans(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let bans = state.repos.bans.list().await?;
    let views: Vec<BanView> = bans.into_iter().map(BanView::from).collect();

    Ok(Json(views))
}

#[debug_handler]
async fn create_ban(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBanPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let now = Utc::now();
    require_elevation(&state, admin.user.id, now).await?;

    let scope = BanScope::from(payload.scope);

    let view = match (&payload.email, &payload.ip) {
        (Some(email), None) => {
            let target = state
                .repos
                .users
                .find_by_email(email)
                .await?
                .ok_or(AppError::External(StatusCode::NOT_FOUND, "User not found"))?;

            let outcome = state
                .repos
                .bans
                .create_for_user(
                    target.id,
                    scope,
                    payload.duration_minutes,
                    payload.reason.as_deref(),
                    admin.user.id,
                    now,
                )
                .await?;

            let ban = match outcome {
                CreateBanOutcome::Created(ban) => ban,
                CreateBanOutcome::CannotBanAdmin => {
                    tracing::warn!(target = %target.email, "ban rejected: target is an admin");
                    return Err(AppError::External(
                        StatusCode::FORBIDDEN,
                        "Admins cannot be banned",
                    ));
                }
            };

            // A login ban takes effect immediately, not at next login.
            if scope == BanScope::Login {
                let revoked = state.stores.sessions.revoke_for_user(target.id).await?;
                tracing::info!(user_id = %target.id, revoked, "sessions revoked for login ban");
            }

            tracing::info!(ban_id = %ban.id, target = %target.email, scope = ?scope, "ban created");
            view_for(ban, target.email)
        }
        (None, Some(ip)) => {
            let ban = state
                .repos
                .bans
                .create_for_ip(
                    ip,
                    scope,
                    payload.duration_minutes,
                    payload.reason.as_deref(),
                    admin.user.id,
                    now,
                )
                .await?;

            tracing::info!(ban_id = %ban.id, target = %ip, scope = ?scope, "ban created");
            view_for(ban, ip.clone())
        }
        _ => {
            return Err(AppError::Validation(
                "exactly one of email or ip must be set".into(),
            ));
        }
    };

    Ok((StatusCode::CREATED, Json(view)))
}

#[debug_handler]
async fn clear_bans(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<ClearBansPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let now = Utc::now();
    require_elevation(&state, admin.user.id, now).await?;

    let scope = BanScope::from(payload.scope);

    let removed = match (&payload.email, &payload.ip) {
        (Some(email), None) => {
            let target = state
                .repos
                .users
                .find_by_email(email)
                .await?
                .ok_or(AppError::External(StatusCode::NOT_FOUND, "User not found"))?;

            state.repos.bans.clear_for_user(target.id, scope).await?
        }
        (None, Some(ip)) => state.repos.bans.clear_for_ip(ip, scope).await?,
        _ => {
            return Err(AppError::Validation(
                "exactly one of email or ip must be set".into(),
            ));
        }
    };

    tracing::info!(removed, scope = ?scope, "bans cleared");
    Ok(Json(ClearBansResponse { removed }))
}

#[debug_handler]
async fn delete_comment(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require_elevation(&state, admin.user.id, Utc::now()).await?;

    let deleted = state.repos.comments.delete(id).await?;
    if !deleted {
        return Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Comment not found",
        ));
    }

    tracing::info!(comment_id = %id, admin_id = %admin.user.id, "comment deleted");
    Ok(StatusCode::OK)
}
