//! Authentication middleware backed by the Redis session store.
//!
//! Usage: Add `AuthUser` as an extractor parameter to require authentication.
//! The bearer token is resolved to a session, then to the full user row so
//! handlers can branch on role without another lookup.
//!
//! ```ignore
//! async fn my_handler(auth: AuthUser, ...) -> ... {
//!     // auth.user.id and auth.user.role are available here
//! }
//! ```

use axum::{
    Json, RequestPartsExt,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    models::{Role, User},
    state::AppState,
};

/// Authenticated user resolved from a valid session token.
pub struct AuthUser {
    pub user: User,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::MissingToken)?;

        let user_id = state
            .stores
            .sessions
            .resolve(bearer.token())
            .await
            .map_err(|e| {
                tracing::error!("session lookup error: {:?}", e);
                AuthError::InvalidToken
            })?
            .ok_or(AuthError::InvalidToken)?;

        let user = state
            .repos
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| {
                tracing::error!("user lookup error: {:?}", e);
                AuthError::InvalidToken
            })?
            .ok_or(AuthError::InvalidToken)?;

        Ok(AuthUser { user })
    }
}

/// Authenticated user holding the admin role.
pub struct AdminUser {
    pub user: User,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser { user } = AuthUser::from_request_parts(parts, state).await?;

        if user.role != Role::Admin {
            return Err(AuthError::AdminRequired);
        }

        Ok(AdminUser { user })
    }
}

/// Optional authentication for endpoints guests may also hit. A missing
/// Authorization header means guest; a present but invalid one is still
/// rejected rather than silently downgraded.
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(axum::http::header::AUTHORIZATION) {
            return Ok(MaybeUser(None));
        }

        let AuthUser { user } = AuthUser::from_request_parts(parts, state).await?;
        Ok(MaybeUser(Some(user)))
    }
}

pub enum AuthError {
    MissingToken,
    InvalidToken,
    AdminRequired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthError::AdminRequired => (StatusCode::FORBIDDEN, "Admin access required"),
        };

        let body = serde_json::json!({ "error": message });

        (status, Json(body)).into_response()
    }
}
