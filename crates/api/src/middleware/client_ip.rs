//! Client IP extraction for guest rate limiting and IP bans.
//!
//! Prefers the left-most `X-Forwarded-For` entry (set by the reverse proxy
//! in production), falling back to the peer address of the connection.

use std::net::SocketAddr;

use axum::{
    RequestPartsExt,
    extract::{ConnectInfo, FromRequestParts},
    http::{StatusCode, request::Parts},
};

/// The requesting client's IP as a display string.
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(forwarded) = parts.headers.get("x-forwarded-for") {
            if let Ok(value) = forwarded.to_str() {
                if let Some(first) = value.split(',').next() {
                    let first = first.trim();
                    if !first.is_empty() {
                        return Ok(ClientIp(first.to_string()));
                    }
                }
            }
        }

        let ConnectInfo(addr) = parts
            .extract::<ConnectInfo<SocketAddr>>()
            .await
            .map_err(|_| {
                (
                    StatusCode::BAD_REQUEST,
                    "Unable to determine client address",
                )
            })?;

        Ok(ClientIp(addr.ip().to_string()))
    }
}
