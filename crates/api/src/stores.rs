//! Ephemeral stores (Redis).
//!
//! This module contains traits and implementations for ephemeral data storage.
//!
//! ## Stores
//!
//! - **sessions** - Login session tokens (hashed at rest, TTL-bound)
//! - **elevation** - Admin elevation sessions (kept past expiry so status
//!   reads can still report when one lapsed)
//! - **comment_gap** - Per-user minimum gap between comments
//!
//! ## Redis Key Patterns
//!
//! ```text
//! session:{sha256(token)}       → user id (expires with the session)
//! user-sessions:{user_id}       → set of that user's session keys
//! elevation:{user_id}           → elevation state JSON (no TTL)
//! comment-gap:{user_id}         → gap marker (expires after the gap)
//! ```
//!
//! ## Usage in Handlers
//!
//! Stores are accessed via `state.stores`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let status = state.stores.elevation.check(user.id, Utc::now()).await?;
//!     let token = state.stores.sessions.create(user.id).await?;
//! }
//! ```

mod comment_gap;
mod elevation;
mod sessions;

pub use comment_gap::{CommentGapStore, RedisCommentGapStore};
pub use elevation::{ElevationStatus, ElevationStore, RedisElevationStore, VerifyOutcome};
pub use sessions::{RedisSessionStore, SessionStore};

#[cfg(test)]
pub use comment_gap::MockCommentGapStore;
#[cfg(test)]
pub use elevation::MockElevationStore;
#[cfg(test)]
pub use sessions::MockSessionStore;

use std::sync::Arc;

/// Collection of all ephemeral stores.
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub elevation: Arc<dyn ElevationStore>,
    pub comment_gap: Arc<dyn CommentGapStore>,
}
