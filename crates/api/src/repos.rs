//! Database repositories (PostgreSQL).
//!
//! This module contains traits and implementations for database access.
//! Each repository is abstracted behind a trait to enable mocking in tests.
//!
//! ## Repositories
//!
//! - **users** - User lookups (accounts are provisioned out-of-band)
//! - **posts** - Post creation and likes
//! - **comments** - Comment creation, listing, and moderation
//! - **bans** - Append-only ban registry with governing-ban reads
//! - **xp** - Per-user XP ledger with daily rollover
//! - **rate_limit** - Per-IP daily comment buckets for guests
//! - **status** - Database readiness probe
//!
//! ## Usage in Handlers
//!
//! Repositories are accessed via `state.repos`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let user = state.repos.users.find_by_id(user_id).await?;
//!     let ban = state.repos.bans.governing_for_user(user_id, BanScope::Comment, now).await?;
//! }
//! ```

mod bans;
mod comments;
mod posts;
mod rate_limit;
mod status;
mod users;
mod xp;

pub use bans::{BanRepo, CreateBanOutcome, PgBanRepo};
pub use comments::{CommentRepo, PgCommentRepo};
pub use posts::{PgPostRepo, PostRepo};
pub use rate_limit::{AdmitOutcome, PgRateLimitRepo, RateLimitRepo};
pub use status::{PgStatusRepo, StatusRepo};
pub use users::{PgUserRepo, UserRepo};
pub use xp::{AwardReceipt, PgXpRepo, XpRepo};

#[cfg(test)]
pub use bans::MockBanRepo;
#[cfg(test)]
pub use comments::MockCommentRepo;
#[cfg(test)]
pub use posts::MockPostRepo;
#[cfg(test)]
pub use rate_limit::MockRateLimitRepo;
#[cfg(test)]
pub use status::MockStatusRepo;
#[cfg(test)]
pub use users::MockUserRepo;
#[cfg(test)]
pub use xp::MockXpRepo;

use std::sync::Arc;

/// Collection of all database repositories.
#[derive(Clone)]
pub struct Repos {
    pub users: Arc<dyn UserRepo>,
    pub posts: Arc<dyn PostRepo>,
    pub comments: Arc<dyn CommentRepo>,
    pub bans: Arc<dyn BanRepo>,
    pub xp: Arc<dyn XpRepo>,
    pub rate_limit: Arc<dyn RateLimitRepo>,
    pub status: Arc<dyn StatusRepo>,
}
