//! Shared API request/response types used by the API server and clients.

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Max comment body length. Plain text, rendered elsewhere.
const MAX_COMMENT_LEN: usize = 4_000;
/// Max post body length.
const MAX_POST_LEN: usize = 65_536;
/// Max ban duration (one year, in minutes). `None` means permanent.
const MAX_BAN_MINUTES: i64 = 527_040;

/// Log in with email and password.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginPayload {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 1, max = 128))]
    pub password: String,
}

/// Returned after a successful login. The token is shown only once.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Current user profile, including the derived level.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub email: String,
    /// `admin` or `member`.
    pub role: String,
    /// 1-10 from lifetime XP; 0 is the out-of-band admin badge.
    pub level: i32,
    pub lifetime_xp: i64,
    pub daily_xp: i32,
    pub daily_posts: i32,
}

/// Create a new post.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePostPayload {
    #[garde(length(min = 1, max = 200))]
    pub title: String,
    #[garde(length(min = 1, max = MAX_POST_LEN))]
    pub body: String,
}

/// Returned after creating a post.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePostResponse {
    pub id: Uuid,
}

/// Returned after liking a post.
#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    /// XP granted to the post author by this like. Zero on repeat likes.
    pub awarded: i32,
}

/// Create a comment on a post. `guest_name` applies to anonymous comments only.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCommentPayload {
    #[garde(length(min = 1, max = MAX_COMMENT_LEN))]
    pub body: String,
    #[garde(inner(length(min = 1, max = 40)))]
    #[serde(default)]
    pub guest_name: Option<String>,
}

/// Returned after creating a comment.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCommentResponse {
    pub id: Uuid,
}

/// A comment in a listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    /// Member email, or the guest's chosen name.
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// What a ban forbids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BanScope {
    /// The target cannot log in.
    Login,
    /// The target cannot comment.
    Comment,
}

/// Elevation status for the current admin.
#[derive(Debug, Serialize, Deserialize)]
pub struct ElevationStatusResponse {
    pub elevated: bool,
    /// Expiry of the current or most recent session, if one was ever granted.
    pub until: Option<DateTime<Utc>>,
}

/// Submit the operation code to open an elevation session.
///
/// An empty code is accepted at the wire level so the server can answer
/// with its own "missing code" rejection rather than a generic 422.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyElevationPayload {
    #[garde(length(max = 64))]
    pub code: String,
}

/// Returned after a successful elevation.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyElevationResponse {
    pub until: DateTime<Utc>,
}

/// Ban a user (by email) or an anonymous IP. Exactly one target must be set;
/// the server rejects payloads naming both or neither.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateBanPayload {
    #[garde(inner(email))]
    #[serde(default)]
    pub email: Option<String>,
    #[garde(inner(length(min = 1, max = 45)))]
    #[serde(default)]
    pub ip: Option<String>,
    #[garde(skip)]
    pub scope: BanScope,
    /// Minutes until the ban expires. Omit for a permanent ban.
    #[garde(inner(range(min = 1, max = MAX_BAN_MINUTES)))]
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[garde(inner(length(max = 500)))]
    #[serde(default)]
    pub reason: Option<String>,
}

/// Remove every ban for a target in one scope.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ClearBansPayload {
    #[garde(inner(email))]
    #[serde(default)]
    pub email: Option<String>,
    #[garde(inner(length(min = 1, max = 45)))]
    #[serde(default)]
    pub ip: Option<String>,
    #[garde(skip)]
    pub scope: BanScope,
}

/// Returned after clearing bans.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearBansResponse {
    pub removed: u64,
}

/// A ban record as shown in the admin console.
#[derive(Debug, Serialize, Deserialize)]
pub struct BanView {
    pub id: Uuid,
    pub scope: BanScope,
    /// The banned email or IP.
    pub target: String,
    pub reason: Option<String>,
    pub permanent: bool,
    /// Absent for permanent bans.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
