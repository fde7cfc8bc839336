use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::api::{BanView, CommentView};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

/// Database-side ban scope, mirrored by the wire enum in `shared::api`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ban_scope", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BanScope {
    Login,
    Comment,
}

impl From<shared::api::BanScope> for BanScope {
    fn from(scope: shared::api::BanScope) -> Self {
        match scope {
            shared::api::BanScope::Login => BanScope::Login,
            shared::api::BanScope::Comment => BanScope::Comment,
        }
    }
}

impl From<BanScope> for shared::api::BanScope {
    fn from(scope: BanScope) -> Self {
        match scope {
            BanScope::Login => shared::api::BanScope::Login,
            BanScope::Comment => shared::api::BanScope::Comment,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    /// Null for guest comments.
    pub author_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_ip: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Comment joined with its display author (member email or guest name).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    pub id: Uuid,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<CommentWithAuthor> for CommentView {
    fn from(comment: CommentWithAuthor) -> Self {
        CommentView {
            id: comment.id,
            author: comment.author,
            body: comment.body,
            created_at: comment.created_at,
        }
    }
}

/// One ban record. Bans are append-only; several may exist for the same
/// target, and the governing one is picked at read time.
///
/// Permanent bans carry a far-future `expires_at` so a single ordering
/// covers both kinds; `permanent` is what callers should branch on.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Ban {
    pub id: Uuid,
    pub scope: BanScope,
    pub user_id: Option<Uuid>,
    pub ip: Option<String>,
    pub reason: Option<String>,
    pub permanent: bool,
    pub expires_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Ban joined with its display target (member email or raw IP) for listings.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BanWithTarget {
    pub id: Uuid,
    pub scope: BanScope,
    pub target: String,
    pub reason: Option<String>,
    pub permanent: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<BanWithTarget> for BanView {
    fn from(ban: BanWithTarget) -> Self {
        BanView {
            id: ban.id,
            scope: ban.scope.into(),
            target: ban.target,
            reason: ban.reason,
            permanent: ban.permanent,
            expires_at: if ban.permanent {
                None
            } else {
                Some(ban.expires_at)
            },
            created_at: ban.created_at,
        }
    }
}

/// Per-IP daily comment bucket. Rows are never deleted; a new calendar
/// day simply starts a fresh key.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GuestQuota {
    pub ip: String,
    pub bucket_date: NaiveDate,
    pub count: i32,
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Per-user XP ledger row. The two daily figures describe `stats_date`;
/// when that lags today they read as zero until the next write rolls
/// the row forward.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct XpAccount {
    pub user_id: Uuid,
    pub stats_date: NaiveDate,
    pub daily_xp: i32,
    pub daily_posts: i32,
    pub lifetime_xp: i64,
}

impl XpAccount {
    /// Daily figures valid for `day`, treating a stale row as zeroed.
    pub fn daily_for(&self, day: NaiveDate) -> (i32, i32) {
        if self.stats_date == day {
            (self.daily_xp, self.daily_posts)
        } else {
            (0, 0)
        }
    }
}

/// The calendar date a timestamp falls on. All day-scoped counters key on
/// UTC days.
pub fn utc_day(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Level tier for a lifetime XP total. Tier `L` opens at `10_000 * L^2`,
/// so tier 10 lands exactly at one million; everyone starts at tier 1.
pub fn level_for(lifetime_xp: i64) -> i32 {
    for level in (2..=10).rev() {
        if lifetime_xp >= 10_000 * level * level {
            return level as i32;
        }
    }
    1
}
