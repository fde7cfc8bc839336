use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking (Better Stack compatible)
    #[serde(default)]
    pub sentry_dsn: Option<String>,
    /// The one account allowed to open elevation sessions.
    pub admin_email: String,
    /// Operation code admins submit to elevate. Rotated out-of-band.
    pub op_code: String,
    #[serde(default = "default_elevation_ttl_minutes")]
    pub elevation_ttl_minutes: i64,
    #[serde(default = "default_comment_min_gap_seconds")]
    pub comment_min_gap_seconds: i64,
    #[serde(default = "default_guest_daily_comment_cap")]
    pub guest_daily_comment_cap: i32,
    #[serde(default = "default_daily_xp_cap")]
    pub daily_xp_cap: i32,
    #[serde(default = "default_daily_post_cap")]
    pub daily_post_cap: i32,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

fn default_elevation_ttl_minutes() -> i64 {
    30
}

fn default_comment_min_gap_seconds() -> i64 {
    10
}

fn default_guest_daily_comment_cap() -> i32 {
    5
}

fn default_daily_xp_cap() -> i32 {
    2_500
}

fn default_daily_post_cap() -> i32 {
    50
}

fn default_session_ttl_hours() -> i64 {
    168
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}
