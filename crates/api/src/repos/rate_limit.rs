//! Guest comment rate limiting for PostgreSQL.
//!
//! Guests get one bucket per `(ip, utc day)` holding a running count and the
//! time of the last admitted comment. Buckets are kept after the day ends so
//! moderators can inspect them; a new day simply starts a fresh key.
//!
//! Admission is a single conditional upsert, so two requests racing on the
//! same bucket cannot both observe "under cap" and both commit.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{Pool, Postgres};

use crate::models::{GuestQuota, utc_day};

/// Outcome of a guest admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// Admitted; the bucket was incremented.
    Allowed,
    /// The previous comment from this IP was too recent.
    TooFrequent,
    /// The IP has used up its comments for the day.
    DailyCapReached,
}

impl AdmitOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmitOutcome::Allowed)
    }
}

/// Rate limiter for unauthenticated comment traffic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimitRepo: Send + Sync {
    /// Try to admit one comment from `ip` at `now`, consuming a slot in the
    /// day's bucket on success. A rejected call leaves the bucket unchanged.
    async fn admit(&self, ip: &str, now: DateTime<Utc>) -> Result<AdmitOutcome>;
}

/// PostgreSQL implementation of RateLimitRepo.
#[derive(Clone)]
pub struct PgRateLimitRepo {
    pool: Pool<Postgres>,
    daily_cap: i32,
    min_gap: Duration,
}

impl PgRateLimitRepo {
    pub fn new(pool: Pool<Postgres>, daily_cap: i32, min_gap_seconds: i64) -> Self {
        Self {
            pool,
            daily_cap,
            min_gap: Duration::seconds(min_gap_seconds),
        }
    }
}

/// The admission rule, stated once: a missing or prior-date bucket admits
/// (the new day starts fresh), a gap violation refuses ahead of the cap,
/// and a full bucket refuses the rest. The conditional upsert in `admit`
/// commits the same rule atomically; this names its outcome. On the deny
/// path both figures only ever advance, so the answer stays accurate even
/// if the bucket moved between the attempt and the re-read.
fn admit_decision(
    bucket: Option<&GuestQuota>,
    day: NaiveDate,
    cutoff: DateTime<Utc>,
    cap: i32,
) -> AdmitOutcome {
    let Some(bucket) = bucket else {
        return AdmitOutcome::Allowed;
    };
    if bucket.bucket_date != day {
        return AdmitOutcome::Allowed;
    }
    if let Some(last) = bucket.last_event_at {
        if last > cutoff {
            return AdmitOutcome::TooFrequent;
        }
    }
    if bucket.count >= cap {
        return AdmitOutcome::DailyCapReached;
    }
    AdmitOutcome::Allowed
}

#[async_trait]
impl RateLimitRepo for PgRateLimitRepo {
    async fn admit(&self, ip: &str, now: DateTime<Utc>) -> Result<AdmitOutcome> {
        let day = utc_day(now);
        let cutoff = now - self.min_gap;

        let admitted = sqlx::query_scalar::<_, i32>(
            "INSERT INTO guest_comment_quota (ip, bucket_date, count, last_event_at) \
             VALUES ($1, $2, 1, $3) \
             ON CONFLICT (ip, bucket_date) DO UPDATE \
             SET count = guest_comment_quota.count + 1, last_event_at = $3 \
             WHERE guest_comment_quota.count < $4 \
               AND (guest_comment_quota.last_event_at IS NULL \
                    OR guest_comment_quota.last_event_at <= $5) \
             RETURNING count",
        )
        .bind(ip)
        .bind(day)
        .bind(now)
        .bind(self.daily_cap)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;

        if admitted.is_some() {
            return Ok(AdmitOutcome::Allowed);
        }

        let bucket = sqlx::query_as::<_, GuestQuota>(
            "SELECT * FROM guest_comment_quota WHERE ip = $1 AND bucket_date = $2",
        )
        .bind(ip)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        match admit_decision(bucket.as_ref(), day, cutoff, self.daily_cap) {
            AdmitOutcome::Allowed => {
                bail!("quota bucket for {ip} reads as open after a rejected insert")
            }
            refusal => Ok(refusal),
        }
    }
}
