//! XP ledger for PostgreSQL.
//!
//! One row per user. The daily figures describe `stats_date` and roll over
//! lazily: the first write on a new day resets them, nothing sweeps them in
//! the background. Lifetime XP only ever grows.
//!
//! Awards clamp against the daily cap and commit with a compare-and-set on
//! the observed daily figure, so two simultaneous awards cannot both land
//! inside the remaining headroom.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::{Role, XpAccount, utc_day};

/// Retries for the award compare-and-set before giving up.
const AWARD_ATTEMPTS: usize = 4;

/// What an award attempt actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwardReceipt {
    /// XP granted by this call after clamping. Zero when the day is capped
    /// out or the caller is exempt from XP.
    pub added: i32,
    pub daily_xp: i32,
    pub lifetime_xp: i64,
}

/// Repository for the per-user XP ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait XpRepo: Send + Sync {
    /// Consume one of today's post slots. Admins are always admitted and
    /// leave the ledger untouched; a rejected call also leaves it untouched.
    async fn consume_post_slot(&self, user_id: Uuid, role: Role, now: DateTime<Utc>)
        -> Result<bool>;

    /// Grant XP, clamped to the daily cap. Admins and non-positive amounts
    /// are no-ops that still report the current figures.
    async fn award(
        &self,
        user_id: Uuid,
        role: Role,
        amount: i32,
        now: DateTime<Utc>,
    ) -> Result<AwardReceipt>;

    /// The raw ledger row, if the user has ever earned anything.
    async fn get(&self, user_id: Uuid) -> Result<Option<XpAccount>>;
}

/// PostgreSQL implementation of XpRepo.
#[derive(Clone)]
pub struct PgXpRepo {
    pool: Pool<Postgres>,
    daily_xp_cap: i32,
    daily_post_cap: i32,
}

impl PgXpRepo {
    pub fn new(pool: Pool<Postgres>, daily_xp_cap: i32, daily_post_cap: i32) -> Self {
        Self {
            pool,
            daily_xp_cap,
            daily_post_cap,
        }
    }

    /// Create the row if missing and stamp it to `day`, zeroing stale daily
    /// figures. Returns the row as it stands for that day.
    async fn roll_forward(&self, user_id: Uuid, day: NaiveDate) -> Result<XpAccount> {
        let account = sqlx::query_as::<_, XpAccount>(
            "INSERT INTO user_xp (user_id, stats_date, daily_xp, daily_posts, lifetime_xp) \
             VALUES ($1, $2, 0, 0, 0) \
             ON CONFLICT (user_id) DO UPDATE \
             SET stats_date = $2, \
                 daily_xp = CASE WHEN user_xp.stats_date = $2 THEN user_xp.daily_xp ELSE 0 END, \
                 daily_posts = CASE WHEN user_xp.stats_date = $2 \
                               THEN user_xp.daily_posts ELSE 0 END \
             RETURNING *",
        )
        .bind(user_id)
        .bind(day)
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }
}

/// How much of `amount` fits under the daily cap.
fn clamped_award(amount: i32, daily_xp: i32, cap: i32) -> i32 {
    amount.min(cap - daily_xp).max(0)
}

#[async_trait]
impl XpRepo for PgXpRepo {
    async fn consume_post_slot(
        &self,
        user_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if role == Role::Admin {
            return Ok(true);
        }

        let day = utc_day(now);

        // One statement covers all three cases: first row ever, stale row
        // rolling to a new day, and a same-day increment under the cap.
        let admitted = sqlx::query_scalar::<_, i32>(
            "INSERT INTO user_xp (user_id, stats_date, daily_xp, daily_posts, lifetime_xp) \
             VALUES ($1, $2, 0, 1, 0) \
             ON CONFLICT (user_id) DO UPDATE \
             SET daily_posts = CASE WHEN user_xp.stats_date = $2 \
                               THEN user_xp.daily_posts + 1 ELSE 1 END, \
                 daily_xp = CASE WHEN user_xp.stats_date = $2 THEN user_xp.daily_xp ELSE 0 END, \
                 stats_date = $2 \
             WHERE user_xp.stats_date <> $2 OR user_xp.daily_posts < $3 \
             RETURNING daily_posts",
        )
        .bind(user_id)
        .bind(day)
        .bind(self.daily_post_cap)
        .fetch_optional(&self.pool)
        .await?;

        Ok(admitted.is_some())
    }

    async fn award(
        &self,
        user_id: Uuid,
        role: Role,
        amount: i32,
        now: DateTime<Utc>,
    ) -> Result<AwardReceipt> {
        let day = utc_day(now);

        if role == Role::Admin || amount <= 0 {
            let (daily_xp, lifetime_xp) = match self.get(user_id).await? {
                Some(account) => (account.daily_for(day).0, account.lifetime_xp),
                None => (0, 0),
            };
            return Ok(AwardReceipt {
                added: 0,
                daily_xp,
                lifetime_xp,
            });
        }

        for _ in 0..AWARD_ATTEMPTS {
            let account = self.roll_forward(user_id, day).await?;
            let add = clamped_award(amount, account.daily_xp, self.daily_xp_cap);

            if add == 0 {
                return Ok(AwardReceipt {
                    added: 0,
                    daily_xp: account.daily_xp,
                    lifetime_xp: account.lifetime_xp,
                });
            }

            let updated = sqlx::query_as::<_, XpAccount>(
                "UPDATE user_xp \
                 SET daily_xp = daily_xp + $3, lifetime_xp = lifetime_xp + $3 \
                 WHERE user_id = $1 AND stats_date = $2 AND daily_xp = $4 \
                 RETURNING *",
            )
            .bind(user_id)
            .bind(day)
            .bind(add)
            .bind(account.daily_xp)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(account) = updated {
                return Ok(AwardReceipt {
                    added: add,
                    daily_xp: account.daily_xp,
                    lifetime_xp: account.lifetime_xp,
                });
            }
        }

        bail!("xp ledger for user {user_id} kept moving; gave up after {AWARD_ATTEMPTS} attempts")
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<XpAccount>> {
        let account = sqlx::query_as::<_, XpAccount>("SELECT * FROM user_xp WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }
}
