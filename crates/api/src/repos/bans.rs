//! Ban registry for PostgreSQL.
//!
//! Bans are append-only: creating a second ban for an already-banned target
//! just adds another candidate, and the record that governs is picked at read
//! time. A permanent ban outranks any timed one; among timed bans the latest
//! active expiry wins. Expired records are never evicted, only ignored.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::{Ban, BanScope, BanWithTarget};

/// Outcome of a ban creation attempt.
#[derive(Debug)]
pub enum CreateBanOutcome {
    /// The ban was recorded.
    Created(Ban),
    /// The target holds the admin role; no record was persisted.
    CannotBanAdmin,
}

/// Repository for the ban registry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BanRepo: Send + Sync {
    /// The ban currently governing a user in a scope, if any.
    async fn governing_for_user(
        &self,
        user_id: Uuid,
        scope: BanScope,
        now: DateTime<Utc>,
    ) -> Result<Option<Ban>>;

    /// The ban currently governing an IP in a scope, if any.
    async fn governing_for_ip(
        &self,
        ip: &str,
        scope: BanScope,
        now: DateTime<Utc>,
    ) -> Result<Option<Ban>>;

    /// Ban a user. `duration_minutes = None` means permanent. Rejects admin
    /// targets without persisting anything.
    async fn create_for_user<'a>(
        &self,
        user_id: Uuid,
        scope: BanScope,
        duration_minutes: Option<i64>,
        reason: Option<&'a str>,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CreateBanOutcome>;

    /// Ban an IP. `duration_minutes = None` means permanent.
    async fn create_for_ip<'a>(
        &self,
        ip: &str,
        scope: BanScope,
        duration_minutes: Option<i64>,
        reason: Option<&'a str>,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Ban>;

    /// Delete every ban record for a user in a scope, active or not.
    /// Returns the number of records removed.
    async fn clear_for_user(&self, user_id: Uuid, scope: BanScope) -> Result<u64>;

    /// Delete every ban record for an IP in a scope, active or not.
    async fn clear_for_ip(&self, ip: &str, scope: BanScope) -> Result<u64>;

    /// All ban records, newest first, with display targets resolved.
    async fn list(&self) -> Result<Vec<BanWithTarget>>;
}

/// PostgreSQL implementation of BanRepo.
#[derive(Clone)]
pub struct PgBanRepo {
    pool: Pool<Postgres>,
}

impl PgBanRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Expiry terms for a new ban: the `permanent` flag and the stored
/// `expires_at`. Permanent bans store a far-future timestamp so one
/// ordering covers both kinds.
fn ban_terms(duration_minutes: Option<i64>, now: DateTime<Utc>) -> (bool, DateTime<Utc>) {
    match duration_minutes {
        Some(minutes) => (false, now + Duration::minutes(minutes)),
        None => (true, permanent_expiry()),
    }
}

/// The record that governs among a target's bans at `now`. Lapsed records
/// never govern; a permanent record outranks every timed one; among timed
/// records the latest expiry wins.
fn pick_governing(candidates: Vec<Ban>, now: DateTime<Utc>) -> Option<Ban> {
    candidates
        .into_iter()
        .filter(|ban| ban.permanent || ban.expires_at > now)
        .max_by_key(|ban| (ban.permanent, ban.expires_at))
}

fn permanent_expiry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .expect("fixed timestamp is always valid")
}

#[async_trait]
impl BanRepo for PgBanRepo {
    async fn governing_for_user(
        &self,
        user_id: Uuid,
        scope: BanScope,
        now: DateTime<Utc>,
    ) -> Result<Option<Ban>> {
        let candidates = sqlx::query_as::<_, Ban>(
            "SELECT * FROM bans WHERE user_id = $1 AND scope = $2",
        )
        .bind(user_id)
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;
        Ok(pick_governing(candidates, now))
    }

    async fn governing_for_ip(
        &self,
        ip: &str,
        scope: BanScope,
        now: DateTime<Utc>,
    ) -> Result<Option<Ban>> {
        let candidates = sqlx::query_as::<_, Ban>("SELECT * FROM bans WHERE ip = $1 AND scope = $2")
            .bind(ip)
            .bind(scope)
            .fetch_all(&self.pool)
            .await?;
        Ok(pick_governing(candidates, now))
    }

    async fn create_for_user<'a>(
        &self,
        user_id: Uuid,
        scope: BanScope,
        duration_minutes: Option<i64>,
        reason: Option<&'a str>,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CreateBanOutcome> {
        let (permanent, expires_at) = ban_terms(duration_minutes, now);

        // The role check rides in the same statement so a concurrent
        // promotion cannot slip a ban past it.
        let ban = sqlx::query_as::<_, Ban>(
            "INSERT INTO bans (scope, user_id, reason, permanent, expires_at, created_by) \
             SELECT $1, $2, $3, $4, $5, $6 \
             WHERE NOT EXISTS (SELECT 1 FROM users WHERE id = $2 AND role = 'admin') \
             RETURNING *",
        )
        .bind(scope)
        .bind(user_id)
        .bind(reason)
        .bind(permanent)
        .bind(expires_at)
        .bind(created_by)
        .fetch_optional(&self.pool)
        .await?;

        match ban {
            Some(ban) => Ok(CreateBanOutcome::Created(ban)),
            None => Ok(CreateBanOutcome::CannotBanAdmin),
        }
    }

    async fn create_for_ip<'a>(
        &self,
        ip: &str,
        scope: BanScope,
        duration_minutes: Option<i64>,
        reason: Option<&'a str>,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Ban> {
        let (permanent, expires_at) = ban_terms(duration_minutes, now);

        let ban = sqlx::query_as::<_, Ban>(
            "INSERT INTO bans (scope, ip, reason, permanent, expires_at, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING *",
        )
        .bind(scope)
        .bind(ip)
        .bind(reason)
        .bind(permanent)
        .bind(expires_at)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(ban)
    }

    async fn clear_for_user(&self, user_id: Uuid, scope: BanScope) -> Result<u64> {
        let result = sqlx::query("DELETE FROM bans WHERE user_id = $1 AND scope = $2")
            .bind(user_id)
            .bind(scope)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_for_ip(&self, ip: &str, scope: BanScope) -> Result<u64> {
        let result = sqlx::query("DELETE FROM bans WHERE ip = $1 AND scope = $2")
            .bind(ip)
            .bind(scope)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list(&self) -> Result<Vec<BanWithTarget>> {
        let bans = sqlx::query_as::<_, BanWithTarget>(
            "SELECT b.id, b.scope, COALESCE(u.email, b.ip, '') AS target, \
                    b.reason, b.permanent, b.expires_at, b.created_at \
             FROM bans b \
             LEFT JOIN users u ON u.id = b.user_id \
             ORDER BY b.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(bans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed_ban(expires_at: DateTime<Utc>) -> Ban {
        Ban {
            id: Uuid::new_v4(),
            scope: BanScope::Comment,
            user_id: Some(Uuid::new_v4()),
            ip: None,
            reason: None,
            permanent: false,
            expires_at,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    fn permanent_ban() -> Ban {
        Ban {
            permanent: true,
            ..timed_ban(permanent_expiry())
        }
    }

    #[test]
    fn timed_ban_expires_after_duration() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let (permanent, expires_at) = ban_terms(Some(60), now);

        assert!(!permanent);
        assert_eq!(expires_at, now + Duration::minutes(60));
    }

    #[test]
    fn missing_duration_means_permanent() {
        let now = Utc::now();

        let (permanent, expires_at) = ban_terms(None, now);

        assert!(permanent);
        assert!(expires_at > now + Duration::days(365 * 100));
    }

    #[test]
    fn permanent_ban_outranks_every_timed_ban() {
        let now = Utc::now();
        let permanent = permanent_ban();
        let permanent_id = permanent.id;
        let timed = timed_ban(now + Duration::days(365));

        let governing = pick_governing(vec![timed, permanent], now);

        assert_eq!(governing.map(|ban| ban.id), Some(permanent_id));
    }

    #[test]
    fn latest_expiry_wins_among_timed_bans() {
        let now = Utc::now();
        let short = timed_ban(now + Duration::hours(1));
        let long = timed_ban(now + Duration::days(7));
        let long_id = long.id;

        let governing = pick_governing(vec![long, short], now);

        assert_eq!(governing.map(|ban| ban.id), Some(long_id));
    }

    #[test]
    fn active_ban_governs_over_lapsed_ones() {
        let now = Utc::now();
        let active = timed_ban(now + Duration::minutes(5));
        let active_id = active.id;

        let governing = pick_governing(
            vec![
                timed_ban(now - Duration::hours(1)),
                active,
                timed_ban(now - Duration::days(2)),
            ],
            now,
        );

        assert_eq!(governing.map(|ban| ban.id), Some(active_id));
    }

    #[test]
    fn lapsed_bans_never_govern() {
        let now = Utc::now();
        let lapsed = vec![
            timed_ban(now - Duration::seconds(1)),
            timed_ban(now - Duration::days(30)),
        ];

        assert!(pick_governing(lapsed, now).is_none());
    }

    #[test]
    fn ban_expiring_now_no_longer_governs() {
        let now = Utc::now();

        assert!(pick_governing(vec![timed_ban(now)], now).is_none());
    }
}
