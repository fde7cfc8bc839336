//! Admin elevation sessions for Redis.
//!
//! Destructive admin actions require a recent operation-code check. A
//! successful check opens (or refreshes) a session that lapses after a
//! configured TTL. The record is written without a Redis expiry on purpose:
//! an expired session must still be readable so status checks can report
//! when it lapsed instead of pretending it never existed.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stored elevation session.
#[derive(Debug, Serialize, Deserialize)]
struct ElevationState {
    expires_at: DateTime<Utc>,
}

/// Elevation status as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElevationStatus {
    pub elevated: bool,
    /// Expiry of the current or most recent session. None when the
    /// principal has never elevated.
    pub until: Option<DateTime<Utc>>,
}

/// Outcome of an operation-code check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Session opened or refreshed; elevated until the contained time.
    Granted(DateTime<Utc>),
    /// The submitted code was empty.
    MissingCode,
    /// The submitted code did not match.
    InvalidCode,
}

/// Store for elevation sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ElevationStore: Send + Sync {
    /// Report whether the principal is currently elevated.
    async fn check(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<ElevationStatus>;

    /// Check the operation code and open a session on success. A failed
    /// check never touches an existing session.
    async fn verify(&self, user_id: Uuid, code: &str, now: DateTime<Utc>)
        -> Result<VerifyOutcome>;
}

/// Redis implementation of ElevationStore.
#[derive(Clone)]
pub struct RedisElevationStore {
    client: redis::Client,
    op_code_digest: String,
    ttl: Duration,
}

impl RedisElevationStore {
    pub fn new(client: redis::Client, op_code: String, ttl_minutes: i64) -> Self {
        Self {
            client,
            op_code_digest: code_digest(&op_code),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    fn key(user_id: Uuid) -> String {
        format!("elevation:{}", user_id)
    }
}

/// Hex SHA-256 of an operation code. The store holds and compares codes
/// only in this form.
fn code_digest(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// A session elevates until, but not at, its expiry.
fn status_at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> ElevationStatus {
    ElevationStatus {
        elevated: now < expires_at,
        until: Some(expires_at),
    }
}

#[async_trait]
impl ElevationStore for RedisElevationStore {
    async fn check(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<ElevationStatus> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::key(user_id);

        let json: Option<String> = conn.get(&key).await?;

        match json {
            Some(j) => {
                let state: ElevationState = serde_json::from_str(&j)?;
                Ok(status_at(state.expires_at, now))
            }
            None => Ok(ElevationStatus {
                elevated: false,
                until: None,
            }),
        }
    }

    async fn verify(
        &self,
        user_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifyOutcome> {
        if code.is_empty() {
            return Ok(VerifyOutcome::MissingCode);
        }
        if code_digest(code) != self.op_code_digest {
            return Ok(VerifyOutcome::InvalidCode);
        }

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::key(user_id);

        let until = now + self.ttl;
        let state = ElevationState { expires_at: until };

        let _: () = conn.set(&key, serde_json::to_string(&state)?).await?;
        Ok(VerifyOutcome::Granted(until))
    }
}
