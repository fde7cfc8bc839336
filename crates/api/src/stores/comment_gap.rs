//! Per-user comment gap enforcement for Redis.
//!
//! Members have no daily comment cap, only a minimum gap between comments.
//! The gap is a single `SET NX` whose TTL is the gap itself: if the key
//! could be set, the previous comment is old enough; if not, one landed
//! too recently. One round trip, and concurrent attempts cannot both win.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Store for the per-user comment gap.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentGapStore: Send + Sync {
    /// Claim the gap slot for a user. Returns false when their previous
    /// comment was too recent.
    async fn try_acquire(&self, user_id: Uuid) -> Result<bool>;
}

/// Redis implementation of CommentGapStore.
#[derive(Clone)]
pub struct RedisCommentGapStore {
    client: redis::Client,
    gap_millis: u64,
}

impl RedisCommentGapStore {
    pub fn new(client: redis::Client, gap_seconds: i64) -> Self {
        Self {
            client,
            gap_millis: gap_seconds.max(0) as u64 * 1_000,
        }
    }

    fn key(user_id: Uuid) -> String {
        format!("comment-gap:{}", user_id)
    }
}

#[async_trait]
impl CommentGapStore for RedisCommentGapStore {
    async fn try_acquire(&self, user_id: Uuid) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let claimed: Option<String> = redis::cmd("SET")
            .arg(Self::key(user_id))
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(self.gap_millis)
            .query_async(&mut conn)
            .await?;

        Ok(claimed.is_some())
    }
}
