//! Login session storage for Redis.
//!
//! Tokens are handed to the client once and stored only as SHA-256 hashes,
//! so a leaked Redis dump cannot be replayed. A per-user index set lets an
//! admin ban cut every live session for the target at once.

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Store for login sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Open a session and return the bearer token. The token is not
    /// recoverable later.
    async fn create(&self, user_id: Uuid) -> Result<String>;

    /// Resolve a bearer token to its user, if the session is still live.
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>>;

    /// Drop one session.
    async fn revoke(&self, token: &str) -> Result<()>;

    /// Drop every live session for a user. Returns how many were cut.
    async fn revoke_for_user(&self, user_id: Uuid) -> Result<u64>;

    /// Health check - verify Redis connectivity.
    async fn ping(&self) -> Result<bool>;
}

/// Redis implementation of SessionStore.
#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(client: redis::Client, ttl_hours: i64) -> Self {
        Self {
            client,
            ttl_secs: ttl_hours.max(0) as u64 * 3600,
        }
    }

    fn session_key(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("session:{}", hex::encode(hasher.finalize()))
    }

    fn index_key(user_id: Uuid) -> String {
        format!("user-sessions:{}", user_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, user_id: Uuid) -> Result<String> {
        let token_bytes: [u8; 32] = rand::random();
        let token = hex::encode(token_bytes);

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::session_key(&token);
        let index = Self::index_key(user_id);

        let _: () = conn.set_ex(&key, user_id.to_string(), self.ttl_secs).await?;
        let _: () = conn.sadd(&index, &key).await?;
        // The index must outlive the newest session it references.
        let _: () = conn.expire(&index, self.ttl_secs as i64).await?;

        Ok(token)
    }

    async fn resolve(&self, token: &str) -> Result<Option<Uuid>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let value: Option<String> = conn.get(Self::session_key(token)).await?;

        match value {
            Some(id) => Ok(Some(Uuid::parse_str(&id)?)),
            None => Ok(None),
        }
    }

    async fn revoke(&self, token: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let _: () = conn.del(Self::session_key(token)).await?;
        Ok(())
    }

    async fn revoke_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let index = Self::index_key(user_id);

        let keys: Vec<String> = conn.smembers(&index).await?;

        let mut removed: u64 = 0;
        if !keys.is_empty() {
            removed = conn.del(&keys).await?;
        }
        let _: () = conn.del(&index).await?;

        Ok(removed)
    }

    async fn ping(&self) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}
