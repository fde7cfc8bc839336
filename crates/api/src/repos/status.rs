//! Database reachability for the health endpoint.
//!
//! Every ban, quota, and ledger read funnels through the same pool, so one
//! round trip answers for all of them. The Redis half of the health picture
//! comes from the session store's ping.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

/// Readiness probe against the relational backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusRepo: Send + Sync {
    /// True when the database answers a round trip.
    async fn readiness(&self) -> Result<bool>;
}

/// PostgreSQL implementation of StatusRepo.
#[derive(Clone)]
pub struct PgStatusRepo {
    pool: Pool<Postgres>,
}

impl PgStatusRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusRepo for PgStatusRepo {
    async fn readiness(&self) -> Result<bool> {
        let answer: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(answer == 1)
    }
}
