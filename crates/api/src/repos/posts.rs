//! Post repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::Post;

/// Repository for post operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Create a new post.
    async fn create(&self, author_id: Uuid, title: &str, body: &str) -> Result<Post>;

    /// Find a post by ID.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>>;

    /// Record a like. Returns true only for the first like from this user,
    /// false on repeats.
    async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool>;
}

/// PostgreSQL implementation of PostRepo.
#[derive(Clone)]
pub struct PgPostRepo {
    pool: Pool<Postgres>,
}

impl PgPostRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepo for PgPostRepo {
    async fn create(&self, author_id: Uuid, title: &str, body: &str) -> Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            "INSERT INTO posts (author_id, title, body) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(author_id)
        .bind(title)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        // The primary key on (post_id, user_id) makes repeat likes no-ops.
        let result = sqlx::query(
            "INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
