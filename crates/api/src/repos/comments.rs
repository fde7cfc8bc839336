//! Comment repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::{Comment, CommentWithAuthor};

/// Repository for comment operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Create a comment authored by a member.
    async fn create_for_user(&self, post_id: Uuid, author_id: Uuid, body: &str)
        -> Result<Comment>;

    /// Create an anonymous comment, recording the source IP for moderation.
    async fn create_for_guest<'a>(
        &self,
        post_id: Uuid,
        guest_name: Option<&'a str>,
        guest_ip: &str,
        body: &str,
    ) -> Result<Comment>;

    /// List a post's comments in thread order with display authors resolved.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>>;

    /// Delete a comment. Returns false when it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// PostgreSQL implementation of CommentRepo.
#[derive(Clone)]
pub struct PgCommentRepo {
    pool: Pool<Postgres>,
}

impl PgCommentRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepo for PgCommentRepo {
    async fn create_for_user(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        body: &str,
    ) -> Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (post_id, author_id, body) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn create_for_guest<'a>(
        &self,
        post_id: Uuid,
        guest_name: Option<&'a str>,
        guest_ip: &str,
        body: &str,
    ) -> Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (post_id, guest_name, guest_ip, body) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(post_id)
        .bind(guest_name)
        .bind(guest_ip)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>> {
        let comments = sqlx::query_as::<_, CommentWithAuthor>(
            "SELECT c.id, COALESCE(u.email, c.guest_name, 'anonymous') AS author, \
                    c.body, c.created_at \
             FROM comments c \
             LEFT JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = $1 \
             ORDER BY c.created_at ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
