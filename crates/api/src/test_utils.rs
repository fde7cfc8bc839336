//! Shared test utilities for API handler tests.
//!
//! Provides common mock factories and a flexible `TestStateBuilder` for constructing
//! `AppState` instances with only the mocks needed for each test.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{TestStateBuilder, mock_member};
//!
//! let mut user_repo = MockUserRepo::new();
//! user_repo.expect_find_by_id().returning(|_| Ok(Some(mock_member("alice@example.com"))));
//!
//! let state = TestStateBuilder::new()
//!     .with_user_repo(user_repo)
//!     .build();
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{Ban, BanScope, Comment, Post, Role, User};
use crate::repos::{
    MockBanRepo, MockCommentRepo, MockPostRepo, MockRateLimitRepo, MockStatusRepo, MockUserRepo,
    MockXpRepo, Repos,
};
use crate::state::AppState;
use crate::stores::{MockCommentGapStore, MockElevationStore, MockSessionStore, Stores};

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        database_url: "postgres://test".to_string(),
        redis_url: "redis://test".to_string(),
        env: "test".to_string(),
        sentry_dsn: None,
        admin_email: "owner@example.com".to_string(),
        op_code: "123456".to_string(),
        elevation_ttl_minutes: 30,
        comment_min_gap_seconds: 10,
        guest_daily_comment_cap: 5,
        daily_xp_cap: 2_500,
        daily_post_cap: 50,
        session_ttl_hours: 168,
    }
}

/// Creates a member user with the given email.
pub fn mock_member(email: &str) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: "$argon2id$test".to_string(),
        role: Role::Member,
        created_at: Utc::now(),
    }
}

/// Creates an admin user with the given email.
pub fn mock_admin(email: &str) -> User {
    User {
        role: Role::Admin,
        ..mock_member(email)
    }
}

/// Creates a post by the given author.
pub fn mock_post(author_id: Uuid) -> Post {
    Post {
        id: Uuid::new_v4(),
        author_id,
        title: "Test post".to_string(),
        body: "Test body".to_string(),
        created_at: Utc::now(),
    }
}

/// Creates a comment on the given post. Pass `None` for a guest comment.
pub fn mock_comment(post_id: Uuid, author_id: Option<Uuid>) -> Comment {
    Comment {
        id: Uuid::new_v4(),
        post_id,
        author_id,
        guest_name: None,
        guest_ip: None,
        body: "Test comment".to_string(),
        created_at: Utc::now(),
    }
}

/// Creates an active one-hour user ban in the given scope.
pub fn mock_ban(user_id: Uuid, scope: BanScope) -> Ban {
    Ban {
        id: Uuid::new_v4(),
        scope,
        user_id: Some(user_id),
        ip: None,
        reason: Some("spam".to_string()),
        permanent: false,
        expires_at: Utc::now() + Duration::hours(1),
        created_by: Uuid::new_v4(),
        created_at: Utc::now(),
    }
}

/// Builder for constructing test `AppState` with custom mocks.
///
/// Uses default (empty) mocks for any repo/store not explicitly set.
/// This allows tests to only configure the mocks they actually need.
pub struct TestStateBuilder {
    config: Config,
    user_repo: Option<MockUserRepo>,
    post_repo: Option<MockPostRepo>,
    comment_repo: Option<MockCommentRepo>,
    ban_repo: Option<MockBanRepo>,
    xp_repo: Option<MockXpRepo>,
    rate_limit_repo: Option<MockRateLimitRepo>,
    status_repo: Option<MockStatusRepo>,
    session_store: Option<MockSessionStore>,
    elevation_store: Option<MockElevationStore>,
    comment_gap_store: Option<MockCommentGapStore>,
}

impl TestStateBuilder {
    /// Creates a new builder with no mocks configured.
    pub fn new() -> Self {
        Self {
            config: test_config(),
            user_repo: None,
            post_repo: None,
            comment_repo: None,
            ban_repo: None,
            xp_repo: None,
            rate_limit_repo: None,
            status_repo: None,
            session_store: None,
            elevation_store: None,
            comment_gap_store: None,
        }
    }

    #[allow(dead_code)]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_user_repo(mut self, repo: MockUserRepo) -> Self {
        self.user_repo = Some(repo);
        self
    }

    pub fn with_post_repo(mut self, repo: MockPostRepo) -> Self {
        self.post_repo = Some(repo);
        self
    }

    pub fn with_comment_repo(mut self, repo: MockCommentRepo) -> Self {
        self.comment_repo = Some(repo);
        self
    }

    pub fn with_ban_repo(mut self, repo: MockBanRepo) -> Self {
        self.ban_repo = Some(repo);
        self
    }

    pub fn with_xp_repo(mut self, repo: MockXpRepo) -> Self {
        self.xp_repo = Some(repo);
        self
    }

    pub fn with_rate_limit_repo(mut self, repo: MockRateLimitRepo) -> Self {
        self.rate_limit_repo = Some(repo);
        self
    }

    pub fn with_status_repo(mut self, repo: MockStatusRepo) -> Self {
        self.status_repo = Some(repo);
        self
    }

    pub fn with_session_store(mut self, store: MockSessionStore) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn with_elevation_store(mut self, store: MockElevationStore) -> Self {
        self.elevation_store = Some(store);
        self
    }

    pub fn with_comment_gap_store(mut self, store: MockCommentGapStore) -> Self {
        self.comment_gap_store = Some(store);
        self
    }

    /// Builds the `AppState` using configured mocks or defaults.
    pub fn build(self) -> AppState {
        let repos = Repos {
            users: Arc::new(self.user_repo.unwrap_or_else(MockUserRepo::new)),
            posts: Arc::new(self.post_repo.unwrap_or_else(MockPostRepo::new)),
            comments: Arc::new(self.comment_repo.unwrap_or_else(MockCommentRepo::new)),
            bans: Arc::new(self.ban_repo.unwrap_or_else(MockBanRepo::new)),
            xp: Arc::new(self.xp_repo.unwrap_or_else(MockXpRepo::new)),
            rate_limit: Arc::new(self.rate_limit_repo.unwrap_or_else(MockRateLimitRepo::new)),
            status: Arc::new(self.status_repo.unwrap_or_else(MockStatusRepo::new)),
        };

        let stores = Stores {
            sessions: Arc::new(self.session_store.unwrap_or_else(MockSessionStore::new)),
            elevation: Arc::new(self.elevation_store.unwrap_or_else(MockElevationStore::new)),
            comment_gap: Arc::new(
                self.comment_gap_store
                    .unwrap_or_else(MockCommentGapStore::new),
            ),
        };

        AppState {
            config: self.config,
            repos,
            stores,
        }
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
