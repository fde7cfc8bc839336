//! Comments on posts, from members and guests alike.
//!
//! Members are identified by their session and must clear a per-user
//! minimum gap between comments. Guests are identified by client IP and
//! must clear a daily quota with the same minimum gap. Both identities
//! are checked against the comment ban registry first, and every gate
//! runs before anything is written.
//!
//! Endpoints:
//! - POST /posts/{id}/comments - Comment on a post
//! - GET /posts/{id}/comments - List a post's comments

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use garde::Validate;
use shared::api::{CommentView, CreateCommentPayload, CreateCommentResponse};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::{auth::MaybeUser, client_ip::ClientIp},
    models::BanScope,
    repos::AdmitOutcome,
    state::AppState,
};

/// XP paid to a member for leaving a comment. Guests earn nothing.
const COMMENT_AWARD: i32 = 50;

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/comments", post(create_comment).get(list_comments))
}

#[debug_handler]
async fn create_comment(
    maybe: MaybeUser,
    client_ip: ClientIp,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCommentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let now = Utc::now();

    let post = state
        .repos
        .posts
        .find_by_id(id)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "Post not found"))?;

    let comment = match maybe.0 {
        Some(user) => {
            let ban = state
                .repos
                .bans
                .governing_for_user(user.id, BanScope::Comment, now)
                .await?;
            if let Some(ban) = ban {
                tracing::warn!(user_id = %user.id, ban_id = %ban.id, "comment rejected: banned");
                return Err(AppError::External(
                    StatusCode::FORBIDDEN,
                    "You are banned from commenting",
                ));
            }

            if !state.stores.comment_gap.try_acquire(user.id).await? {
                tracing::warn!(user_id = %user.id, "comment rejected: too frequent");
                return Err(AppError::External(
                    StatusCode::TOO_MANY_REQUESTS,
                    "You are commenting too quickly",
                ));
            }

            let comment = state
                .repos
                .comments
                .create_for_user(post.id, user.id, &payload.body)
                .await?;

            let receipt = state
                .repos
                .xp
                .award(user.id, user.role, COMMENT_AWARD, now)
                .await?;

            tracing::info!(
                user_id = %user.id,
                comment_id = %comment.id,
                awarded = receipt.added,
                "comment created"
            );

            comment
        }
        None => {
            let ban = state
                .repos
                .bans
                .governing_for_ip(&client_ip.0, BanScope::Comment, now)
                .await?;
            if let Some(ban) = ban {
                tracing::warn!(ip = %client_ip.0, ban_id = %ban.id, "comment rejected: banned");
                return Err(AppError::External(
                    StatusCode::FORBIDDEN,
                    "You are banned from commenting",
                ));
            }

            match state.repos.rate_limit.admit(&client_ip.0, now).await? {
                AdmitOutcome::Allowed => {}
                AdmitOutcome::TooFrequent => {
                    tracing::warn!(ip = %client_ip.0, "comment rejected: too frequent");
                    return Err(AppError::External(
                        StatusCode::TOO_MANY_REQUESTS,
                        "You are commenting too quickly",
                    ));
                }
                AdmitOutcome::DailyCapReached => {
                    tracing::warn!(ip = %client_ip.0, "comment rejected: daily limit");
                    return Err(AppError::External(
                        StatusCode::TOO_MANY_REQUESTS,
                        "Daily comment limit reached",
                    ));
                }
            }

            let comment = state
                .repos
                .comments
                .create_for_guest(
                    post.id,
                    payload.guest_name.as_deref(),
                    &client_ip.0,
                    &payload.body,
                )
                .await?;

            tracing::info!(ip = %client_ip.0, comment_id = %comment.id, "guest comment created");

            comment
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateCommentResponse { id: comment.id }),
    ))
}

#[debug_handler]
async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .repos
        .posts
        .find_by_id(id)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "Post not found"))?;

    let comments = state.repos.comments.list_for_post(id).await?;
    let views: Vec<CommentView> = comments.into_iter().map(CommentView::from).collect();

    Ok(Json(views))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommentWithAuthor;
    use crate::repos::{
        AwardReceipt, MockBanRepo, MockCommentRepo, MockPostRepo, MockRateLimitRepo, MockXpRepo,
    };
    use crate::stores::MockCommentGapStore;
    use crate::test_utils::{TestStateBuilder, mock_ban, mock_comment, mock_member, mock_post};
    use http_body_util::BodyExt;

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn valid_payload() -> CreateCommentPayload {
        CreateCommentPayload {
            body: "Nice write-up.".into(),
            guest_name: None,
        }
    }

    fn guest_ip() -> ClientIp {
        ClientIp("203.0.113.9".into())
    }

    fn post_repo_returning(post: crate::models::Post) -> MockPostRepo {
        let mut post_repo = MockPostRepo::new();
        post_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(post.clone())));
        post_repo
    }

    #[tokio::test]
    async fn guest_comment_on_unknown_post_is_not_found() {
        let mut post_repo = MockPostRepo::new();
        post_repo.expect_find_by_id().returning(|_| Ok(None));

        let state = TestStateBuilder::new().with_post_repo(post_repo).build();

        let result = create_comment(
            MaybeUser(None),
            guest_ip(),
            State(state),
            Path(Uuid::new_v4()),
            Json(valid_payload()),
        )
        .await;

        let Err(AppError::External(status, _)) = result else {
            panic!("Expected external error");
        };
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn banned_guest_cannot_comment() {
        let post = mock_post(Uuid::new_v4());
        let post_id = post.id;

        let mut ban_repo = MockBanRepo::new();
        ban_repo
            .expect_governing_for_ip()
            .returning(|_, _, _| Ok(Some(mock_ban(Uuid::new_v4(), BanScope::Comment))));

        let state = TestStateBuilder::new()
            .with_post_repo(post_repo_returning(post))
            .with_ban_repo(ban_repo)
            .build();

        let result = create_comment(
            MaybeUser(None),
            guest_ip(),
            State(state),
            Path(post_id),
            Json(valid_payload()),
        )
        .await;

        let Err(AppError::External(status, _)) = result else {
            panic!("Expected external error");
        };
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn guest_commenting_too_quickly_is_rejected() {
        let post = mock_post(Uuid::new_v4());
        let post_id = post.id;

        let mut ban_repo = MockBanRepo::new();
        ban_repo
            .expect_governing_for_ip()
            .returning(|_, _, _| Ok(None));

        let mut rate_limit_repo = MockRateLimitRepo::new();
        rate_limit_repo
            .expect_admit()
            .returning(|_, _| Ok(AdmitOutcome::TooFrequent));

        let state = TestStateBuilder::new()
            .with_post_repo(post_repo_returning(post))
            .with_ban_repo(ban_repo)
            .with_rate_limit_repo(rate_limit_repo)
            .build();

        let result = create_comment(
            MaybeUser(None),
            guest_ip(),
            State(state),
            Path(post_id),
            Json(valid_payload()),
        )
        .await;

        let Err(AppError::External(status, message)) = result else {
            panic!("Expected external error");
        };
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(message, "You are commenting too quickly");
    }

    #[tokio::test]
    async fn guest_over_daily_quota_is_rejected() {
        let post = mock_post(Uuid::new_v4());
        let post_id = post.id;

        let mut ban_repo = MockBanRepo::new();
        ban_repo
            .expect_governing_for_ip()
            .returning(|_, _, _| Ok(None));

        let mut rate_limit_repo = MockRateLimitRepo::new();
        rate_limit_repo
            .expect_admit()
            .returning(|_, _| Ok(AdmitOutcome::DailyCapReached));

        let state = TestStateBuilder::new()
            .with_post_repo(post_repo_returning(post))
            .with_ban_repo(ban_repo)
            .with_rate_limit_repo(rate_limit_repo)
            .build();

        let result = create_comment(
            MaybeUser(None),
            guest_ip(),
            State(state),
            Path(post_id),
            Json(valid_payload()),
        )
        .await;

        let Err(AppError::External(status, message)) = result else {
            panic!("Expected external error");
        };
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(message, "Daily comment limit reached");
    }

    #[tokio::test]
    async fn admitted_guest_comment_earns_no_xp() {
        let post = mock_post(Uuid::new_v4());
        let post_id = post.id;
        let comment = mock_comment(post_id, None);
        let comment_id = comment.id;

        let mut ban_repo = MockBanRepo::new();
        ban_repo
            .expect_governing_for_ip()
            .returning(|_, _, _| Ok(None));

        let mut rate_limit_repo = MockRateLimitRepo::new();
        rate_limit_repo
            .expect_admit()
            .returning(|_, _| Ok(AdmitOutcome::Allowed));

        let mut comment_repo = MockCommentRepo::new();
        comment_repo
            .expect_create_for_guest()
            .returning(move |_, _, _, _| Ok(comment.clone()));

        // No award expectation on the XP repo: a call would panic.
        let state = TestStateBuilder::new()
            .with_post_repo(post_repo_returning(post))
            .with_ban_repo(ban_repo)
            .with_rate_limit_repo(rate_limit_repo)
            .with_comment_repo(comment_repo)
            .with_xp_repo(MockXpRepo::new())
            .build();

        let response = create_comment(
            MaybeUser(None),
            guest_ip(),
            State(state),
            Path(post_id),
            Json(valid_payload()),
        )
        .await
        .unwrap()
        .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response_json(response).await;
        assert_eq!(body["id"], comment_id.to_string());
    }

    #[tokio::test]
    async fn banned_member_cannot_comment() {
        let member = mock_member("reader@example.com");
        let member_id = member.id;
        let post = mock_post(Uuid::new_v4());
        let post_id = post.id;

        let mut ban_repo = MockBanRepo::new();
        ban_repo
            .expect_governing_for_user()
            .returning(move |_, _, _| Ok(Some(mock_ban(member_id, BanScope::Comment))));

        // The gap store carries no expectations, so consuming the gap
        // after a ban rejection would panic.
        let state = TestStateBuilder::new()
            .with_post_repo(post_repo_returning(post))
            .with_ban_repo(ban_repo)
            .with_comment_gap_store(MockCommentGapStore::new())
            .build();

        let result = create_comment(
            MaybeUser(Some(member)),
            guest_ip(),
            State(state),
            Path(post_id),
            Json(valid_payload()),
        )
        .await;

        let Err(AppError::External(status, _)) = result else {
            panic!("Expected external error");
        };
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn member_commenting_too_quickly_is_rejected() {
        let member = mock_member("reader@example.com");
        let post = mock_post(Uuid::new_v4());
        let post_id = post.id;

        let mut ban_repo = MockBanRepo::new();
        ban_repo
            .expect_governing_for_user()
            .returning(|_, _, _| Ok(None));

        let mut gap_store = MockCommentGapStore::new();
        gap_store.expect_try_acquire().returning(|_| Ok(false));

        let state = TestStateBuilder::new()
            .with_post_repo(post_repo_returning(post))
            .with_ban_repo(ban_repo)
            .with_comment_gap_store(gap_store)
            .build();

        let result = create_comment(
            MaybeUser(Some(member)),
            guest_ip(),
            State(state),
            Path(post_id),
            Json(valid_payload()),
        )
        .await;

        let Err(AppError::External(status, message)) = result else {
            panic!("Expected external error");
        };
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(message, "You are commenting too quickly");
    }

    #[tokio::test]
    async fn member_comment_pays_the_commenter() {
        let member = mock_member("reader@example.com");
        let member_id = member.id;
        let post = mock_post(Uuid::new_v4());
        let post_id = post.id;
        let comment = mock_comment(post_id, Some(member_id));

        let mut ban_repo = MockBanRepo::new();
        ban_repo
            .expect_governing_for_user()
            .returning(|_, _, _| Ok(None));

        let mut gap_store = MockCommentGapStore::new();
        gap_store.expect_try_acquire().returning(|_| Ok(true));

        let mut comment_repo = MockCommentRepo::new();
        comment_repo
            .expect_create_for_user()
            .returning(move |_, _, _| Ok(comment.clone()));

        let mut xp_repo = MockXpRepo::new();
        xp_repo
            .expect_award()
            .withf(move |id, _, amount, _| *id == member_id && *amount == COMMENT_AWARD)
            .returning(|_, _, amount, _| {
                Ok(AwardReceipt {
                    added: amount,
                    daily_xp: amount,
                    lifetime_xp: amount as i64,
                })
            });

        let state = TestStateBuilder::new()
            .with_post_repo(post_repo_returning(post))
            .with_ban_repo(ban_repo)
            .with_comment_gap_store(gap_store)
            .with_comment_repo(comment_repo)
            .with_xp_repo(xp_repo)
            .build();

        let response = create_comment(
            MaybeUser(Some(member)),
            guest_ip(),
            State(state),
            Path(post_id),
            Json(valid_payload()),
        )
        .await
        .unwrap()
        .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn listing_resolves_display_authors() {
        let post = mock_post(Uuid::new_v4());
        let post_id = post.id;

        let mut comment_repo = MockCommentRepo::new();
        comment_repo.expect_list_for_post().returning(|_| {
            Ok(vec![
                CommentWithAuthor {
                    id: Uuid::new_v4(),
                    author: "reader@example.com".into(),
                    body: "First".into(),
                    created_at: Utc::now(),
                },
                CommentWithAuthor {
                    id: Uuid::new_v4(),
                    author: "anonymous".into(),
                    body: "Second".into(),
                    created_at: Utc::now(),
                },
            ])
        });

        let state = TestStateBuilder::new()
            .with_post_repo(post_repo_returning(post))
            .with_comment_repo(comment_repo)
            .build();

        let response = list_comments(State(state), Path(post_id))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body[0]["author"], "reader@example.com");
        assert_eq!(body[1]["author"], "anonymous");
    }
}
