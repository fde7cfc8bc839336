//! Post creation and likes.
//!
//! Creating a post consumes one of the author's daily post slots before
//! anything is written, then pays the author XP. Likes pay the post's
//! author, but only the first like from each reader counts and liking
//! your own post is refused.
//!
//! Endpoints:
//! - POST /posts - Create a post
//! - POST /posts/{id}/like - Like a post

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use garde::Validate;
use shared::api::{CreatePostPayload, CreatePostResponse, LikeResponse};
use uuid::Uuid;

use crate::{error::AppError, middleware::auth::AuthUser, state::AppState};

/// XP paid to the author for publishing a post.
const POST_AWARD: i32 = 100;
/// XP paid to the author when a reader likes their post.
const LIKE_AWARD: i32 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_post))
        .route("/{id}/like", post(like_post))
}

#[debug_handler]
async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let now = Utc::now();

    let admitted = state
        .repos
        .xp
        .consume_post_slot(auth.user.id, auth.user.role, now)
        .await?;
    if !admitted {
        tracing::warn!(user_id = %auth.user.id, "post rejected: daily limit");
        return Err(AppError::External(
            StatusCode::TOO_MANY_REQUESTS,
            "Daily post limit reached",
        ));
    }

    let post = state
        .repos
        .posts
        .create(auth.user.id, &payload.title, &payload.body)
        .await?;

    let receipt = state
        .repos
        .xp
        .award(auth.user.id, auth.user.role, POST_AWARD, now)
        .await?;

    tracing::info!(
        user_id = %auth.user.id,
        post_id = %post.id,
        awarded = receipt.added,
        "post created"
    );

    Ok((StatusCode::CREATED, Json(CreatePostResponse { id: post.id })))
}

#[debug_handler]
async fn like_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let post = state
        .repos
        .posts
        .find_by_id(id)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "Post not found"))?;

    if post.author_id == auth.user.id {
        return Err(AppError::External(
            StatusCode::BAD_REQUEST,
            "Cannot like your own post",
        ));
    }

    let first_like = state.repos.posts.like(id, auth.user.id).await?;

    let mut awarded = 0;
    if first_like {
        if let Some(author) = state.repos.users.find_by_id(post.author_id).await? {
            let receipt = state
                .repos
                .xp
                .award(author.id, author.role, LIKE_AWARD, Utc::now())
                .await?;
            awarded = receipt.added;
        }

        tracing::info!(user_id = %auth.user.id, post_id = %id, awarded, "post liked");
    }

    Ok(Json(LikeResponse { awarded }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::{AwardReceipt, MockPostRepo, MockUserRepo, MockXpRepo};
    use crate::test_utils::{TestStateBuilder, mock_member, mock_post};
    use http_body_util::BodyExt;

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn valid_payload() -> CreatePostPayload {
        CreatePostPayload {
            title: "Release notes".into(),
            body: "We shipped a thing.".into(),
        }
    }

    #[tokio::test]
    async fn create_post_rejects_when_slots_exhausted() {
        let author = mock_member("writer@example.com");

        let mut xp_repo = MockXpRepo::new();
        xp_repo
            .expect_consume_post_slot()
            .returning(|_, _, _| Ok(false));

        let state = TestStateBuilder::new().with_xp_repo(xp_repo).build();

        let result = create_post(AuthUser { user: author }, State(state), Json(valid_payload())).await;

        let Err(AppError::External(status, _)) = result else {
            panic!("Expected external error");
        };
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn create_post_awards_author() {
        let author = mock_member("writer@example.com");
        let author_id = author.id;
        let post = mock_post(author_id);

        let mut xp_repo = MockXpRepo::new();
        xp_repo
            .expect_consume_post_slot()
            .returning(|_, _, _| Ok(true));
        xp_repo
            .expect_award()
            .withf(move |id, _, amount, _| *id == author_id && *amount == POST_AWARD)
            .returning(|_, _, amount, _| {
                Ok(AwardReceipt {
                    added: amount,
                    daily_xp: amount,
                    lifetime_xp: amount as i64,
                })
            });

        let mut post_repo = MockPostRepo::new();
        let created = post.clone();
        post_repo
            .expect_create()
            .returning(move |_, _, _| Ok(created.clone()));

        let state = TestStateBuilder::new()
            .with_xp_repo(xp_repo)
            .with_post_repo(post_repo)
            .build();

        let response = create_post(AuthUser { user: author }, State(state), Json(valid_payload()))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response_json(response).await;
        assert_eq!(body["id"], post.id.to_string());
    }

    #[tokio::test]
    async fn like_own_post_is_rejected() {
        let reader = mock_member("reader@example.com");
        let post = mock_post(reader.id);
        let post_id = post.id;

        let mut post_repo = MockPostRepo::new();
        post_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(post.clone())));

        let state = TestStateBuilder::new().with_post_repo(post_repo).build();

        let result = like_post(AuthUser { user: reader }, State(state), Path(post_id)).await;

        let Err(AppError::External(status, _)) = result else {
            panic!("Expected external error");
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn first_like_pays_the_author() {
        let reader = mock_member("reader@example.com");
        let author = mock_member("writer@example.com");
        let author_id = author.id;
        let post = mock_post(author_id);
        let post_id = post.id;

        let mut post_repo = MockPostRepo::new();
        post_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(post.clone())));
        post_repo.expect_like().returning(|_, _| Ok(true));

        let mut user_repo = MockUserRepo::new();
        user_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(author.clone())));

        let mut xp_repo = MockXpRepo::new();
        xp_repo
            .expect_award()
            .withf(move |id, _, amount, _| *id == author_id && *amount == LIKE_AWARD)
            .returning(|_, _, amount, _| {
                Ok(AwardReceipt {
                    added: amount,
                    daily_xp: amount,
                    lifetime_xp: amount as i64,
                })
            });

        let state = TestStateBuilder::new()
            .with_post_repo(post_repo)
            .with_user_repo(user_repo)
            .with_xp_repo(xp_repo)
            .build();

        let response = like_post(AuthUser { user: reader }, State(state), Path(post_id))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["awarded"], 10);
    }

    #[tokio::test]
    async fn repeat_like_awards_nothing() {
        let reader = mock_member("reader@example.com");
        let post = mock_post(Uuid::new_v4());
        let post_id = post.id;

        let mut post_repo = MockPostRepo::new();
        post_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(post.clone())));
        post_repo.expect_like().returning(|_, _| Ok(false));

        let state = TestStateBuilder::new().with_post_repo(post_repo).build();

        let response = like_post(AuthUser { user: reader }, State(state), Path(post_id))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["awarded"], 0);
    }

    #[tokio::test]
    async fn like_unknown_post_is_not_found() {
        let reader = mock_member("reader@example.com");

        let mut post_repo = MockPostRepo::new();
        post_repo.expect_find_by_id().returning(|_| Ok(None));

        let state = TestStateBuilder::new().with_post_repo(post_repo).build();

        let result = like_post(AuthUser { user: reader }, State(state), Path(Uuid::new_v4())).await;

        let Err(AppError::External(status, _)) = result else {
            panic!("Expected external error");
        };
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
