use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::blog::comments::{self, CommentInput};
use crate::blog::likes;
use crate::blog::posts::{self, PostInput};
use crate::blog::views::{self, Detail};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, JsonBody, MaybeUser};
use crate::state::AppState;

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blog/blogpost-like/{id}/", post(toggle_like))
        .route("/blog/blogpost-create/", post(create_post))
        .route("/blog/posts_list/", get(list_posts))
        .route("/blog/comments-create/", post(create_comment))
        .route("/blog/comments-list/", get(list_comments))
}

// --- Handlers ---

async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let profile_id = user.require_profile()?;

    let mut conn = state.db.get()?;
    let result = likes::toggle_like(&mut conn, profile_id, post_id)?;

    Ok(Json(json!({
        "liked": result.liked,
        "likes_count": result.likes_count,
        "message": if result.liked { "Post liked" } else { "Post unliked" },
    })))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(input): JsonBody<PostInput>,
) -> AppResult<Response> {
    let profile_id = user.require_profile()?;

    let conn = state.db.get()?;
    let post = posts::create_post(&conn, profile_id, input)?;
    let view = views::render_post(&conn, post, Detail::Full)?;

    Ok((StatusCode::CREATED, Json(view)).into_response())
}

async fn list_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let posts = posts::list_posts(&conn)?;
    let views = views::render_posts(&conn, posts, Detail::for_viewer(user.is_some()))?;

    Ok(Json(views).into_response())
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(input): JsonBody<CommentInput>,
) -> AppResult<Response> {
    let profile_id = user.require_profile()?;

    let conn = state.db.get()?;
    let comment = comments::create_comment(&conn, profile_id, input)?;
    let view = views::render_comment(&conn, comment, Detail::Full)?;
    tracing::info!("{}", view.label());

    Ok((StatusCode::CREATED, Json(view)).into_response())
}

async fn list_comments(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let comments = comments::list_comments(&conn)?;
    let views = views::render_comments(&conn, comments, Detail::for_viewer(user.is_some()))?;

    Ok(Json(views).into_response())
}
