use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::identity;
use crate::validation::FieldErrors;

const TITLE_MAX: usize = 255;
const COVER_MAX: usize = 255;

const POST_COLUMNS: &str = "id, title, body, cover_photo, author_id, created_at, updated_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    pub title: Option<String>,
    pub body: Option<String>,
    pub cover_photo: Option<String>,
}

/// Create a post authored by `author_id`. The author always comes from the
/// caller's identity, never from the payload.
pub fn create_post(conn: &Connection, author_id: i64, input: PostInput) -> AppResult<Post> {
    let mut errors = FieldErrors::new();
    let title = errors.text("title", input.title.as_deref(), TITLE_MAX);
    let body = errors.text("body", input.body.as_deref(), usize::MAX);
    let cover_photo = errors.optional_text("cover_photo", input.cover_photo.as_deref(), COVER_MAX);
    errors.into_result()?;

    require_author(conn, author_id)?;

    conn.execute(
        "INSERT INTO posts (title, body, cover_photo, author_id) VALUES (?1, ?2, ?3, ?4)",
        params![title, body, cover_photo, author_id],
    )?;
    let post_id = conn.last_insert_rowid();

    tracing::info!("Post {} created by profile {}", post_id, author_id);
    get_post(conn, post_id)
}

pub fn get_post(conn: &Connection, post_id: i64) -> AppResult<Post> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
        params![post_id],
        post_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

/// Newest first. Posts created within the same millisecond fall back to
/// insertion order.
pub fn list_posts(conn: &Connection) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC"
    ))?;
    let posts = stmt
        .query_map([], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub(crate) fn require_author(conn: &Connection, author_id: i64) -> AppResult<()> {
    match identity::find_profile(conn, author_id) {
        Ok(_) => Ok(()),
        Err(AppError::NotFound) => Err(AppError::invalid("author", "Author does not exist.")),
        Err(e) => Err(e),
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        cover_photo: row.get(3)?,
        author_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
