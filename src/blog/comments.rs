use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::blog::posts;
use crate::db::models::Comment;
use crate::error::{AppError, AppResult};
use crate::validation::{FieldErrors, REQUIRED};

const COMMENT_COLUMNS: &str = "id, post_id, author_id, body, created_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentInput {
    pub blog_post: Option<i64>,
    pub body: Option<String>,
}

pub fn create_comment(
    conn: &Connection,
    author_id: i64,
    input: CommentInput,
) -> AppResult<Comment> {
    let mut errors = FieldErrors::new();
    let body = errors.text("body", input.body.as_deref(), usize::MAX);
    match input.blog_post {
        None => errors.add("blog_post", REQUIRED),
        Some(post_id) => match posts::get_post(conn, post_id) {
            Ok(_) => {}
            Err(AppError::NotFound) => errors.add(
                "blog_post",
                format!("Invalid pk \"{post_id}\" - object does not exist."),
            ),
            Err(e) => return Err(e),
        },
    }
    errors.into_result()?;

    posts::require_author(conn, author_id)?;

    conn.execute(
        "INSERT INTO comments (post_id, author_id, body) VALUES (?1, ?2, ?3)",
        params![input.blog_post, author_id, body],
    )?;
    let comment_id = conn.last_insert_rowid();

    tracing::info!(
        "Comment {} added to post {:?} by profile {}",
        comment_id,
        input.blog_post,
        author_id
    );
    get_comment(conn, comment_id)
}

pub fn get_comment(conn: &Connection, comment_id: i64) -> AppResult<Comment> {
    conn.query_row(
        &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
        params![comment_id],
        comment_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

/// Every comment on every post, newest first.
pub fn list_comments(conn: &Connection) -> AppResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments ORDER BY created_at DESC, id DESC"
    ))?;
    let comments = stmt
        .query_map([], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

pub fn comments_for_post(conn: &Connection, post_id: i64) -> AppResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ?1
         ORDER BY created_at DESC, id DESC"
    ))?;
    let comments = stmt
        .query_map(params![post_id], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
    })
}
