//! The likes set of a post, as rows of `post_likes`.
//!
//! `(post_id, profile_id)` is the primary key, so a profile appears at most
//! once per post no matter how toggles interleave.

use rusqlite::{params, Connection, TransactionBehavior};

use crate::db::models::{LikeToggle, Profile};
use crate::error::{AppError, AppResult};
use crate::identity::{self, PROFILE_COLUMNS};

/// Flip `profile_id`'s like on `post_id`.
///
/// The check and the mutation run inside one `BEGIN IMMEDIATE` transaction,
/// which takes the write lock up front: two concurrent toggles by the same
/// profile are serialized, and the second one sees the first one's result.
pub fn toggle_like(conn: &mut Connection, profile_id: i64, post_id: i64) -> AppResult<LikeToggle> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let post_exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    if !post_exists {
        return Err(AppError::NotFound);
    }
    identity::find_profile(&tx, profile_id)?;

    let removed = tx.execute(
        "DELETE FROM post_likes WHERE post_id = ?1 AND profile_id = ?2",
        params![post_id, profile_id],
    )?;
    let liked = if removed == 0 {
        tx.execute(
            "INSERT INTO post_likes (post_id, profile_id) VALUES (?1, ?2)",
            params![post_id, profile_id],
        )?;
        true
    } else {
        false
    };

    let likes_count = likes_count(&tx, post_id)?;
    tx.commit()?;

    tracing::debug!(
        "Profile {} {} post {} ({} likes)",
        profile_id,
        if liked { "liked" } else { "unliked" },
        post_id,
        likes_count
    );
    Ok(LikeToggle { liked, likes_count })
}

pub fn likes_count(conn: &Connection, post_id: i64) -> AppResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn is_liked_by(conn: &Connection, post_id: i64, profile_id: i64) -> AppResult<bool> {
    let liked = conn.query_row(
        "SELECT COUNT(*) > 0 FROM post_likes WHERE post_id = ?1 AND profile_id = ?2",
        params![post_id, profile_id],
        |row| row.get(0),
    )?;
    Ok(liked)
}

/// Profiles that like `post_id`.
pub fn likers_of_post(conn: &Connection, post_id: i64) -> AppResult<Vec<Profile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles
         WHERE id IN (SELECT profile_id FROM post_likes WHERE post_id = ?1)
         ORDER BY id"
    ))?;
    let profiles = stmt
        .query_map(params![post_id], identity::profile_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(profiles)
}
