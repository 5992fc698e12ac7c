//! Like membership. A row in `likes` is the liked state; the count is always
//! read back inside the same transaction as the change.

use rusqlite::{params, Connection, Transaction, TransactionBehavior};

use super::models::LikeState;
use super::{posts, StoreError, StoreResult};

/// Flip the like for (post, user) and report the resulting state.
pub fn toggle_like(conn: &Connection, post_id: i64, user_id: i64) -> StoreResult<LikeState> {
    let tx = begin_on_post(conn, post_id)?;
    let removed = tx.execute(
        "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
    )?;
    if removed == 0 {
        tx.execute(
            "INSERT INTO likes (post_id, user_id) VALUES (?1, ?2)",
            params![post_id, user_id],
        )?;
    }
    let state = like_state(&tx, post_id, user_id)?;
    tx.commit()?;
    Ok(state)
}

/// Like a post. Liking twice is a no-op.
pub fn like_post(conn: &Connection, post_id: i64, user_id: i64) -> StoreResult<LikeState> {
    let tx = begin_on_post(conn, post_id)?;
    tx.execute(
        "INSERT OR IGNORE INTO likes (post_id, user_id) VALUES (?1, ?2)",
        params![post_id, user_id],
    )?;
    let state = like_state(&tx, post_id, user_id)?;
    tx.commit()?;
    Ok(state)
}

/// Remove a like. Unliking a post that was never liked is a no-op.
pub fn unlike_post(conn: &Connection, post_id: i64, user_id: i64) -> StoreResult<LikeState> {
    let tx = begin_on_post(conn, post_id)?;
    tx.execute(
        "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
    )?;
    let state = like_state(&tx, post_id, user_id)?;
    tx.commit()?;
    Ok(state)
}

fn begin_on_post(conn: &Connection, post_id: i64) -> StoreResult<Transaction<'_>> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    if !posts::exists(&tx, post_id)? {
        return Err(StoreError::NotFound("Post not found"));
    }
    Ok(tx)
}

pub fn like_state(conn: &Connection, post_id: i64, user_id: i64) -> StoreResult<LikeState> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM likes WHERE post_id = ?1 AND user_id = ?2),
                (SELECT COUNT(*) FROM likes WHERE post_id = ?1)",
        params![post_id, user_id],
        |row| {
            Ok(LikeState {
                is_liked: row.get(0)?,
                likes_count: row.get(1)?,
            })
        },
    )?)
}

/// Ids of users who liked a post, most recent first.
pub fn likers(conn: &Connection, post_id: i64) -> StoreResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM likes WHERE post_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let ids = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}
