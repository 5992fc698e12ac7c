use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use super::models::CommentView;
use super::users::summary_from_row;
use super::{posts, Page, StoreError, StoreResult};

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at,
                                     u.id, u.username, u.full_name, u.avatar
                              FROM comments c
                              JOIN users u ON u.id = c.user_id";

fn comment_from_row(row: &Row) -> rusqlite::Result<CommentView> {
    Ok(CommentView {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        user: summary_from_row(row, 5)?,
    })
}

pub fn create_comment(
    conn: &Connection,
    post_id: i64,
    user_id: i64,
    content: &str,
) -> StoreResult<CommentView> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    if !posts::exists(&tx, post_id)? {
        return Err(StoreError::NotFound("Post not found"));
    }
    tx.execute(
        "INSERT INTO comments (post_id, user_id, content) VALUES (?1, ?2, ?3)",
        params![post_id, user_id, content],
    )?;
    let id = tx.last_insert_rowid();
    let comment = find_comment(&tx, id)?.ok_or(StoreError::NotFound("Comment not found"))?;
    tx.commit()?;
    Ok(comment)
}

pub fn find_comment(conn: &Connection, id: i64) -> StoreResult<Option<CommentView>> {
    let sql = format!("{} WHERE c.id = ?1", COMMENT_SELECT);
    Ok(conn.query_row(&sql, params![id], comment_from_row).optional()?)
}

/// Comments on a post, oldest first. `None` returns all of them.
pub fn list_for_post(
    conn: &Connection,
    post_id: i64,
    page: Option<Page>,
) -> StoreResult<Vec<CommentView>> {
    let page = page.unwrap_or(Page::new(-1, 0));
    let sql = format!(
        "{} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.id ASC LIMIT ?2 OFFSET ?3",
        COMMENT_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let comments = stmt
        .query_map(params![post_id, page.limit, page.offset], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

/// Delete a comment owned by `user_id`. Absent → NotFound, someone else's →
/// Forbidden. Returns the parent post id.
pub fn delete_comment(conn: &Connection, id: i64, user_id: i64) -> StoreResult<i64> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let (post_id, owner): (i64, i64) = tx
        .query_row(
            "SELECT post_id, user_id FROM comments WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or(StoreError::NotFound("Comment not found"))?;

    if owner != user_id {
        return Err(StoreError::Forbidden("Unauthorized to delete this comment"));
    }

    tx.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(post_id)
}
