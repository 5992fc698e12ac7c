//! The directed follow graph. Follower/following counts are computed on read.

use rusqlite::{params, Connection, Transaction, TransactionBehavior};

use super::models::UserSummary;
use super::users::{self, summary_from_row};
use super::{StoreError, StoreResult};

fn begin_on_edge(
    conn: &Connection,
    follower_id: i64,
    following_id: i64,
) -> StoreResult<Transaction<'_>> {
    if follower_id == following_id {
        return Err(StoreError::Invalid("Cannot follow yourself"));
    }
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    if !users::exists(&tx, following_id)? {
        return Err(StoreError::NotFound("User not found"));
    }
    Ok(tx)
}

/// Flip the follow edge. Returns whether `follower_id` now follows.
pub fn toggle_follow(conn: &Connection, follower_id: i64, following_id: i64) -> StoreResult<bool> {
    let tx = begin_on_edge(conn, follower_id, following_id)?;
    let removed = tx.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
        params![follower_id, following_id],
    )?;
    if removed == 0 {
        tx.execute(
            "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)",
            params![follower_id, following_id],
        )?;
    }
    tx.commit()?;
    Ok(removed == 0)
}

/// Idempotent follow. Returns whether a new edge was created.
pub fn follow(conn: &Connection, follower_id: i64, following_id: i64) -> StoreResult<bool> {
    let tx = begin_on_edge(conn, follower_id, following_id)?;
    let added = tx.execute(
        "INSERT OR IGNORE INTO follows (follower_id, following_id) VALUES (?1, ?2)",
        params![follower_id, following_id],
    )?;
    tx.commit()?;
    Ok(added > 0)
}

/// Idempotent unfollow. Returns whether an edge was removed.
pub fn unfollow(conn: &Connection, follower_id: i64, following_id: i64) -> StoreResult<bool> {
    let removed = conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
        params![follower_id, following_id],
    )?;
    Ok(removed > 0)
}

pub fn is_following(conn: &Connection, follower_id: i64, following_id: i64) -> StoreResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2)",
        params![follower_id, following_id],
        |row| row.get(0),
    )?)
}

/// Users following `user_id`, newest edge first.
pub fn followers(conn: &Connection, user_id: i64) -> StoreResult<Vec<UserSummary>> {
    edge_list(
        conn,
        "SELECT u.id, u.username, u.full_name, u.avatar
         FROM follows f
         JOIN users u ON u.id = f.follower_id
         WHERE f.following_id = ?1
         ORDER BY f.created_at DESC, f.id DESC",
        user_id,
    )
}

/// Users `user_id` follows, newest edge first.
pub fn following(conn: &Connection, user_id: i64) -> StoreResult<Vec<UserSummary>> {
    edge_list(
        conn,
        "SELECT u.id, u.username, u.full_name, u.avatar
         FROM follows f
         JOIN users u ON u.id = f.following_id
         WHERE f.follower_id = ?1
         ORDER BY f.created_at DESC, f.id DESC",
        user_id,
    )
}

fn edge_list(conn: &Connection, sql: &str, user_id: i64) -> StoreResult<Vec<UserSummary>> {
    let mut stmt = conn.prepare(sql)?;
    let users = stmt
        .query_map(params![user_id], |row| summary_from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, test_pool};

    fn edge_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM follows", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn toggle_twice_restores_graph() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let bob = fixtures::user(&conn, "bob");

        assert!(toggle_follow(&conn, alice, bob).unwrap());
        assert!(is_following(&conn, alice, bob).unwrap());
        assert!(!is_following(&conn, bob, alice).unwrap());
        assert!(!toggle_follow(&conn, alice, bob).unwrap());
        assert_eq!(edge_count(&conn), 0);
    }

    #[test]
    fn self_follow_is_invalid() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        assert!(matches!(
            toggle_follow(&conn, alice, alice),
            Err(StoreError::Invalid("Cannot follow yourself"))
        ));
        assert!(matches!(
            follow(&conn, alice, alice),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_target_is_not_found() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        assert!(matches!(
            toggle_follow(&conn, alice, 404),
            Err(StoreError::NotFound("User not found"))
        ));
    }

    #[test]
    fn follow_and_unfollow_are_idempotent() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let bob = fixtures::user(&conn, "bob");

        assert!(follow(&conn, alice, bob).unwrap());
        assert!(!follow(&conn, alice, bob).unwrap());
        assert_eq!(edge_count(&conn), 1);
        assert!(unfollow(&conn, alice, bob).unwrap());
        assert!(!unfollow(&conn, alice, bob).unwrap());
        assert_eq!(edge_count(&conn), 0);
    }

    #[test]
    fn followers_and_following_lists() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let bob = fixtures::user(&conn, "bob");
        let carol = fixtures::user(&conn, "carol");
        follow(&conn, bob, alice).unwrap();
        follow(&conn, carol, alice).unwrap();
        follow(&conn, alice, carol).unwrap();

        let names = |list: Vec<UserSummary>| -> Vec<String> {
            list.into_iter().map(|u| u.username).collect()
        };
        assert_eq!(names(followers(&conn, alice).unwrap()), vec!["carol", "bob"]);
        assert_eq!(names(following(&conn, alice).unwrap()), vec!["carol"]);
        assert!(following(&conn, bob).unwrap().len() == 1);
    }
}
