//! Post storage and feed composition.
//!
//! Every read returns [`PostView`]s: the post row joined with its author,
//! aggregate like/comment counts, the viewer's like state, the liking user
//! ids and the full comment thread. Counts are always derived from the
//! membership tables, and a page plus its embedded likes and comments is read
//! inside one transaction so all of them describe the same snapshot.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rusqlite::{Transaction, TransactionBehavior};

use super::models::PostView;
use super::users::summary_from_row;
use super::{comments, likes, Page, StoreError, StoreResult};

const POST_SELECT: &str = "SELECT p.id, p.user_id, p.content, p.image, p.created_at, p.updated_at,
            (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id),
            (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
            EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1),
            u.id, u.username, u.full_name, u.avatar
     FROM posts p
     JOIN users u ON u.id = p.user_id";

const NEWEST_FIRST: &str = "ORDER BY p.created_at DESC, p.id DESC";

/// Which posts a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every post.
    Everyone,
    /// The viewer's own posts plus posts by anyone they follow.
    Timeline(i64),
    /// Posts written by one user.
    Author(i64),
    /// Posts one user has liked, most recently liked first.
    LikedBy(i64),
}

fn post_from_row(row: &Row) -> rusqlite::Result<PostView> {
    Ok(PostView {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        image: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        likes_count: row.get(6)?,
        comments_count: row.get(7)?,
        is_liked: row.get(8)?,
        user: summary_from_row(row, 9)?,
        likes: Vec::new(),
        comments: Vec::new(),
    })
}

fn viewer_value(viewer: Option<i64>) -> Value {
    viewer.map(Value::Integer).unwrap_or(Value::Null)
}

pub fn create_post(
    conn: &Connection,
    user_id: i64,
    content: &str,
    image: Option<&str>,
) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO posts (user_id, content, image) VALUES (?1, ?2, ?3)",
        params![user_id, content, image],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn exists(conn: &Connection, id: i64) -> StoreResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?)
}

/// The feed shown to a viewer: their timeline when signed in, every post
/// otherwise.
pub fn feed(conn: &Connection, viewer: Option<i64>, page: Page) -> StoreResult<Vec<PostView>> {
    let scope = match viewer {
        Some(id) => Scope::Timeline(id),
        None => Scope::Everyone,
    };
    list(conn, scope, viewer, page)
}

pub fn list(
    conn: &Connection,
    scope: Scope,
    viewer: Option<i64>,
    page: Page,
) -> StoreResult<Vec<PostView>> {
    let (filter, subject) = match scope {
        Scope::Everyone => (NEWEST_FIRST.to_string(), None),
        Scope::Timeline(id) => (
            format!(
                "WHERE p.user_id = ?2
                    OR p.user_id IN (SELECT following_id FROM follows WHERE follower_id = ?2)
                 {}",
                NEWEST_FIRST
            ),
            Some(id),
        ),
        Scope::Author(id) => (format!("WHERE p.user_id = ?2 {}", NEWEST_FIRST), Some(id)),
        Scope::LikedBy(id) => (
            "JOIN likes lk ON lk.post_id = p.id AND lk.user_id = ?2
             ORDER BY lk.created_at DESC, lk.id DESC"
                .to_string(),
            Some(id),
        ),
    };

    let mut values = vec![viewer_value(viewer)];
    values.extend(subject.map(Value::Integer));
    let limit_at = values.len() + 1;
    values.push(Value::Integer(page.limit));
    values.push(Value::Integer(page.offset));

    let sql = format!(
        "{} {} LIMIT ?{} OFFSET ?{}",
        POST_SELECT,
        filter,
        limit_at,
        limit_at + 1
    );

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
    let mut posts = {
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    for post in posts.iter_mut() {
        hydrate(&tx, post)?;
    }
    tx.commit()?;
    Ok(posts)
}

pub fn find_post(conn: &Connection, id: i64, viewer: Option<i64>) -> StoreResult<Option<PostView>> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
    let sql = format!("{} WHERE p.id = ?2", POST_SELECT);
    let post = tx
        .query_row(&sql, params![viewer, id], post_from_row)
        .optional()?;
    let post = match post {
        Some(mut post) => {
            hydrate(&tx, &mut post)?;
            Some(post)
        }
        None => None,
    };
    tx.commit()?;
    Ok(post)
}

fn hydrate(conn: &Connection, post: &mut PostView) -> StoreResult<()> {
    post.likes = likes::likers(conn, post.id)?;
    post.comments = comments::list_for_post(conn, post.id, None)?;
    Ok(())
}

fn owner_of(conn: &Connection, id: i64) -> StoreResult<i64> {
    conn.query_row(
        "SELECT user_id FROM posts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(StoreError::NotFound("Post not found"))
}

/// Replace the content of a post owned by `user_id`.
pub fn update_post(conn: &Connection, id: i64, user_id: i64, content: &str) -> StoreResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    if owner_of(&tx, id)? != user_id {
        return Err(StoreError::Forbidden("Unauthorized to edit this post"));
    }
    tx.execute(
        "UPDATE posts SET content = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?2",
        params![content, id],
    )?;
    tx.commit()?;
    Ok(())
}

/// Delete a post owned by `user_id`; its comments and likes cascade.
pub fn delete_post(conn: &Connection, id: i64, user_id: i64) -> StoreResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    if owner_of(&tx, id)? != user_id {
        return Err(StoreError::Forbidden("Unauthorized to delete this post"));
    }
    tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, test_pool};

    fn ids(posts: &[PostView]) -> Vec<i64> {
        posts.iter().map(|p| p.id).collect()
    }

    #[test]
    fn anonymous_feed_is_global_newest_first() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let bob = fixtures::user(&conn, "bob");
        let a1 = fixtures::post_at(&conn, alice, "a1", "2025-01-01T00:00:00.000Z");
        let b1 = fixtures::post_at(&conn, bob, "b1", "2025-01-02T00:00:00.000Z");
        let a2 = fixtures::post_at(&conn, alice, "a2", "2025-01-03T00:00:00.000Z");

        let posts = feed(&conn, None, Page::new(20, 0)).unwrap();
        assert_eq!(ids(&posts), vec![a2, b1, a1]);
        assert!(posts.iter().all(|p| !p.is_liked));
    }

    #[test]
    fn timeline_only_includes_self_and_followed() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let bob = fixtures::user(&conn, "bob");
        let carol = fixtures::user(&conn, "carol");
        let a = fixtures::post_at(&conn, alice, "a", "2025-01-01T00:00:00.000Z");
        let b = fixtures::post_at(&conn, bob, "b", "2025-01-02T00:00:00.000Z");
        fixtures::post_at(&conn, carol, "c", "2025-01-03T00:00:00.000Z");
        conn.execute(
            "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)",
            params![alice, bob],
        )
        .unwrap();

        let posts = feed(&conn, Some(alice), Page::new(20, 0)).unwrap();
        assert_eq!(ids(&posts), vec![b, a]);
    }

    #[test]
    fn same_timestamp_ties_break_by_id() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let first = fixtures::post_at(&conn, alice, "1", "2025-01-01T00:00:00.000Z");
        let second = fixtures::post_at(&conn, alice, "2", "2025-01-01T00:00:00.000Z");

        let posts = feed(&conn, None, Page::new(20, 0)).unwrap();
        assert_eq!(ids(&posts), vec![second, first]);
    }

    #[test]
    fn pagination_windows_the_feed() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let mut created = Vec::new();
        for day in 1..=5 {
            let ts = format!("2025-01-0{}T00:00:00.000Z", day);
            created.push(fixtures::post_at(&conn, alice, "p", &ts));
        }
        created.reverse();

        let page = feed(&conn, None, Page::new(2, 1)).unwrap();
        assert_eq!(ids(&page), created[1..3].to_vec());
        assert!(feed(&conn, None, Page::new(2, 10)).unwrap().is_empty());
    }

    #[test]
    fn views_carry_counts_likes_and_comments() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let bob = fixtures::user(&conn, "bob");
        let post = fixtures::post_at(&conn, alice, "hi", "2025-01-01T00:00:00.000Z");
        likes::like_post(&conn, post, bob).unwrap();
        comments::create_comment(&conn, post, bob, "hey").unwrap();

        let as_bob = find_post(&conn, post, Some(bob)).unwrap().unwrap();
        assert_eq!(as_bob.likes_count, 1);
        assert_eq!(as_bob.likes, vec![bob]);
        assert_eq!(as_bob.comments_count, 1);
        assert_eq!(as_bob.comments.len(), 1);
        assert_eq!(as_bob.comments[0].content, "hey");
        assert_eq!(as_bob.user.username, "alice");
        assert!(as_bob.is_liked);

        let as_alice = find_post(&conn, post, Some(alice)).unwrap().unwrap();
        assert!(!as_alice.is_liked);
        let anonymous = find_post(&conn, post, None).unwrap().unwrap();
        assert!(!anonymous.is_liked);
    }

    #[test]
    fn author_and_liked_scopes() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let bob = fixtures::user(&conn, "bob");
        let a = fixtures::post_at(&conn, alice, "a", "2025-01-01T00:00:00.000Z");
        let b = fixtures::post_at(&conn, bob, "b", "2025-01-02T00:00:00.000Z");
        likes::like_post(&conn, b, alice).unwrap();
        likes::like_post(&conn, a, alice).unwrap();

        let by_bob = list(&conn, Scope::Author(bob), None, Page::new(20, 0)).unwrap();
        assert_eq!(ids(&by_bob), vec![b]);

        let liked = list(&conn, Scope::LikedBy(alice), Some(alice), Page::new(20, 0)).unwrap();
        assert_eq!(ids(&liked), vec![a, b]);
        assert!(liked.iter().all(|p| p.is_liked));
    }

    #[test]
    fn update_and_delete_enforce_ownership() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let bob = fixtures::user(&conn, "bob");
        let post = create_post(&conn, alice, "draft", None).unwrap();

        assert!(matches!(
            update_post(&conn, post, bob, "hijack"),
            Err(StoreError::Forbidden(_))
        ));
        update_post(&conn, post, alice, "final").unwrap();
        assert_eq!(
            find_post(&conn, post, None).unwrap().unwrap().content,
            "final"
        );

        assert!(matches!(
            delete_post(&conn, post, bob),
            Err(StoreError::Forbidden(_))
        ));
        delete_post(&conn, post, alice).unwrap();
        assert!(matches!(
            delete_post(&conn, post, alice),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_post_cascades_comments_and_likes() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let bob = fixtures::user(&conn, "bob");
        let post = create_post(&conn, alice, "bye", None).unwrap();
        likes::like_post(&conn, post, bob).unwrap();
        comments::create_comment(&conn, post, bob, "noo").unwrap();

        delete_post(&conn, post, alice).unwrap();

        assert!(likes::likers(&conn, post).unwrap().is_empty());
        assert!(comments::list_for_post(&conn, post, None).unwrap().is_empty());
        assert!(find_post(&conn, post, None).unwrap().is_none());
    }
}
