use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{User, UserProfile, UserStats, UserSummary};
use super::{unique_violation, StoreError, StoreResult};

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, bio, avatar, \
                            cover_photo, location, website, created_at, updated_at";

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: Option<&'a str>,
}

/// Editable profile fields. A `None` clears the column.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        full_name: row.get(4)?,
        bio: row.get(5)?,
        avatar: row.get(6)?,
        cover_photo: row.get(7)?,
        location: row.get(8)?,
        website: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub(crate) fn summary_from_row(row: &Row, offset: usize) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        full_name: row.get(offset + 2)?,
        avatar: row.get(offset + 3)?,
    })
}

/// Insert a new account. Duplicate email or username is a conflict, whether
/// caught by the lookup or by the unique index under a race.
pub fn create_user(conn: &Connection, new: &NewUser) -> StoreResult<User> {
    if find_by_email(conn, new.email)?.is_some() {
        return Err(StoreError::Conflict("User with this email already exists"));
    }
    if find_by_username(conn, new.username)?.is_some() {
        return Err(StoreError::Conflict("Username already taken"));
    }

    conn.execute(
        "INSERT INTO users (username, email, password_hash, full_name) VALUES (?1, ?2, ?3, ?4)",
        params![new.username, new.email, new.password_hash, new.full_name],
    )
    .map_err(|e| match unique_violation(e, "users.email", "User with this email already exists") {
        StoreError::Sql(e) => unique_violation(e, "users.username", "Username already taken"),
        other => other,
    })?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)?.ok_or(StoreError::NotFound("User not found"))
}

pub fn find_by_id(conn: &Connection, id: i64) -> StoreResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, params![id], user_from_row).optional()?)
}

pub fn find_by_email(conn: &Connection, email: &str) -> StoreResult<Option<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE email = ?1 COLLATE NOCASE",
        USER_COLUMNS
    );
    Ok(conn.query_row(&sql, params![email], user_from_row).optional()?)
}

pub fn find_by_username(conn: &Connection, username: &str) -> StoreResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
    Ok(conn
        .query_row(&sql, params![username], user_from_row)
        .optional()?)
}

pub fn exists(conn: &Connection, id: i64) -> StoreResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?)
}

pub fn profile(conn: &Connection, id: i64) -> StoreResult<Option<UserProfile>> {
    Ok(conn
        .query_row(
            "SELECT u.id, u.username, u.full_name, u.bio, u.avatar, u.cover_photo,
                    u.location, u.website, u.created_at,
                    (SELECT COUNT(*) FROM follows WHERE following_id = u.id),
                    (SELECT COUNT(*) FROM follows WHERE follower_id = u.id),
                    (SELECT COUNT(*) FROM posts WHERE user_id = u.id)
             FROM users u WHERE u.id = ?1",
            params![id],
            |row| {
                Ok(UserProfile {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    full_name: row.get(2)?,
                    bio: row.get(3)?,
                    avatar: row.get(4)?,
                    cover_photo: row.get(5)?,
                    location: row.get(6)?,
                    website: row.get(7)?,
                    created_at: row.get(8)?,
                    followers_count: row.get(9)?,
                    following_count: row.get(10)?,
                    posts_count: row.get(11)?,
                })
            },
        )
        .optional()?)
}

pub fn update_profile(conn: &Connection, id: i64, update: &ProfileUpdate) -> StoreResult<User> {
    let changed = conn.execute(
        "UPDATE users
         SET full_name = ?1, bio = ?2, location = ?3, website = ?4,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?5",
        params![
            update.full_name,
            update.bio,
            update.location,
            update.website,
            id
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound("User not found"));
    }
    find_by_id(conn, id)?.ok_or(StoreError::NotFound("User not found"))
}

pub fn update_avatar(conn: &Connection, id: i64, avatar: Option<&str>) -> StoreResult<User> {
    update_image_column(conn, id, "avatar", avatar)
}

pub fn update_cover_photo(conn: &Connection, id: i64, cover: Option<&str>) -> StoreResult<User> {
    update_image_column(conn, id, "cover_photo", cover)
}

fn update_image_column(
    conn: &Connection,
    id: i64,
    column: &'static str,
    value: Option<&str>,
) -> StoreResult<User> {
    let sql = format!(
        "UPDATE users SET {} = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?2",
        column
    );
    if conn.execute(&sql, params![value, id])? == 0 {
        return Err(StoreError::NotFound("User not found"));
    }
    find_by_id(conn, id)?.ok_or(StoreError::NotFound("User not found"))
}

/// Remove an account. Posts, comments, likes, follows and sessions go with it.
pub fn delete_user(conn: &Connection, id: i64) -> StoreResult<bool> {
    Ok(conn.execute("DELETE FROM users WHERE id = ?1", params![id])? > 0)
}

/// Case-insensitive substring match on username or full name.
pub fn search(conn: &Connection, query: &str, limit: i64) -> StoreResult<Vec<UserSummary>> {
    let pattern = format!("%{}%", escape_like(query));
    let mut stmt = conn.prepare(
        "SELECT id, username, full_name, avatar
         FROM users
         WHERE username LIKE ?1 ESCAPE '\\' OR full_name LIKE ?1 ESCAPE '\\'
         ORDER BY username
         LIMIT ?2",
    )?;
    let users = stmt
        .query_map(params![pattern, limit], |row| summary_from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn stats(conn: &Connection, id: i64) -> StoreResult<UserStats> {
    Ok(conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM posts WHERE user_id = ?1),
            (SELECT COUNT(*) FROM likes l JOIN posts p ON p.id = l.post_id WHERE p.user_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE following_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)",
        params![id],
        |row| {
            Ok(UserStats {
                posts: row.get(0)?,
                likes_received: row.get(1)?,
                followers: row.get(2)?,
                following: row.get(3)?,
            })
        },
    )?)
}
