use chrono::{Duration, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{StoreError, StoreResult};

/// Timestamp layout shared with the schema defaults, so string comparison in
/// SQL orders the same way as time.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Create a new session for a user. Returns the bearer token.
pub fn create_session(conn: &Connection, user_id: i64, hours: u64) -> StoreResult<String> {
    let expires_at = i64::try_from(hours)
        .ok()
        .and_then(Duration::try_hours)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or(StoreError::Invalid("Session lifetime out of range"))?
        .format(TIMESTAMP_FORMAT)
        .to_string();
    let token = generate_token();

    conn.execute(
        "INSERT INTO sessions (user_id, token, expires_at) VALUES (?1, ?2, ?3)",
        params![user_id, token, expires_at],
    )?;

    Ok(token)
}

/// Resolve a token to its user id. Unknown and expired tokens yield `None`.
pub fn resolve_session(conn: &Connection, token: &str) -> StoreResult<Option<(i64, String)>> {
    Ok(conn
        .query_row(
            "SELECT u.id, u.username FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1 AND s.expires_at > strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?)
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> StoreResult<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop every expired session. Returns how many were removed.
pub fn purge_expired(conn: &Connection) -> StoreResult<usize> {
    Ok(conn.execute(
        "DELETE FROM sessions WHERE expires_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        [],
    )?)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, test_pool};

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn created_session_resolves_to_user() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");

        let token = create_session(&conn, alice, 24).unwrap();
        assert_eq!(
            resolve_session(&conn, &token).unwrap(),
            Some((alice, "alice".to_string()))
        );
        assert_eq!(resolve_session(&conn, "nope").unwrap(), None);
    }

    #[test]
    fn expired_session_does_not_resolve_and_is_purged() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        conn.execute(
            "INSERT INTO sessions (user_id, token, expires_at) VALUES (?1, 'stale', '2000-01-01T00:00:00.000Z')",
            params![alice],
        )
        .unwrap();
        let live = create_session(&conn, alice, 1).unwrap();

        assert_eq!(resolve_session(&conn, "stale").unwrap(), None);
        assert_eq!(purge_expired(&conn).unwrap(), 1);
        assert!(resolve_session(&conn, &live).unwrap().is_some());
    }

    #[test]
    fn huge_lifetime_is_rejected_not_wrapped() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");

        assert!(matches!(
            create_session(&conn, alice, u64::MAX),
            Err(StoreError::Invalid(_))
        ));
        assert!(matches!(
            create_session(&conn, alice, i64::MAX as u64),
            Err(StoreError::Invalid(_))
        ));
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn deleted_session_no_longer_resolves() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = fixtures::user(&conn, "alice");
        let token = create_session(&conn, alice, 24).unwrap();

        delete_session(&conn, &token).unwrap();
        assert_eq!(resolve_session(&conn, &token).unwrap(), None);
    }
}
