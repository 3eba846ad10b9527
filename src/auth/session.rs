use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

/// Create a new session for a user. Returns the session token.
pub fn create_session(conn: &Connection, user_id: i64, hours: u64) -> rusqlite::Result<String> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// The user id behind a live (unexpired) session token.
pub fn lookup_session(conn: &Connection, token: &str) -> rusqlite::Result<Option<(i64, String)>> {
    conn.query_row(
        "SELECT u.id, u.username FROM sessions s \
         JOIN users u ON u.id = s.user_id \
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
        params![token],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop every session of a user except `keep`, e.g. after a password change.
pub fn delete_other_sessions(conn: &Connection, user_id: i64, keep: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND token != ?2",
        params![user_id, keep],
    )
}

/// Drop every session of a user, e.g. after a password reset.
pub fn delete_user_sessions(conn: &Connection, user_id: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])
}

/// Remove sessions past their expiry.
pub fn delete_expired(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{test_pool, user};

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn session_round_trip() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = user(&conn, "alice");

        let token = create_session(&conn, id, 1).unwrap();
        assert_eq!(lookup_session(&conn, &token).unwrap(), Some((id, "alice".to_string())));

        delete_session(&conn, &token).unwrap();
        assert!(lookup_session(&conn, &token).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_ignored() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = user(&conn, "alice");
        let token = create_session(&conn, id, 1).unwrap();
        conn.execute(
            "UPDATE sessions SET expires_at = datetime('now', '-1 hours') WHERE token = ?1",
            params![token],
        )
        .unwrap();
        assert!(lookup_session(&conn, &token).unwrap().is_none());
    }

    #[test]
    fn delete_other_sessions_keeps_current() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = user(&conn, "alice");
        let current = create_session(&conn, id, 1).unwrap();
        let stale = create_session(&conn, id, 1).unwrap();

        assert_eq!(delete_other_sessions(&conn, id, &current).unwrap(), 1);
        assert!(lookup_session(&conn, &current).unwrap().is_some());
        assert!(lookup_session(&conn, &stale).unwrap().is_none());
    }

    #[test]
    fn delete_expired_prunes_only_stale_sessions() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = user(&conn, "alice");
        let live = create_session(&conn, id, 1).unwrap();
        let stale = create_session(&conn, id, 1).unwrap();
        conn.execute(
            "UPDATE sessions SET expires_at = datetime('now', '-1 hours') WHERE token = ?1",
            params![stale],
        )
        .unwrap();

        assert_eq!(delete_expired(&conn).unwrap(), 1);
        assert_eq!(delete_expired(&conn).unwrap(), 0);
        assert!(lookup_session(&conn, &live).unwrap().is_some());
    }

    #[test]
    fn delete_user_sessions_signs_out_everywhere() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = user(&conn, "alice");
        let bob = user(&conn, "bob");
        create_session(&conn, alice, 1).unwrap();
        create_session(&conn, alice, 1).unwrap();
        let other = create_session(&conn, bob, 1).unwrap();

        assert_eq!(delete_user_sessions(&conn, alice).unwrap(), 2);
        assert!(lookup_session(&conn, &other).unwrap().is_some());
    }
}
