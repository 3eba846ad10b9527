//! Password reset tokens. Each token is random, tied to one user, expires
//! after a configured number of hours and can be redeemed once.

use rand::Rng;
use rusqlite::{params, Connection};

/// Issue a reset token for `user_id`.
pub fn create_reset(conn: &Connection, user_id: i64, hours: u64) -> rusqlite::Result<String> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO password_resets (id, user_id, token, expires_at) \
         VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Whether `token` is an unexpired reset token issued to `user_id`.
pub fn is_valid(conn: &Connection, user_id: i64, token: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM password_resets \
         WHERE user_id = ?1 AND token = ?2 AND expires_at > datetime('now')",
        params![user_id, token],
        |row| row.get(0),
    )
}

/// Redeem `token`. On success every outstanding token of the user is
/// dropped, so a link works at most once.
pub fn consume(conn: &Connection, user_id: i64, token: &str) -> rusqlite::Result<bool> {
    let redeemed = conn.execute(
        "DELETE FROM password_resets \
         WHERE user_id = ?1 AND token = ?2 AND expires_at > datetime('now')",
        params![user_id, token],
    )?;
    if redeemed == 0 {
        return Ok(false);
    }
    delete_for_user(conn, user_id)?;
    Ok(true)
}

pub fn delete_for_user(conn: &Connection, user_id: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM password_resets WHERE user_id = ?1",
        params![user_id],
    )
}

pub fn delete_expired(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM password_resets WHERE expires_at <= datetime('now')",
        [],
    )
}

fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
