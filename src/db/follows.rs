use rusqlite::{params, Connection};

/// Record that `user_id` follows `author_id`.
///
/// Returns `true` only when a new edge was written. Following yourself and
/// re-following are both no-ops; the `UNIQUE` constraint makes the insert
/// atomic under concurrent requests.
pub fn follow(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    if user_id == author_id {
        return Ok(false);
    }
    let rows = conn.execute(
        "INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?1, ?2)",
        params![user_id, author_id],
    )?;
    Ok(rows > 0)
}

/// Remove the edge if present. Returns whether one was removed.
pub fn unfollow(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
    )?;
    Ok(rows > 0)
}

pub fn is_following(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
        |row| row.get(0),
    )
}

pub fn count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM follows", [], |row| row.get(0))
}
