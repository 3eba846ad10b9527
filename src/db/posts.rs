use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::models::{GroupRef, Post};
use crate::feed::FeedScope;

pub struct NewPost<'a> {
    pub author_id: i64,
    pub group_id: Option<i64>,
    pub text: &'a str,
    pub image: Option<&'a str>,
}

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.author_id, u.username,
        p.group_id, g.slug, g.title, p.image
     FROM posts p
     JOIN users u ON u.id = p.author_id
     LEFT JOIN groups g ON g.id = p.group_id";

// Newest first; bulk inserts can share a timestamp so id breaks ties.
const NEWEST_FIRST: &str = "ORDER BY p.pub_date DESC, p.id DESC";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let group_id: Option<i64> = row.get(5)?;
    let group = match group_id {
        Some(id) => Some(GroupRef {
            id,
            slug: row.get(6)?,
            title: row.get(7)?,
        }),
        None => None,
    };
    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: row.get(2)?,
        author_id: row.get(3)?,
        author_username: row.get(4)?,
        group,
        image: row.get(8)?,
    })
}

pub fn insert(conn: &Connection, post: &NewPost<'_>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO posts (author_id, group_id, text, image) VALUES (?1, ?2, ?3, ?4)",
        params![post.author_id, post.group_id, post.text, post.image],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Rewrite text, group and image. `pub_date` and author never change.
pub fn update(
    conn: &Connection,
    id: i64,
    text: &str,
    group_id: Option<i64>,
    image: Option<&str>,
) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE posts SET text = ?1, group_id = ?2, image = ?3 WHERE id = ?4",
        params![text, group_id, image, id],
    )?;
    Ok(rows > 0)
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("{POST_SELECT} WHERE p.id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

pub fn count(conn: &Connection, scope: &FeedScope) -> rusqlite::Result<usize> {
    let (filter, arg) = scope.filter();
    let sql = format!("SELECT COUNT(*) FROM posts p {filter}");
    let n: i64 = conn.query_row(&sql, params_from_iter(arg.iter()), |row| row.get(0))?;
    Ok(n as usize)
}

/// One window of a feed, newest first.
pub fn list(
    conn: &Connection,
    scope: &FeedScope,
    limit: usize,
    offset: usize,
) -> rusqlite::Result<Vec<Post>> {
    let (filter, arg) = scope.filter();
    let mut values: Vec<i64> = arg.into_iter().collect();
    let sql = format!(
        "{POST_SELECT} {filter} {NEWEST_FIRST} LIMIT ?{} OFFSET ?{}",
        values.len() + 1,
        values.len() + 2
    );
    values.push(limit as i64);
    values.push(offset as i64);

    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params_from_iter(values.iter()), from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}
