use rusqlite::Connection;

use crate::db::models::Post;
use crate::db::posts;
use crate::paginator::{Page, Paginator};

/// Which posts a feed shows. Every feed is ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    /// Home feed: every post.
    All,
    /// Posts of one group.
    Group(i64),
    /// Posts of one author.
    Author(i64),
    /// Posts of the authors a user follows.
    FollowedBy(i64),
}

impl FeedScope {
    /// `WHERE` clause over `posts p` and the value bound to `?1`, if any.
    pub(crate) fn filter(&self) -> (&'static str, Option<i64>) {
        match *self {
            FeedScope::All => ("", None),
            FeedScope::Group(id) => ("WHERE p.group_id = ?1", Some(id)),
            FeedScope::Author(id) => ("WHERE p.author_id = ?1", Some(id)),
            FeedScope::FollowedBy(id) => (
                "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?1)",
                Some(id),
            ),
        }
    }
}

/// Load the page of `scope` named by the raw `?page=` value.
pub fn load_page(
    conn: &Connection,
    scope: FeedScope,
    requested: Option<&str>,
    per_page: usize,
) -> rusqlite::Result<Page<Post>> {
    let total = posts::count(conn, &scope)?;
    let paginator = Paginator::new(total, per_page);
    let number = paginator.resolve(requested);
    let items = posts::list(conn, &scope, paginator.per_page(), paginator.offset(number))?;
    Ok(paginator.page(number, items))
}
