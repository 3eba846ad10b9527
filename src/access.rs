use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};

use crate::db::models::Post;
use crate::extractors::CurrentUser;

pub const LOGIN_PATH: &str = "/auth/login/";

// Path characters that stay readable inside `?next=`.
const NEXT_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

// Username characters that may appear unescaped in a profile path.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'@')
    .remove(b'+');

// Bytes that are never valid in a URI reference. `%` is left alone so
// already-escaped input passes through unchanged.
const NOT_URI: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

/// Profile page of `username`, with the name escaped as one path segment.
pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", utf8_percent_encode(username, PATH_SEGMENT))
}

/// Escape non-ASCII and other bytes a `Location` header must not carry.
pub fn iri_to_uri(location: &str) -> String {
    utf8_percent_encode(location, NOT_URI).to_string()
}

/// Login URL that returns to `next` after signing in.
pub fn login_url(next: &str) -> String {
    format!("{LOGIN_PATH}?next={}", utf8_percent_encode(next, NEXT_VALUE))
}

/// Accept `next` only when it is a path on this site; otherwise `/`.
pub fn safe_next(next: Option<&str>) -> &str {
    match next.map(str::trim) {
        Some(path)
            if path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\") =>
        {
            path
        }
        _ => "/",
    }
}

/// Only the author may edit or delete a post.
pub fn can_modify(user: &CurrentUser, post: &Post) -> bool {
    user.id == post.author_id
}
