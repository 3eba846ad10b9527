pub mod about;
pub mod assets;
pub mod auth;
pub mod follow;
pub mod media;
pub mod not_found;
pub mod posts;

use askama::Template;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::access::iri_to_uri;
use crate::db::models::Post;
use crate::db::TIMESTAMP_FORMAT;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::media::media_url;
use crate::paginator::{Page, PageLink};
use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// `302 Found` to `location`. Non-ASCII characters are percent-encoded.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, iri_to_uri(location))]).into_response()
}

/// What the page header needs to know about the viewer.
#[derive(Debug, Clone, Default)]
pub struct Nav {
    pub username: Option<String>,
}

impl Nav {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: Option<&CurrentUser>) -> Self {
        Self {
            username: user.map(|u| u.username.clone()),
        }
    }
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

pub struct GroupLink {
    pub slug: String,
    pub title: String,
}

/// A post as shown in feeds and on its own page.
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub group: Option<GroupLink>,
    pub image_url: Option<String>,
    pub pub_date: String,
}

impl From<Post> for PostCard {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            text: post.text,
            author: post.author_username,
            group: post.group.map(|g| GroupLink {
                slug: g.slug,
                title: g.title,
            }),
            image_url: post.image.as_deref().map(media_url),
            pub_date: parse_and_format_time(&post.pub_date),
        }
    }
}

#[derive(Template)]
#[template(path = "includes/feed.html")]
pub struct FeedTemplate {
    pub posts: Vec<PostCard>,
    pub links: Vec<PageLink>,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous: usize,
    pub next: usize,
    pub show_group: bool,
}

/// Render the post list and paginator of one feed page.
pub fn render_feed(page: Page<Post>, show_group: bool) -> AppResult<String> {
    let links = if page.has_other_pages() {
        page.links()
    } else {
        Vec::new()
    };
    let template = FeedTemplate {
        has_previous: page.has_previous(),
        has_next: page.has_next(),
        previous: page.previous_page_number(),
        next: page.next_page_number(),
        links,
        posts: page.items.into_iter().map(PostCard::from).collect(),
        show_group,
    };
    Ok(template.render()?)
}

/// Ids in URLs are integers; anything else names no resource.
pub fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse().map_err(|_| AppError::NotFound)
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .merge(posts::router())
        .merge(follow::router())
        .merge(auth::router())
        .merge(about::router())
        .route("/media/{*path}", get(media::serve))
        .route("/assets/{*path}", get(assets::serve))
        .fallback(not_found::fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Time formatting ---

pub fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, TIMESTAMP_FORMAT)
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%-d %b %Y").to_string()
}
