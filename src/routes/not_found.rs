use askama::Template;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::extractors::MaybeUser;
use crate::routes::{Html, Nav};

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub nav: Nav,
}

fn render(nav: Nav) -> Response {
    (StatusCode::NOT_FOUND, Html(NotFoundTemplate { nav })).into_response()
}

/// 404 page for errors raised inside handlers, where the viewer is not known.
pub fn not_found_page() -> Response {
    render(Nav::anonymous())
}

/// Router fallback for paths that match no route.
pub async fn fallback(MaybeUser(user): MaybeUser) -> Response {
    render(Nav::for_user(user.as_ref()))
}
