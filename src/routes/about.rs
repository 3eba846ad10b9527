use askama::Template;
use axum::routing::get;
use axum::Router;

use crate::extractors::MaybeUser;
use crate::routes::{Html, Nav};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AuthorTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct TechTemplate {
    pub nav: Nav,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/about/author/", get(author))
        .route("/about/tech/", get(tech))
}

async fn author(MaybeUser(user): MaybeUser) -> Html<AuthorTemplate> {
    Html(AuthorTemplate {
        nav: Nav::for_user(user.as_ref()),
    })
}

async fn tech(MaybeUser(user): MaybeUser) -> Html<TechTemplate> {
    Html(TechTemplate {
        nav: Nav::for_user(user.as_ref()),
    })
}
