use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::access::profile_url;
use crate::db::{follows, users};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::feed::{self, FeedScope};
use crate::routes::{found, render_feed, Html, Nav, PageQuery};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub nav: Nav,
    pub feed: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(follow_index))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
}

/// Posts by the authors the viewer follows.
async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<FollowTemplate>> {
    let page = {
        let conn = state.db.get()?;
        feed::load_page(
            &conn,
            FeedScope::FollowedBy(user.id),
            query.page.as_deref(),
            state.config.feed.posts_per_page,
        )?
    };

    Ok(Html(FollowTemplate {
        nav: Nav::for_user(Some(&user)),
        feed: render_feed(page, true)?,
    }))
}

async fn profile_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    if follows::follow(&conn, user.id, author.id)? {
        tracing::info!("{} now follows {}", user.username, author.username);
    }

    Ok(found(&profile_url(&author.username)))
}

async fn profile_unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    if follows::unfollow(&conn, user.id, author.id)? {
        tracing::info!("{} unfollowed {}", user.username, author.username);
    }

    Ok(found(&profile_url(&author.username)))
}
