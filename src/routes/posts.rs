use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};

use crate::access::{self, profile_url};
use crate::db::models::{Group, Post};
use crate::db::{comments, follows, groups, posts, users};
use crate::db::posts::NewPost;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::feed::{self, FeedScope};
use crate::forms::{CommentForm, PostForm, PostFormErrors};
use crate::media::media_url;
use crate::routes::{
    found, parse_and_format_time, parse_id, render_feed, Html, Nav, PageQuery, PostCard,
};
use crate::state::AppState;

// --- View structs ---

pub struct CommentView {
    pub author: String,
    pub text: String,
    pub created: String,
}

pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub nav: Nav,
    pub feed: String,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub nav: Nav,
    pub group: Group,
    pub feed: String,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub nav: Nav,
    pub username: String,
    pub full_name: String,
    pub post_count: usize,
    pub following: bool,
    pub can_follow: bool,
    pub feed: String,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub nav: Nav,
    pub post: PostCard,
    pub author_posts: usize,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub can_comment: bool,
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub nav: Nav,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub image_url: Option<String>,
    pub errors: PostFormErrors,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/create/", get(post_create_page).post(post_create))
        .route("/posts/{id}/", get(post_detail))
        .route("/posts/{id}/edit/", get(post_edit_page).post(post_edit))
        .route("/posts/{id}/delete/", post(post_delete))
        .route("/posts/{id}/comment/", get(comment_redirect).post(add_comment))
}

// --- Handlers ---

/// Home feed. The rendered post list is served from the feed cache when fresh.
async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<IndexTemplate>> {
    let key = query.page.clone().unwrap_or_default();
    let cached = state.feed_cache.lock().await.get(&key);

    let feed = match cached {
        Some(body) => body,
        None => {
            let page = {
                let conn = state.db.get()?;
                feed::load_page(
                    &conn,
                    FeedScope::All,
                    query.page.as_deref(),
                    state.config.feed.posts_per_page,
                )?
            };
            let body = render_feed(page, true)?;
            state.feed_cache.lock().await.put(key, body.clone());
            body
        }
    };

    Ok(Html(IndexTemplate {
        nav: Nav::for_user(user.as_ref()),
        feed,
    }))
}

async fn group_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<GroupListTemplate>> {
    let (group, page) = {
        let conn = state.db.get()?;
        let group = groups::find_by_slug(&conn, &slug)?.ok_or(AppError::NotFound)?;
        let page = feed::load_page(
            &conn,
            FeedScope::Group(group.id),
            query.page.as_deref(),
            state.config.feed.posts_per_page,
        )?;
        (group, page)
    };

    Ok(Html(GroupListTemplate {
        nav: Nav::for_user(user.as_ref()),
        group,
        feed: render_feed(page, false)?,
    }))
}

async fn profile(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let (author, page, following) = {
        let conn = state.db.get()?;
        let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;
        let page = feed::load_page(
            &conn,
            FeedScope::Author(author.id),
            query.page.as_deref(),
            state.config.feed.posts_per_page,
        )?;
        let following = match &user {
            Some(viewer) => follows::is_following(&conn, viewer.id, author.id)?,
            None => false,
        };
        (author, page, following)
    };

    let can_follow = user.as_ref().is_some_and(|viewer| viewer.id != author.id);

    Ok(Html(ProfileTemplate {
        nav: Nav::for_user(user.as_ref()),
        full_name: author.display_name(),
        username: author.username,
        post_count: page.total,
        following,
        can_follow,
        feed: render_feed(page, true)?,
    }))
}

async fn post_detail(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Html<PostDetailTemplate>> {
    let id = parse_id(&id)?;
    let (post, author_posts, comments) = {
        let conn = state.db.get()?;
        let post = posts::find(&conn, id)?.ok_or(AppError::NotFound)?;
        let author_posts = posts::count(&conn, &FeedScope::Author(post.author_id))?;
        let comments = comments::list_for_post(&conn, id)?;
        (post, author_posts, comments)
    };

    let can_edit = user
        .as_ref()
        .is_some_and(|viewer| access::can_modify(viewer, &post));
    let comments = comments
        .into_iter()
        .map(|c| CommentView {
            author: c.author_username,
            text: c.text,
            created: parse_and_format_time(&c.created),
        })
        .collect();

    Ok(Html(PostDetailTemplate {
        nav: Nav::for_user(user.as_ref()),
        post: PostCard::from(post),
        author_posts,
        comments,
        can_edit,
        can_comment: user.is_some(),
    }))
}

async fn post_create_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<PostFormTemplate>> {
    let groups = {
        let conn = state.db.get()?;
        groups::list(&conn)?
    };

    Ok(Html(PostFormTemplate {
        nav: Nav::for_user(Some(&user)),
        is_edit: false,
        action: "/create/".to_string(),
        text: String::new(),
        groups: group_options(groups, None),
        image_url: None,
        errors: PostFormErrors::default(),
    }))
}

async fn post_create(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = PostForm::from_multipart(multipart).await?;
    let groups = {
        let conn = state.db.get()?;
        groups::list(&conn)?
    };

    let (clean, image) = match validate_post_form(&state, &form, &groups).await {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(Html(PostFormTemplate {
                nav: Nav::for_user(Some(&user)),
                is_edit: false,
                action: "/create/".to_string(),
                text: form.text.clone(),
                groups: group_options(groups, form.selected_group()),
                image_url: None,
                errors,
            })
            .into_response());
        }
    };

    let post_id = {
        let conn = state.db.get()?;
        posts::insert(
            &conn,
            &NewPost {
                author_id: user.id,
                group_id: clean.group_id,
                text: &clean.text,
                image: image.as_deref(),
            },
        )?
    };
    tracing::info!("User {} created post {}", user.username, post_id);

    Ok(found(&profile_url(&user.username)))
}

async fn post_edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let (post, groups) = {
        let conn = state.db.get()?;
        let post = posts::find(&conn, id)?.ok_or(AppError::NotFound)?;
        (post, groups::list(&conn)?)
    };

    if !access::can_modify(&user, &post) {
        tracing::warn!("User {} may not edit post {}", user.username, id);
        return Ok(found(&format!("/posts/{id}/")));
    }

    let selected = post.group.as_ref().map(|g| g.id);
    Ok(Html(PostFormTemplate {
        nav: Nav::for_user(Some(&user)),
        is_edit: true,
        action: format!("/posts/{id}/edit/"),
        text: post.text,
        groups: group_options(groups, selected),
        image_url: post.image.as_deref().map(media_url),
        errors: PostFormErrors::default(),
    })
    .into_response())
}

async fn post_edit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let (post, groups) = {
        let conn = state.db.get()?;
        let post = posts::find(&conn, id)?.ok_or(AppError::NotFound)?;
        (post, groups::list(&conn)?)
    };

    if !access::can_modify(&user, &post) {
        tracing::warn!("User {} may not edit post {}", user.username, id);
        return Ok(found(&format!("/posts/{id}/")));
    }

    let form = PostForm::from_multipart(multipart).await?;
    let (clean, image) = match validate_post_form(&state, &form, &groups).await {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(Html(PostFormTemplate {
                nav: Nav::for_user(Some(&user)),
                is_edit: true,
                action: format!("/posts/{id}/edit/"),
                text: form.text.clone(),
                groups: group_options(groups, form.selected_group()),
                image_url: post.image.as_deref().map(media_url),
                errors,
            })
            .into_response());
        }
    };

    // Without a new upload the existing image stays
    let image = image.or(post.image);
    {
        let conn = state.db.get()?;
        posts::update(&conn, id, &clean.text, clean.group_id, image.as_deref())?;
    }
    tracing::info!("User {} edited post {}", user.username, id);

    Ok(found(&format!("/posts/{id}/")))
}

async fn post_delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let conn = state.db.get()?;
    let post = posts::find(&conn, id)?.ok_or(AppError::NotFound)?;

    if !access::can_modify(&user, &post) {
        tracing::warn!("User {} may not delete post {}", user.username, id);
        return Ok(found(&format!("/posts/{id}/")));
    }

    posts::delete(&conn, id)?;
    tracing::info!("User {} deleted post {}", user.username, id);
    Ok(found(&profile_url(&user.username)))
}

/// A bare GET on the comment endpoint just goes back to the post.
async fn comment_redirect(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    ensure_post_exists(&state, id)?;
    Ok(found(&format!("/posts/{id}/")))
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    ensure_post_exists(&state, id)?;

    if let Some(text) = form.clean() {
        let conn = state.db.get()?;
        let comment_id = comments::insert(&conn, id, user.id, text)?;
        tracing::info!("User {} commented {} on post {}", user.username, comment_id, id);
    }

    Ok(found(&format!("/posts/{id}/")))
}

// --- Helpers ---

fn ensure_post_exists(state: &AppState, id: i64) -> AppResult<Post> {
    let conn = state.db.get()?;
    posts::find(&conn, id)?.ok_or(AppError::NotFound)
}

fn group_options(groups: Vec<Group>, selected: Option<i64>) -> Vec<GroupOption> {
    groups
        .into_iter()
        .map(|g| GroupOption {
            selected: Some(g.id) == selected,
            id: g.id,
            title: g.title,
        })
        .collect()
}

/// Validate the post form and store its image, if any.
///
/// The image is only written once the text and group are valid, so a
/// rejected form leaves nothing behind in the media root.
async fn validate_post_form(
    state: &AppState,
    form: &PostForm,
    groups: &[Group],
) -> Result<(crate::forms::CleanPost, Option<String>), PostFormErrors> {
    let clean = form.clean(groups)?;

    let image = match &form.image {
        Some(upload) => match state
            .media
            .save_post_image(&upload.file_name, &upload.data)
            .await
        {
            Ok(path) => Some(path),
            Err(crate::media::MediaError::Io(e)) => {
                tracing::error!("Failed to store upload: {}", e);
                return Err(PostFormErrors {
                    image: vec!["The image could not be saved.".to_string()],
                    ..Default::default()
                });
            }
            Err(e) => {
                return Err(PostFormErrors {
                    image: vec![e.to_string()],
                    ..Default::default()
                });
            }
        },
        None => None,
    };

    Ok((clean, image))
}
