use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::access;
use crate::auth::{password, reset, session};
use crate::config::AuthConfig;
use crate::db;
use crate::db::users::{self, NewUser};
use crate::error::{AppError, AppResult};
use crate::extractors::{extract_session_token, CurrentUser, MaybeUser};
use crate::forms::{
    LoginForm, PasswordChangeErrors, PasswordChangeForm, PasswordResetForm, SetPasswordErrors,
    SetPasswordForm, SignupErrors, SignupForm,
};
use crate::mail::Email;
use crate::routes::{found, Html, Nav};
use crate::state::AppState;

pub const PASSWORD_CHANGE_DONE_PATH: &str = "/auth/password_change/done/";
pub const PASSWORD_RESET_DONE_PATH: &str = "/auth/password_reset/done/";
pub const PASSWORD_RESET_COMPLETE_PATH: &str = "/auth/reset/done/";
const USERNAME_TAKEN: &str = "A user with that username already exists.";
const LOGIN_FAILED: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

// -- Templates --

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub nav: Nav,
    pub form: SignupForm,
    pub errors: SignupErrors,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "users/password_change_form.html")]
pub struct PasswordChangeTemplate {
    pub nav: Nav,
    pub errors: PasswordChangeErrors,
}

#[derive(Template)]
#[template(path = "users/password_change_done.html")]
pub struct PasswordChangeDoneTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "users/password_reset_form.html")]
pub struct PasswordResetTemplate {
    pub nav: Nav,
    pub email: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "users/password_reset_done.html")]
pub struct PasswordResetDoneTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "users/password_reset_confirm.html")]
pub struct PasswordResetConfirmTemplate {
    pub nav: Nav,
    pub valid_link: bool,
    pub action: String,
    pub errors: SetPasswordErrors,
}

#[derive(Template)]
#[template(path = "users/password_reset_complete.html")]
pub struct PasswordResetCompleteTemplate {
    pub nav: Nav,
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// -- Cookie helpers --

fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    let max_age_secs = auth.session_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        auth.cookie_name, token, max_age_secs
    )
}

fn clear_session_cookie(auth: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        auth.cookie_name
    )
}

/// Run password hashing on the blocking pool.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Blocking task failed: {}", e)))
}

// -- Signup --

/// GET /auth/signup/
pub async fn signup_page(MaybeUser(user): MaybeUser) -> Html<SignupTemplate> {
    Html(SignupTemplate {
        nav: Nav::for_user(user.as_ref()),
        form: SignupForm::default(),
        errors: SignupErrors::default(),
    })
}

/// POST /auth/signup/: create the account, then send the visitor home.
pub async fn signup(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(mut form): Form<SignupForm>,
) -> AppResult<Response> {
    let mut errors = form.validate();
    let username = form.username.trim().to_string();

    if errors.username.is_empty() {
        let conn = state.db.get()?;
        if users::username_taken(&conn, &username)? {
            errors.username.push(USERNAME_TAKEN.to_string());
        }
    }

    if !errors.is_empty() {
        form.password1.clear();
        form.password2.clear();
        return Ok(Html(SignupTemplate {
            nav: Nav::for_user(user.as_ref()),
            form,
            errors,
        })
        .into_response());
    }

    let cost = state.config.auth.bcrypt_cost;
    let plain = form.password1.clone();
    let hash = blocking(move || password::hash_password(&plain, cost))
        .await?
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

    let conn = state.db.get()?;
    let created = users::create(
        &conn,
        &NewUser {
            username: &username,
            first_name: form.first_name.trim(),
            last_name: form.last_name.trim(),
            email: form.email.trim(),
            password_hash: Some(&hash),
        },
    );
    let user_id = match created {
        Ok(id) => id,
        // Another signup claimed the name after the check above
        Err(e) if db::is_unique_violation(&e) => {
            tracing::warn!("Signup raced for username {}", username);
            form.password1.clear();
            form.password2.clear();
            return Ok(Html(SignupTemplate {
                nav: Nav::for_user(user.as_ref()),
                form,
                errors: SignupErrors {
                    username: vec![USERNAME_TAKEN.to_string()],
                    ..Default::default()
                },
            })
            .into_response());
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!("Created user {} ({})", username, user_id);

    Ok(found("/"))
}

// -- Login --

/// GET /auth/login/
pub async fn login_page(
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        nav: Nav::for_user(user.as_ref()),
        username: String::new(),
        next: query.next.unwrap_or_default(),
        error: None,
    })
}

/// POST /auth/login/: on a good password start a session and follow `next`.
pub async fn login(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let username = form.username.trim().to_string();
    let account = {
        let conn = state.db.get()?;
        users::find_by_username(&conn, &username)?
    };

    let verified = match &account {
        Some(account) => {
            let plain = form.password.clone();
            let hash = account.password_hash.clone();
            blocking(move || password::verify_password(&plain, hash.as_deref())).await?
        }
        None => false,
    };

    let Some(account) = account.filter(|_| verified) else {
        tracing::warn!("Failed login for {}", username);
        return Ok(Html(LoginTemplate {
            nav: Nav::for_user(user.as_ref()),
            username,
            next: form.next.unwrap_or_default(),
            error: Some(LOGIN_FAILED.to_string()),
        })
        .into_response());
    };

    let token = {
        let conn = state.db.get()?;
        let pruned = session::delete_expired(&conn)?;
        if pruned > 0 {
            tracing::debug!("Pruned {} expired session(s)", pruned);
        }
        session::create_session(&conn, account.id, state.config.auth.session_hours)?
    };
    tracing::info!("User {} logged in", account.username);

    let mut response = found(access::safe_next(form.next.as_deref()));
    let cookie = session_cookie(&state.config.auth, &token)
        .parse::<HeaderValue>()
        .map_err(|e| AppError::Internal(format!("Invalid cookie header: {}", e)))?;
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

// -- Logout --

/// GET|POST /auth/logout/: end the session and show the goodbye page.
pub async fn logout(
    State(state): State<AppState>,
    request: axum::http::Request<axum::body::Body>,
) -> AppResult<Response> {
    let (parts, _body) = request.into_parts();
    let auth = &state.config.auth;

    if let Some(token) = extract_session_token(&parts, &auth.cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie(auth))]),
        Html(LoggedOutTemplate {
            nav: Nav::anonymous(),
        }),
    )
        .into_response())
}

// -- Password change --

/// GET /auth/password_change/
pub async fn password_change_page(user: CurrentUser) -> Html<PasswordChangeTemplate> {
    Html(PasswordChangeTemplate {
        nav: Nav::for_user(Some(&user)),
        errors: PasswordChangeErrors::default(),
    })
}

/// POST /auth/password_change/. Other sessions of the user are signed out.
pub async fn password_change(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<PasswordChangeForm>,
) -> AppResult<Response> {
    let mut errors = form.validate();

    let account = {
        let conn = state.db.get()?;
        users::find_by_id(&conn, user.id)?.ok_or(AppError::NotFound)?
    };

    if errors.old_password.is_empty() {
        let plain = form.old_password.clone();
        let hash = account.password_hash.clone();
        let ok = blocking(move || password::verify_password(&plain, hash.as_deref())).await?;
        if !ok {
            errors.old_password.push(
                "Your old password was entered incorrectly. Please enter it again.".to_string(),
            );
        }
    }

    if !errors.is_empty() {
        return Ok(Html(PasswordChangeTemplate {
            nav: Nav::for_user(Some(&user)),
            errors,
        })
        .into_response());
    }

    let cost = state.config.auth.bcrypt_cost;
    let plain = form.new_password1.clone();
    let hash = blocking(move || password::hash_password(&plain, cost))
        .await?
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

    let conn = state.db.get()?;
    users::set_password_hash(&conn, user.id, &hash)?;
    let dropped = session::delete_other_sessions(&conn, user.id, &user.token)?;
    reset::delete_for_user(&conn, user.id)?;
    tracing::info!(
        "User {} changed password, {} other session(s) ended",
        user.username,
        dropped
    );

    Ok(found(PASSWORD_CHANGE_DONE_PATH))
}

/// GET /auth/password_change/done/
pub async fn password_change_done(user: CurrentUser) -> Html<PasswordChangeDoneTemplate> {
    Html(PasswordChangeDoneTemplate {
        nav: Nav::for_user(Some(&user)),
    })
}

// -- Password reset --

/// GET /auth/password_reset/
pub async fn password_reset_page(MaybeUser(user): MaybeUser) -> Html<PasswordResetTemplate> {
    Html(PasswordResetTemplate {
        nav: Nav::for_user(user.as_ref()),
        email: String::new(),
        errors: Vec::new(),
    })
}

/// POST /auth/password_reset/: mail a reset link to every account with
/// the address. The response is the same whether or not one exists.
pub async fn password_reset(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
    Form(form): Form<PasswordResetForm>,
) -> AppResult<Response> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(Html(PasswordResetTemplate {
            nav: Nav::for_user(user.as_ref()),
            email: form.email,
            errors,
        })
        .into_response());
    }

    let domain = request_domain(&headers);
    let email = form.email.trim();
    let mut outgoing = Vec::new();
    {
        let conn = state.db.get()?;
        for account in users::find_by_email(&conn, email)? {
            if account.password_hash.is_none() {
                continue;
            }
            let token = reset::create_reset(&conn, account.id, state.config.auth.reset_hours)?;
            let link = format!("http://{}/auth/reset/{}/{}/", domain, account.id, token);
            outgoing.push(reset_email(&account.email, &account.username, &domain, &link));
        }
    }

    if outgoing.is_empty() {
        tracing::info!("Password reset requested for unknown address");
    }
    for message in &outgoing {
        state.outbox.send(message).await?;
    }

    Ok(found(PASSWORD_RESET_DONE_PATH))
}

/// GET /auth/password_reset/done/
pub async fn password_reset_done(MaybeUser(user): MaybeUser) -> Html<PasswordResetDoneTemplate> {
    Html(PasswordResetDoneTemplate {
        nav: Nav::for_user(user.as_ref()),
    })
}

/// GET /auth/reset/{uid}/{token}/
pub async fn password_reset_confirm_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path((uid, token)): Path<(String, String)>,
) -> AppResult<Html<PasswordResetConfirmTemplate>> {
    let valid_link = {
        let conn = state.db.get()?;
        reset_link_user(&conn, &uid, &token)?.is_some()
    };
    Ok(Html(PasswordResetConfirmTemplate {
        nav: Nav::for_user(user.as_ref()),
        valid_link,
        action: format!("/auth/reset/{}/{}/", uid, token),
        errors: SetPasswordErrors::default(),
    }))
}

/// POST /auth/reset/{uid}/{token}/: set the new password, burn the link and
/// sign the account out everywhere.
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path((uid, token)): Path<(String, String)>,
    Form(form): Form<SetPasswordForm>,
) -> AppResult<Response> {
    let page = |valid_link: bool, errors: SetPasswordErrors| {
        Html(PasswordResetConfirmTemplate {
            nav: Nav::for_user(user.as_ref()),
            valid_link,
            action: format!("/auth/reset/{}/{}/", uid, token),
            errors,
        })
        .into_response()
    };

    let user_id = {
        let conn = state.db.get()?;
        reset_link_user(&conn, &uid, &token)?
    };
    let Some(user_id) = user_id else {
        return Ok(page(false, SetPasswordErrors::default()));
    };

    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(page(true, errors));
    }

    let cost = state.config.auth.bcrypt_cost;
    let plain = form.new_password1.clone();
    let hash = blocking(move || password::hash_password(&plain, cost))
        .await?
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

    let conn = state.db.get()?;
    if !reset::consume(&conn, user_id, &token)? {
        return Ok(page(false, SetPasswordErrors::default()));
    }
    users::set_password_hash(&conn, user_id, &hash)?;
    let dropped = session::delete_user_sessions(&conn, user_id)?;
    tracing::info!(
        "Password reset for user {}, {} session(s) ended",
        user_id,
        dropped
    );

    Ok(found(PASSWORD_RESET_COMPLETE_PATH))
}

/// GET /auth/reset/done/
pub async fn password_reset_complete(
    MaybeUser(user): MaybeUser,
) -> Html<PasswordResetCompleteTemplate> {
    Html(PasswordResetCompleteTemplate {
        nav: Nav::for_user(user.as_ref()),
    })
}

/// User id behind a reset link, if the link is still good.
fn reset_link_user(
    conn: &rusqlite::Connection,
    uid: &str,
    token: &str,
) -> rusqlite::Result<Option<i64>> {
    let Ok(user_id) = uid.parse::<i64>() else {
        return Ok(None);
    };
    Ok(reset::is_valid(conn, user_id, token)?.then_some(user_id))
}

/// Host the request was addressed to, for absolute links in mail.
fn request_domain(headers: &HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|host| {
            !host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
        })
        .unwrap_or("localhost")
        .to_string()
}

fn reset_email(to: &str, username: &str, domain: &str, link: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Password reset on {}", domain),
        body: format!(
            "You're receiving this email because you requested a password reset \
             for your user account at {domain}.\n\n\
             Please go to the following page and choose a new password:\n\n\
             {link}\n\n\
             Your username, in case you've forgotten: {username}\n\n\
             Thanks for using our site!\n\n\
             The {domain} team"
        ),
    }
}
