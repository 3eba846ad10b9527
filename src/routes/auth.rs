use axum::routing::get;
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/auth/signup/",
            get(handlers::signup_page).post(handlers::signup),
        )
        .route("/auth/login/", get(handlers::login_page).post(handlers::login))
        .route("/auth/logout/", get(handlers::logout).post(handlers::logout))
        .route(
            "/auth/password_change/",
            get(handlers::password_change_page).post(handlers::password_change),
        )
        .route(
            "/auth/password_change/done/",
            get(handlers::password_change_done),
        )
        .route(
            "/auth/password_reset/",
            get(handlers::password_reset_page).post(handlers::password_reset),
        )
        .route(
            "/auth/password_reset/done/",
            get(handlers::password_reset_done),
        )
        .route(
            "/auth/reset/{uid}/{token}/",
            get(handlers::password_reset_confirm_page).post(handlers::password_reset_confirm),
        )
        .route("/auth/reset/done/", get(handlers::password_reset_complete))
}
