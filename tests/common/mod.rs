//! Shared helpers: a server on an ephemeral port backed by a temp database.
#![allow(dead_code)]

use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::redirect::Policy;
use reqwest::Client;
use tempfile::TempDir;

use yatube::auth::{password, session};
use yatube::config::Config;
use yatube::db::{self, groups, posts, users};
use yatube::state::AppState;

pub const PASSWORD: &str = "bkI83bdn8F";

/// 2x1 pixel GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

pub struct TestApp {
    pub base: String,
    pub state: AppState,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.database.path = Some(tmp.path().join("test.db"));
        config.storage.path = Some(tmp.path().join("media"));
        config.mail.outbox = Some(tmp.path().join("sent_emails"));
        config.auth.bcrypt_cost = 4;

        let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let state = AppState::new(pool, config);
        let app = yatube::routes::build_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestApp {
            base: format!("http://{}", addr),
            state,
            _tmp: tmp,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }

    /// User whose password is `PASSWORD`.
    pub fn user(&self, username: &str) -> i64 {
        let hash = password::hash_password(PASSWORD, 4).unwrap();
        users::create(
            &self.conn(),
            &users::NewUser {
                username,
                first_name: "",
                last_name: "",
                email: "",
                password_hash: Some(&hash),
            },
        )
        .unwrap()
    }

    pub fn group(&self, slug: &str) -> i64 {
        groups::create(&self.conn(), &format!("Group {slug}"), slug, "A test group").unwrap()
    }

    pub fn post(&self, author_id: i64, group_id: Option<i64>, text: &str) -> i64 {
        posts::insert(
            &self.conn(),
            &posts::NewPost {
                author_id,
                group_id,
                text,
                image: None,
            },
        )
        .unwrap()
    }

    /// Client that never follows redirects and carries no session.
    pub fn anonymous(&self) -> Client {
        Client::builder().redirect(Policy::none()).build().unwrap()
    }

    /// Client already signed in as `user_id`.
    pub fn client_for(&self, user_id: i64) -> Client {
        let token =
            session::create_session(&self.conn(), user_id, self.state.config.auth.session_hours)
                .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", self.state.config.auth.cookie_name, token))
                .unwrap(),
        );
        Client::builder()
            .redirect(Policy::none())
            .default_headers(headers)
            .build()
            .unwrap()
    }
}

/// Bodies of every message written to the outbox.
pub fn sent_emails(app: &TestApp) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(app.state.outbox.dir()) else {
        return Vec::new();
    };
    entries
        .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
        .collect()
}

/// Number of posts rendered on a feed page.
pub fn posts_on_page(body: &str) -> usize {
    body.matches(r#"<article class="post">"#).count()
}

pub fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
