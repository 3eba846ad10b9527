mod common;

use common::{location, sent_emails, TestApp, PASSWORD};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};

use yatube::auth::password;
use yatube::db::users;

fn cookie_client() -> Client {
    Client::builder()
        .redirect(Policy::none())
        .cookie_store(true)
        .build()
        .unwrap()
}

#[tokio::test]
async fn signup_creates_account() {
    let app = TestApp::spawn().await;
    let client = app.anonymous();

    let response = client
        .post(app.url("/auth/signup/"))
        .form(&[
            ("first_name", "Leo"),
            ("last_name", "Tolstoy"),
            ("username", "leo"),
            ("email", "leo@example.com"),
            ("password1", PASSWORD),
            ("password2", PASSWORD),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");

    let user = users::find_by_username(&app.conn(), "leo").unwrap().unwrap();
    assert_eq!(user.display_name(), "Leo Tolstoy");
    assert!(password::verify_password(PASSWORD, user.password_hash.as_deref()));
}

#[tokio::test]
async fn signup_rejects_taken_username() {
    let app = TestApp::spawn().await;
    app.user("leo");
    let client = app.anonymous();

    let response = client
        .post(app.url("/auth/signup/"))
        .form(&[
            ("username", "leo"),
            ("password1", PASSWORD),
            ("password2", PASSWORD),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("A user with that username already exists."));
    let users: i64 = app
        .conn()
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(users, 1);
}

#[tokio::test]
async fn login_follows_next_and_logout_ends_session() {
    let app = TestApp::spawn().await;
    app.user("leo");
    let client = cookie_client();

    let response = client
        .post(app.url("/auth/login/"))
        .form(&[
            ("username", "leo"),
            ("password", PASSWORD),
            ("next", "/create/"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/create/");

    let create = client.get(app.url("/create/")).send().await.unwrap();
    assert_eq!(create.status(), StatusCode::OK);

    let logout = client.get(app.url("/auth/logout/")).send().await.unwrap();
    assert_eq!(logout.status(), StatusCode::OK);
    assert!(logout.text().await.unwrap().contains("You have logged out"));

    let create = client.get(app.url("/create/")).send().await.unwrap();
    assert_eq!(create.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn login_ignores_offsite_next() {
    let app = TestApp::spawn().await;
    app.user("leo");
    let client = cookie_client();

    let response = client
        .post(app.url("/auth/login/"))
        .form(&[
            ("username", "leo"),
            ("password", PASSWORD),
            ("next", "https://evil.example/"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = TestApp::spawn().await;
    app.user("leo");
    let client = cookie_client();

    let response = client
        .post(app.url("/auth/login/"))
        .form(&[("username", "leo"), ("password", "wrong-password")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("Please enter a correct username and password."));

    let create = client.get(app.url("/create/")).send().await.unwrap();
    assert_eq!(create.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn password_change_updates_hash() {
    let app = TestApp::spawn().await;
    let leo = app.user("leo");
    let client = app.client_for(leo);

    let response = client
        .post(app.url("/auth/password_change/"))
        .form(&[
            ("old_password", PASSWORD),
            ("new_password1", "n3w-Passw0rd"),
            ("new_password2", "n3w-Passw0rd"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/auth/password_change/done/");

    let done = client
        .get(app.url("/auth/password_change/done/"))
        .send()
        .await
        .unwrap();
    assert_eq!(done.status(), StatusCode::OK);

    let user = users::find_by_id(&app.conn(), leo).unwrap().unwrap();
    assert!(password::verify_password("n3w-Passw0rd", user.password_hash.as_deref()));
    assert!(!password::verify_password(PASSWORD, user.password_hash.as_deref()));
}

#[tokio::test]
async fn password_change_checks_old_password() {
    let app = TestApp::spawn().await;
    let leo = app.user("leo");
    let client = app.client_for(leo);

    let response = client
        .post(app.url("/auth/password_change/"))
        .form(&[
            ("old_password", "not-my-password"),
            ("new_password1", "n3w-Passw0rd"),
            ("new_password2", "n3w-Passw0rd"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("Your old password was entered incorrectly."));
}

fn set_email(app: &TestApp, user_id: i64, email: &str) {
    app.conn()
        .execute(
            "UPDATE users SET email = ?1 WHERE id = ?2",
            rusqlite::params![email, user_id],
        )
        .unwrap();
}

/// Path of the reset link in a mailed message.
fn reset_path(app: &TestApp, message: &str) -> String {
    let link = message
        .lines()
        .find(|line| line.starts_with("http://"))
        .expect("no link in message");
    link.trim_start_matches(&app.base).to_string()
}

#[tokio::test]
async fn password_reset_by_email() {
    let app = TestApp::spawn().await;
    let leo = app.user("leo");
    set_email(&app, leo, "leo@example.com");
    let signed_in = app.client_for(leo);
    let client = app.anonymous();

    let page = client
        .get(app.url("/auth/password_reset/"))
        .send()
        .await
        .unwrap();
    assert_eq!(page.status(), StatusCode::OK);

    let response = client
        .post(app.url("/auth/password_reset/"))
        .form(&[("email", "LEO@example.com")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/auth/password_reset/done/");

    let sent = sent_emails(&app);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("To: leo@example.com"));
    assert!(sent[0].contains("Your username, in case you've forgotten: leo"));
    let reset = reset_path(&app, &sent[0]);
    assert!(reset.starts_with(&format!("/auth/reset/{leo}/")));

    let form = client.get(app.url(&reset)).send().await.unwrap();
    assert_eq!(form.status(), StatusCode::OK);
    assert!(form.text().await.unwrap().contains("Enter new password"));

    // A weak password leaves the link usable
    let response = client
        .post(app.url(&reset))
        .form(&[("new_password1", "12345678"), ("new_password2", "12345678")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("This password is entirely numeric."));

    let response = client
        .post(app.url(&reset))
        .form(&[
            ("new_password1", "n3w-Passw0rd"),
            ("new_password2", "n3w-Passw0rd"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/auth/reset/done/");

    let user = users::find_by_id(&app.conn(), leo).unwrap().unwrap();
    assert!(password::verify_password("n3w-Passw0rd", user.password_hash.as_deref()));

    // Sessions from before the reset are gone
    let create = signed_in.get(app.url("/create/")).send().await.unwrap();
    assert_eq!(create.status(), StatusCode::FOUND);

    let done = client.get(app.url("/auth/reset/done/")).send().await.unwrap();
    assert_eq!(done.status(), StatusCode::OK);

    // The link works once
    let reused = client.get(app.url(&reset)).send().await.unwrap();
    assert!(reused
        .text()
        .await
        .unwrap()
        .contains("The password reset link was invalid"));
    let response = client
        .post(app.url(&reset))
        .form(&[
            ("new_password1", "an0ther-Passw0rd"),
            ("new_password2", "an0ther-Passw0rd"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user = users::find_by_id(&app.conn(), leo).unwrap().unwrap();
    assert!(password::verify_password("n3w-Passw0rd", user.password_hash.as_deref()));
}

#[tokio::test]
async fn password_reset_reveals_nothing_about_unknown_addresses() {
    let app = TestApp::spawn().await;
    app.user("leo");
    let client = app.anonymous();

    let response = client
        .post(app.url("/auth/password_reset/"))
        .form(&[("email", "ghost@example.com")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/auth/password_reset/done/");
    assert!(sent_emails(&app).is_empty());

    let response = client
        .post(app.url("/auth/password_reset/"))
        .form(&[("email", "not-an-email")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("Enter a valid email address."));
}

#[tokio::test]
async fn forged_reset_links_are_rejected() {
    let app = TestApp::spawn().await;
    let leo = app.user("leo");
    let client = app.anonymous();

    for path in [
        format!("/auth/reset/{leo}/{}/", "0".repeat(64)),
        "/auth/reset/not-a-number/abc/".to_string(),
    ] {
        let response = client.get(app.url(&path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {path}");
        assert!(response
            .text()
            .await
            .unwrap()
            .contains("The password reset link was invalid"));

        let response = client
            .post(app.url(&path))
            .form(&[
                ("new_password1", "n3w-Passw0rd"),
                ("new_password2", "n3w-Passw0rd"),
            ])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "POST {path}");
    }

    let user = users::find_by_id(&app.conn(), leo).unwrap().unwrap();
    assert!(password::verify_password(PASSWORD, user.password_hash.as_deref()));
}
