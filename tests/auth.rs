mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn health_returns_ok() {
    let app = common::app().await;

    let res = app.get("/v1/health", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["status"], "ok");
}

#[tokio::test]
async fn signup_returns_profile_and_tokens() {
    let app = common::app().await;

    let res = app
        .post_json(
            "/v1/auth/signup",
            json!({
                "username": "signup_alice",
                "email": "signup_alice@example.com",
                "full_name": "Alice Cook",
                "password": "supersecret1",
            }),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["profile"]["username"], "signup_alice");
    assert_eq!(body["profile"]["email"], "signup_alice@example.com");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refresh_token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn signup_rejects_short_password() {
    let app = common::app().await;

    let res = app
        .post_json(
            "/v1/auth/signup",
            json!({
                "username": "shortpw",
                "email": "shortpw@example.com",
                "full_name": "Short PW",
                "password": "short",
            }),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signup_rejects_duplicate_username() {
    let app = common::app().await;
    let user = app.create_user("dup_name").await;

    let res = app
        .post_json(
            "/v1/auth/signup",
            json!({
                "username": user.username,
                "email": "other_dup@example.com",
                "full_name": "Other Person",
                "password": "supersecret1",
            }),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.error_message(), "Username already taken");
}

#[tokio::test]
async fn login_works_with_email_or_username() {
    let app = common::app().await;
    let user = app.create_user("login_both").await;

    let by_email = app
        .post_json(
            "/v1/auth/login",
            json!({ "identifier": user.email, "password": common::DEFAULT_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(by_email.status, StatusCode::OK);
    assert!(by_email.json()["access_token"].as_str().is_some());

    let by_username = app
        .post_json(
            "/v1/auth/login",
            json!({ "identifier": user.username, "password": common::DEFAULT_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(by_username.status, StatusCode::OK);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = common::app().await;
    let user = app.create_user("login_wrong").await;

    let res = app
        .post_json(
            "/v1/auth/login",
            json!({ "identifier": user.email, "password": "not-the-password" }),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_requires_token() {
    let app = common::app().await;

    let res = app.get("/v1/auth/me", None).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_current_profile() {
    let app = common::app().await;
    let user = app.create_user("me_profile").await;

    let res = app.get("/v1/auth/me", Some(&user.access_token)).await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["username"], user.username);
}

#[tokio::test]
async fn refresh_rotates_and_revokes_old_token() {
    let app = common::app().await;
    let user = app.create_user("refresh_rotate").await;

    let res = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let new_refresh = res.json()["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(new_refresh, user.refresh_token);

    // Old token is revoked after rotation
    let replay = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);

    // New token still works
    let again = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refresh_token": new_refresh }),
            None,
        )
        .await;
    assert_eq!(again.status, StatusCode::OK);
}

#[tokio::test]
async fn revoke_invalidates_refresh_token() {
    let app = common::app().await;
    let user = app.create_user("revoke_token").await;

    let res = app
        .post_json(
            "/v1/auth/revoke",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let refresh = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}
