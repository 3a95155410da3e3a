mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn public_profile_omits_email() {
    let app = common::app().await;
    let user = app.create_user("pub_profile").await;

    let res = app.get(&format!("/v1/profiles/{}", user.id), None).await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["username"], user.username);
    assert!(body.get("email").is_none());
}

#[tokio::test]
async fn missing_profile_is_not_found() {
    let app = common::app().await;

    let res = app
        .get(
            "/v1/profiles/00000000-0000-0000-0000-000000000000",
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_can_update_profile() {
    let app = common::app().await;
    let user = app.create_user("prof_update").await;

    let res = app
        .patch_json(
            &format!("/v1/profiles/{}", user.id),
            json!({ "full_name": "Updated Name", "bio": "I cook things" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["full_name"], "Updated Name");
    assert_eq!(body["bio"], "I cook things");
}

#[tokio::test]
async fn update_requires_ownership() {
    let app = common::app().await;
    let owner = app.create_user("prof_owner").await;
    let other = app.create_user("prof_other").await;

    let res = app
        .patch_json(
            &format!("/v1/profiles/{}", owner.id),
            json!({ "full_name": "Hijacked" }),
            Some(&other.access_token),
        )
        .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn blank_username_is_ignored_on_update() {
    let app = common::app().await;
    let user = app.create_user("prof_blank").await;

    let res = app
        .patch_json(
            &format!("/v1/profiles/{}", user.id),
            json!({ "username": "   ", "bio": "kept" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["username"], user.username);
    assert_eq!(body["bio"], "kept");
}

#[tokio::test]
async fn empty_bio_clears_the_field() {
    let app = common::app().await;
    let user = app.create_user("prof_bio_clear").await;

    let set = app
        .patch_json(
            &format!("/v1/profiles/{}", user.id),
            json!({ "bio": "temporary" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(set.status, StatusCode::OK);

    let clear = app
        .patch_json(
            &format!("/v1/profiles/{}", user.id),
            json!({ "bio": "" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(clear.status, StatusCode::OK);
    assert!(clear.json()["bio"].is_null());
}

#[tokio::test]
async fn username_conflict_is_reported() {
    let app = common::app().await;
    let taken = app.create_user("prof_taken").await;
    let user = app.create_user("prof_wants").await;

    let res = app
        .patch_json(
            &format!("/v1/profiles/{}", user.id),
            json!({ "username": taken.username }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(res.status, StatusCode::CONFLICT);
}
