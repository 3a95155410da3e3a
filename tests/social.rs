mod common;

use axum::http::StatusCode;
use serde_json::json;
use sqlx::Row;

use uuid::Uuid;

use marmite::app::engagement::{EngagementService, SocialStrategy};

fn manual_service(app: &common::TestApp) -> EngagementService {
    EngagementService::new(
        app.state.db.clone(),
        app.state.cache.clone(),
        SocialStrategy::Manual,
    )
}

// ---------------------------------------------------------------------------
// Recipe likes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recipe_like_double_toggle_round_trips() {
    let app = common::app().await;
    let owner = app.create_user("like_rt_owner").await;
    let fan = app.create_user("like_rt_fan").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;
    let path = format!("/v1/recipes/{}/like", recipe_id);

    let first = app.post_json(&path, json!({}), Some(&fan.access_token)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json(), json!({ "liked": true, "like_count": 1 }));

    let second = app.post_json(&path, json!({}), Some(&fan.access_token)).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.json(), json!({ "liked": false, "like_count": 0 }));
}

#[tokio::test]
async fn recipe_like_counts_are_per_user() {
    let app = common::app().await;
    let owner = app.create_user("like_multi_owner").await;
    let alice = app.create_user("like_multi_alice").await;
    let bob = app.create_user("like_multi_bob").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;
    let path = format!("/v1/recipes/{}/like", recipe_id);

    let first = app.post_json(&path, json!({}), Some(&alice.access_token)).await;
    assert_eq!(first.json()["like_count"], 1);

    let second = app.post_json(&path, json!({}), Some(&bob.access_token)).await;
    assert_eq!(second.json(), json!({ "liked": true, "like_count": 2 }));

    // Alice unliking leaves Bob's like intact
    let third = app.post_json(&path, json!({}), Some(&alice.access_token)).await;
    assert_eq!(third.json(), json!({ "liked": false, "like_count": 1 }));

    let stats = app
        .get(
            &format!("/v1/recipes/{}/stats", recipe_id),
            Some(&bob.access_token),
        )
        .await;
    assert_eq!(stats.status, StatusCode::OK);
    let body = stats.json();
    assert_eq!(body["like_count"], 1);
    assert_eq!(body["user_has_liked"], true);
}

#[tokio::test]
async fn liking_requires_auth_and_an_existing_recipe() {
    let app = common::app().await;
    let owner = app.create_user("like_guard_owner").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;

    let anon = app
        .post_json(&format!("/v1/recipes/{}/like", recipe_id), json!({}), None)
        .await;
    assert_eq!(anon.status, StatusCode::UNAUTHORIZED);

    let missing = app
        .post_json(
            "/v1/recipes/00000000-0000-0000-0000-000000000000/like",
            json!({}),
            Some(&owner.access_token),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_for_missing_recipe_is_not_found() {
    let app = common::app().await;

    let res = app
        .get(
            "/v1/recipes/00000000-0000-0000-0000-000000000000/stats",
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Manual strategy (SQL routines bypassed)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manual_toggle_matches_function_semantics() {
    let app = common::app().await;
    let owner = app.create_user("manual_owner").await;
    let fan = app.create_user("manual_fan").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;
    let service = manual_service(app);

    let first = service
        .toggle_recipe_like(recipe_id, fan.id)
        .await
        .unwrap()
        .unwrap();
    assert!(first.liked);
    assert_eq!(first.like_count, 1);

    let second = service
        .toggle_recipe_like(recipe_id, fan.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!second.liked);
    assert_eq!(second.like_count, 0);
}

#[tokio::test]
async fn manual_toggle_recovers_from_seeded_duplicate() {
    let app = common::app().await;
    let owner = app.create_user("manual_race_owner").await;
    let fan = app.create_user("manual_race_fan").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;
    let service = manual_service(app);

    // Row inserted behind the service's back, as a concurrent toggle would
    sqlx::query("INSERT INTO recipe_likes (recipe_id, user_id) VALUES ($1, $2)")
        .bind(recipe_id)
        .bind(fan.id)
        .execute(app.pool())
        .await
        .unwrap();

    let toggle = service
        .toggle_recipe_like(recipe_id, fan.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!toggle.liked);
    assert_eq!(toggle.like_count, 0);
}

#[tokio::test]
async fn concurrent_manual_toggles_never_duplicate_rows() {
    let app = common::app().await;
    let owner = app.create_user("manual_conc_owner").await;
    let fan = app.create_user("manual_conc_fan").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;
    let service = manual_service(app);

    let (a, b) = tokio::join!(
        service.toggle_recipe_like(recipe_id, fan.id),
        service.toggle_recipe_like(recipe_id, fan.id),
    );
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    // Whatever the interleaving, the unique constraint holds: 0 or 1 rows
    let rows: i64 =
        sqlx::query_scalar("SELECT count(*) FROM recipe_likes WHERE recipe_id = $1")
            .bind(recipe_id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert!(rows == 0 || rows == 1, "got {} like rows", rows);
}

#[tokio::test]
async fn manual_stats_match_function_stats() {
    let app = common::app().await;
    let owner = app.create_user("manual_stats_owner").await;
    let fan = app.create_user("manual_stats_fan").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;
    app.create_comment_for(recipe_id, fan.id, "nice").await;

    let service = manual_service(app);
    service
        .toggle_recipe_like(recipe_id, fan.id)
        .await
        .unwrap()
        .unwrap();

    let manual = service
        .recipe_stats(recipe_id, Some(fan.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(manual.like_count, 1);
    assert_eq!(manual.comment_count, 1);
    assert!(manual.user_has_liked);

    // The installed SQL routine agrees with the composed reads
    let via_function = app
        .get(
            &format!("/v1/recipes/{}/stats", recipe_id),
            Some(&fan.access_token),
        )
        .await;
    let body = via_function.json();
    assert_eq!(body["like_count"], 1);
    assert_eq!(body["comment_count"], 1);
    assert_eq!(body["user_has_liked"], true);
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_comment_returns_author_fields() {
    let app = common::app().await;
    let owner = app.create_user("cmt_create_owner").await;
    let commenter = app.create_user("cmt_create_user").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;

    let res = app
        .post_json(
            &format!("/v1/recipes/{}/comments", recipe_id),
            json!({ "content": "  Tried it, loved it  " }),
            Some(&commenter.access_token),
        )
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    let body = res.json();
    assert_eq!(body["content"], "Tried it, loved it");
    assert_eq!(body["author_username"], commenter.username);
    assert_eq!(body["like_count"], 0);
    assert_eq!(body["user_has_liked"], false);
}

#[tokio::test]
async fn comment_length_bounds_are_enforced() {
    let app = common::app().await;
    let owner = app.create_user("cmt_len_owner").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;
    let path = format!("/v1/recipes/{}/comments", recipe_id);

    let at_limit = app
        .post_json(
            &path,
            json!({ "content": "x".repeat(1000) }),
            Some(&owner.access_token),
        )
        .await;
    assert_eq!(at_limit.status, StatusCode::CREATED);

    let over_limit = app
        .post_json(
            &path,
            json!({ "content": "x".repeat(1001) }),
            Some(&owner.access_token),
        )
        .await;
    assert_eq!(over_limit.status, StatusCode::BAD_REQUEST);

    let whitespace = app
        .post_json(&path, json!({ "content": "   \n  " }), Some(&owner.access_token))
        .await;
    assert_eq!(whitespace.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn commenting_on_missing_recipe_is_not_found() {
    let app = common::app().await;
    let user = app.create_user("cmt_missing").await;

    let res = app
        .post_json(
            "/v1/recipes/00000000-0000-0000-0000-000000000000/comments",
            json!({ "content": "hello?" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_list_oldest_first_with_degraded_false() {
    let app = common::app().await;
    let owner = app.create_user("cmt_list_owner").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;
    app.create_comment_for(recipe_id, owner.id, "first").await;
    app.create_comment_for(recipe_id, owner.id, "second").await;

    let res = app
        .get(&format!("/v1/recipes/{}/comments", recipe_id), None)
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["degraded"], false);
    let comments = body["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["content"], "first");
    assert_eq!(comments[1]["content"], "second");
    assert_eq!(comments[0]["user_has_liked"], false);
}

#[tokio::test]
async fn comment_feed_degrades_when_the_store_fails() {
    let app = common::app().await;
    // A database without the comment tables makes every read fail
    let service = EngagementService::new(
        app.bare_database().await,
        app.state.cache.clone(),
        SocialStrategy::Manual,
    );

    let feed = service.list_comments_lenient(Uuid::new_v4(), None).await;

    assert!(feed.comments.is_empty());
    assert!(feed.degraded, "a failed fetch must be marked, not silent");
}

#[tokio::test]
async fn only_author_can_edit_comment() {
    let app = common::app().await;
    let owner = app.create_user("cmt_edit_owner").await;
    let author = app.create_user("cmt_edit_author").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;
    let comment_id = app.create_comment_for(recipe_id, author.id, "original").await;

    // Even the recipe owner cannot edit someone else's comment
    let forbidden = app
        .patch_json(
            &format!("/v1/comments/{}", comment_id),
            json!({ "content": "defaced" }),
            Some(&owner.access_token),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let row = sqlx::query("SELECT content, created_at, updated_at FROM recipe_comments WHERE id = $1")
        .bind(comment_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("content"), "original");
    // A rejected edit must not look like an edit
    assert_eq!(
        row.get::<time::OffsetDateTime, _>("updated_at"),
        row.get::<time::OffsetDateTime, _>("created_at"),
    );

    let allowed = app
        .patch_json(
            &format!("/v1/comments/{}", comment_id),
            json!({ "content": "revised" }),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(allowed.status, StatusCode::OK);
    assert_eq!(allowed.json()["content"], "revised");
}

#[tokio::test]
async fn editing_bumps_updated_at_but_not_created_at() {
    let app = common::app().await;
    let author = app.create_user("cmt_edited_at").await;
    let recipe_id = app.create_recipe_for_user(author.id).await;
    let comment_id = app.create_comment_for(recipe_id, author.id, "v1").await;

    let res = app
        .patch_json(
            &format!("/v1/comments/{}", comment_id),
            json!({ "content": "v2" }),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();

    let created_at = body["created_at"].as_str().unwrap();
    let updated_at = body["updated_at"].as_str().unwrap();
    // RFC 3339 timestamps compare chronologically as strings at equal precision;
    // parse to be safe
    let created =
        time::OffsetDateTime::parse(created_at, &time::format_description::well_known::Rfc3339)
            .unwrap();
    let updated =
        time::OffsetDateTime::parse(updated_at, &time::format_description::well_known::Rfc3339)
            .unwrap();
    assert!(updated > created, "edit must move updated_at past created_at");
}

#[tokio::test]
async fn only_author_can_delete_comment_and_likes_cascade() {
    let app = common::app().await;
    let owner = app.create_user("cmt_del_owner").await;
    let author = app.create_user("cmt_del_author").await;
    let recipe_id = app.create_recipe_for_user(owner.id).await;
    let comment_id = app.create_comment_for(recipe_id, author.id, "ephemeral").await;

    app.post_json(
        &format!("/v1/comments/{}/like", comment_id),
        json!({}),
        Some(&owner.access_token),
    )
    .await;

    let forbidden = app
        .delete(
            &format!("/v1/comments/{}", comment_id),
            Some(&owner.access_token),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let deleted = app
        .delete(
            &format!("/v1/comments/{}", comment_id),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let likes: i64 =
        sqlx::query_scalar("SELECT count(*) FROM comment_likes WHERE comment_id = $1")
            .bind(comment_id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(likes, 0);

    let again = app
        .delete(
            &format!("/v1/comments/{}", comment_id),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Comment likes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn comment_like_full_scenario() {
    let app = common::app().await;
    let author = app.create_user("clike_author").await;
    let reader = app.create_user("clike_reader").await;
    let recipe_id = app.create_recipe_for_user(author.id).await;
    let comment_id = app.create_comment_for(recipe_id, author.id, "like me").await;
    let like_path = format!("/v1/comments/{}/like", comment_id);
    let list_path = format!("/v1/recipes/{}/comments", recipe_id);

    // Fresh comment: no likes, reader has not liked
    let before = app.get(&list_path, Some(&reader.access_token)).await;
    let body = before.json();
    assert_eq!(body["comments"][0]["like_count"], 0);
    assert_eq!(body["comments"][0]["user_has_liked"], false);

    let liked = app
        .post_json(&like_path, json!({}), Some(&reader.access_token))
        .await;
    assert_eq!(liked.status, StatusCode::OK);
    assert_eq!(liked.json(), json!({ "liked": true, "like_count": 1 }));

    // Reader sees their like reflected; the author does not inherit it
    let as_reader = app.get(&list_path, Some(&reader.access_token)).await;
    let body = as_reader.json();
    assert_eq!(body["comments"][0]["like_count"], 1);
    assert_eq!(body["comments"][0]["user_has_liked"], true);

    let as_author = app.get(&list_path, Some(&author.access_token)).await;
    let body = as_author.json();
    assert_eq!(body["comments"][0]["like_count"], 1);
    assert_eq!(body["comments"][0]["user_has_liked"], false);

    let unliked = app
        .post_json(&like_path, json!({}), Some(&reader.access_token))
        .await;
    assert_eq!(unliked.json(), json!({ "liked": false, "like_count": 0 }));
}

#[tokio::test]
async fn liking_missing_comment_is_not_found() {
    let app = common::app().await;
    let user = app.create_user("clike_missing").await;

    let res = app
        .post_json(
            "/v1/comments/00000000-0000-0000-0000-000000000000/like",
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
