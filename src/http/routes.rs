use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/revoke", post(handlers::revoke_token))
        .route("/auth/me", get(handlers::get_current_profile))
}

pub fn profiles() -> Router<AppState> {
    Router::new()
        .route("/profiles/:id", get(handlers::get_profile))
        .route("/profiles/:id", patch(handlers::update_profile))
        .route("/profiles/:id/recipes", get(handlers::list_user_recipes))
}

pub fn recipes() -> Router<AppState> {
    Router::new()
        .route("/recipes", post(handlers::create_recipe))
        .route("/recipes", get(handlers::list_recipes))
        .route("/recipes/:id", get(handlers::get_recipe))
        .route("/recipes/:id", patch(handlers::update_recipe))
        .route("/recipes/:id", delete(handlers::delete_recipe))
        .route("/recipes/:id/stats", get(handlers::get_recipe_stats))
}

pub fn social() -> Router<AppState> {
    Router::new()
        .route("/recipes/:id/like", post(handlers::toggle_recipe_like))
        .route("/recipes/:id/comments", post(handlers::create_comment))
        .route("/recipes/:id/comments", get(handlers::list_comments))
        .route("/comments/:id", patch(handlers::update_comment))
        .route("/comments/:id", delete(handlers::delete_comment))
        .route("/comments/:id/like", post(handlers::toggle_comment_like))
}
