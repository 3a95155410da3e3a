use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::engagement::{CommentWrite, EngagementService};
use crate::app::profiles::ProfileService;
use crate::app::recipes::{NewRecipe, RecipeFilter, RecipeService, RecipeWrite};
use crate::domain::engagement::{Comment, CommentFeed, LikeToggle, RecipeStats};
use crate::domain::profile::{Profile, PublicProfile};
use crate::domain::recipe::{Difficulty, Recipe, RecipeWithStats};
use crate::http::{AppError, AuthUser};
use crate::AppState;

const MAX_COMMENT_LEN: usize = 1000;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    )
}

fn engagement_service(state: &AppState) -> EngagementService {
    EngagementService::new(state.db.clone(), state.cache.clone(), state.social_strategy)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub profile: Profile,
    #[serde(flatten)]
    pub tokens: AuthTokenResponse,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<SignupResponse>, AppError> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.username.trim().is_empty() {
        return Err(AppError::bad_request("username cannot be empty"));
    }
    if payload.email.trim().is_empty() {
        return Err(AppError::bad_request("email cannot be empty"));
    }
    if payload.full_name.trim().is_empty() {
        return Err(AppError::bad_request("full_name cannot be empty"));
    }
    if payload.password.trim().len() < 8 {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = auth_service(&state);
    let profile = service
        .signup(
            payload.username.trim().to_string(),
            payload.email.trim().to_string(),
            payload.full_name.trim().to_string(),
            payload.password,
        )
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if let Some(db_err) = sqlx_err.as_database_error() {
                    if db_err.code().as_deref() == Some("23505") {
                        let constraint = db_err.constraint().unwrap_or_default();
                        if constraint.contains("users_username_key") {
                            return AppError::conflict("Username already taken");
                        }
                        if constraint.contains("users_email_key") {
                            return AppError::conflict("Email already taken");
                        }
                    }
                }
            }
            tracing::error!(error = ?err, "failed to sign up");
            AppError::internal("failed to sign up")
        })?;

    let tokens = service.issue_token_pair(profile.id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %profile.id, "failed to issue tokens");
        AppError::internal("failed to sign up")
    })?;

    Ok(Json(SignupResponse {
        profile,
        tokens: AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        },
    }))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.identifier.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("identifier and password are required"));
    }

    let service = auth_service(&state);
    let tokens = service
        .login(&payload.identifier, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    let tokens = service.refresh(&payload.refresh_token).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to refresh token");
        AppError::internal("failed to refresh token")
    })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

#[derive(Deserialize)]
pub struct RevokeRequest {
    pub refresh_token: String,
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RevokeRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    let revoked = service
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    let _ = revoked;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_profile(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Profile>, AppError> {
    let service = auth_service(&state);
    let profile = service
        .get_current_profile(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current profile");
            AppError::internal("failed to fetch current profile")
        })?;

    match profile {
        Some(profile) => Ok(Json(profile)),
        None => Err(AppError::not_found("profile not found")),
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

pub async fn get_profile(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PublicProfile>, AppError> {
    let service = ProfileService::new(state.db.clone());
    let profile = service.get_profile(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch profile");
        AppError::internal("failed to fetch profile")
    })?;

    match profile {
        Some(profile) => Ok(Json(profile.into())),
        None => Err(AppError::not_found("profile not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
}

pub async fn update_profile(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    if auth.user_id != id {
        return Err(AppError::forbidden("cannot update other profiles"));
    }

    // Blank username/full_name are ignored rather than rejected, matching
    // the partial-update form semantics.
    let username = payload
        .username
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let full_name = payload
        .full_name
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let service = ProfileService::new(state.db.clone());
    let profile = service
        .update_profile(id, username, full_name, payload.bio)
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if let Some(db_err) = sqlx_err.as_database_error() {
                    if db_err.code().as_deref() == Some("23505") {
                        return AppError::conflict("Username already taken");
                    }
                }
            }
            tracing::error!(error = ?err, user_id = %id, "failed to update profile");
            AppError::internal("failed to update profile")
        })?;

    match profile {
        Some(profile) => Ok(Json(profile)),
        None => Err(AppError::not_found("profile not found")),
    }
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RecipeRequest {
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub cooking_time: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub category: Option<String>,
}

impl RecipeRequest {
    fn validate(self) -> Result<NewRecipe, AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::bad_request("title is required"));
        }
        if !self.ingredients.iter().any(|item| !item.trim().is_empty()) {
            return Err(AppError::bad_request("ingredients are required"));
        }
        if !self.instructions.iter().any(|item| !item.trim().is_empty()) {
            return Err(AppError::bad_request("instructions are required"));
        }
        if let Some(minutes) = self.cooking_time {
            if minutes < 0 {
                return Err(AppError::bad_request("cooking_time cannot be negative"));
            }
        }

        Ok(NewRecipe {
            title: self.title,
            description: self.description.filter(|value| !value.trim().is_empty()),
            ingredients: self.ingredients,
            instructions: self.instructions,
            cooking_time: self.cooking_time,
            difficulty: self.difficulty,
            category: self.category.filter(|value| !value.trim().is_empty()),
        })
    }
}

#[derive(Deserialize)]
pub struct RecipeListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub category: Option<String>,
    pub q: Option<String>,
}

pub async fn create_recipe(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RecipeRequest>,
) -> Result<(StatusCode, Json<Recipe>), AppError> {
    let new = payload.validate()?;

    let service = RecipeService::new(state.db.clone(), state.cache.clone());
    let recipe = service.create_recipe(auth.user_id, new).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create recipe");
        AppError::internal("failed to create recipe")
    })?;

    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn list_recipes(
    auth: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<RecipeListQuery>,
) -> Result<Json<Vec<RecipeWithStats>>, AppError> {
    let limit = query.limit.unwrap_or(20);
    if !(1..=100).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 100"));
    }
    let offset = query.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::bad_request("offset cannot be negative"));
    }
    let viewer_id = auth.map(|user| user.user_id);

    let filter = RecipeFilter {
        category: query.category.filter(|value| !value.trim().is_empty()),
        query: query.q.filter(|value| !value.trim().is_empty()),
    };

    let service = RecipeService::new(state.db.clone(), state.cache.clone());
    let recipes = service
        .list_recipes(&filter, limit, offset)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list recipes");
            AppError::internal("failed to list recipes")
        })?;

    attach_stats(&state, recipes, viewer_id).await
}

pub async fn list_user_recipes(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RecipeWithStats>>, AppError> {
    let viewer_id = auth.map(|user| user.user_id);

    let service = RecipeService::new(state.db.clone(), state.cache.clone());
    let recipes = service.list_by_user(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to list user recipes");
        AppError::internal("failed to list recipes")
    })?;

    attach_stats(&state, recipes, viewer_id).await
}

/// One batched stats round instead of a fetch per listed recipe.
async fn attach_stats(
    state: &AppState,
    recipes: Vec<Recipe>,
    viewer_id: Option<Uuid>,
) -> Result<Json<Vec<RecipeWithStats>>, AppError> {
    let recipe_ids: Vec<Uuid> = recipes.iter().map(|recipe| recipe.id).collect();
    let stats = engagement_service(state)
        .recipe_stats_many(&recipe_ids, viewer_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to batch recipe stats");
            AppError::internal("failed to list recipes")
        })?;

    let items = recipes
        .into_iter()
        .map(|recipe| {
            let entry = stats.get(&recipe.id);
            RecipeWithStats {
                like_count: entry.map(|s| s.like_count).unwrap_or(0),
                comment_count: entry.map(|s| s.comment_count).unwrap_or(0),
                user_has_liked: entry.map(|s| s.user_has_liked).unwrap_or(false),
                recipe,
            }
        })
        .collect();

    Ok(Json(items))
}

pub async fn get_recipe(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<RecipeWithStats>, AppError> {
    let viewer_id = auth.map(|user| user.user_id);

    let service = RecipeService::new(state.db.clone(), state.cache.clone());
    let recipe = service.get_recipe(id).await.map_err(|err| {
        tracing::error!(error = ?err, recipe_id = %id, "failed to fetch recipe");
        AppError::internal("failed to fetch recipe")
    })?;

    let Some(recipe) = recipe else {
        return Err(AppError::not_found("recipe not found"));
    };

    let stats = engagement_service(&state)
        .recipe_stats(id, viewer_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, recipe_id = %id, "failed to fetch recipe stats");
            AppError::internal("failed to fetch recipe")
        })?
        .unwrap_or(RecipeStats {
            recipe_id: id,
            like_count: 0,
            comment_count: 0,
            user_has_liked: false,
        });

    Ok(Json(RecipeWithStats {
        recipe,
        like_count: stats.like_count,
        comment_count: stats.comment_count,
        user_has_liked: stats.user_has_liked,
    }))
}

pub async fn update_recipe(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RecipeRequest>,
) -> Result<Json<Recipe>, AppError> {
    let new = payload.validate()?;

    let service = RecipeService::new(state.db.clone(), state.cache.clone());
    let outcome = service
        .update_recipe(id, auth.user_id, new)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, recipe_id = %id, "failed to update recipe");
            AppError::internal("failed to update recipe")
        })?;

    match outcome {
        RecipeWrite::Done(recipe) => Ok(Json(recipe)),
        RecipeWrite::NotFound => Err(AppError::not_found("recipe not found")),
        RecipeWrite::Forbidden => Err(AppError::forbidden("only the owner can edit this recipe")),
    }
}

pub async fn delete_recipe(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = RecipeService::new(state.db.clone(), state.cache.clone());
    let outcome = service.delete_recipe(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, recipe_id = %id, "failed to delete recipe");
        AppError::internal("failed to delete recipe")
    })?;

    match outcome {
        RecipeWrite::Done(()) => Ok(StatusCode::NO_CONTENT),
        RecipeWrite::NotFound => Err(AppError::not_found("recipe not found")),
        RecipeWrite::Forbidden => {
            Err(AppError::forbidden("only the owner can delete this recipe"))
        }
    }
}

pub async fn get_recipe_stats(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<RecipeStats>, AppError> {
    let viewer_id = auth.map(|user| user.user_id);

    let stats = engagement_service(&state)
        .recipe_stats(id, viewer_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, recipe_id = %id, "failed to fetch recipe stats");
            AppError::internal("failed to fetch recipe stats")
        })?;

    match stats {
        Some(stats) => Ok(Json(stats)),
        None => Err(AppError::not_found("recipe not found")),
    }
}

// ---------------------------------------------------------------------------
// Likes
// ---------------------------------------------------------------------------

pub async fn toggle_recipe_like(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeToggle>, AppError> {
    let toggle = engagement_service(&state)
        .toggle_recipe_like(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, recipe_id = %id, "failed to toggle recipe like");
            AppError::internal("failed to toggle like")
        })?;

    match toggle {
        Some(toggle) => Ok(Json(toggle)),
        None => Err(AppError::not_found("recipe not found")),
    }
}

pub async fn toggle_comment_like(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeToggle>, AppError> {
    let toggle = engagement_service(&state)
        .toggle_comment_like(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, comment_id = %id, "failed to toggle comment like");
            AppError::internal("failed to toggle like")
        })?;

    match toggle {
        Some(toggle) => Ok(Json(toggle)),
        None => Err(AppError::not_found("comment not found")),
    }
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

fn validate_comment_content(content: &str) -> Result<&str, AppError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request("comment content is required"));
    }
    if trimmed.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::bad_request("comment must be 1000 characters or less"));
    }
    Ok(trimmed)
}

pub async fn create_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let content = validate_comment_content(&payload.content)?;

    let comment = engagement_service(&state)
        .create_comment(id, auth.user_id, content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, recipe_id = %id, "failed to create comment");
            AppError::internal("failed to create comment")
        })?;

    match comment {
        Some(comment) => Ok((StatusCode::CREATED, Json(comment))),
        None => Err(AppError::not_found("recipe not found")),
    }
}

pub async fn update_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<Comment>, AppError> {
    let content = validate_comment_content(&payload.content)?;

    let outcome = engagement_service(&state)
        .update_comment(id, auth.user_id, content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to update comment");
            AppError::internal("failed to update comment")
        })?;

    match outcome {
        CommentWrite::Done(comment) => Ok(Json(comment)),
        CommentWrite::NotFound => Err(AppError::not_found("comment not found")),
        CommentWrite::Forbidden => {
            Err(AppError::forbidden("you can only edit your own comments"))
        }
    }
}

pub async fn delete_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let outcome = engagement_service(&state)
        .delete_comment(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to delete comment");
            AppError::internal("failed to delete comment")
        })?;

    match outcome {
        CommentWrite::Done(()) => Ok(StatusCode::NO_CONTENT),
        CommentWrite::NotFound => Err(AppError::not_found("comment not found")),
        CommentWrite::Forbidden => {
            Err(AppError::forbidden("you can only delete your own comments"))
        }
    }
}

pub async fn list_comments(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<CommentFeed>, AppError> {
    let viewer_id = auth.map(|user| user.user_id);

    // Deliberate soft-fail: a broken comments feed must not block the rest
    // of the recipe page, so the lenient variant degrades to an empty,
    // marked feed.
    let feed = engagement_service(&state)
        .list_comments_lenient(id, viewer_id)
        .await;

    Ok(Json(feed))
}
