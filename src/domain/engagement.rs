use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A comment with its author display fields and viewer-relative stats
/// denormalized in, so the caller needs no follow-up lookups.
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub user_id: Uuid,
    pub author_username: String,
    pub author_full_name: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Strictly greater than `created_at` once the comment has been edited.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub like_count: i64,
    pub user_has_liked: bool,
}

/// Result of flipping a like relationship: the new state plus a fresh
/// authoritative recount.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RecipeStats {
    pub recipe_id: Uuid,
    pub like_count: i64,
    pub comment_count: i64,
    pub user_has_liked: bool,
}

/// Comment listing with an explicit degraded marker. The read path is
/// allowed to soft-fail to an empty list so a broken comments feed never
/// blocks the rest of a recipe page; `degraded` lets callers tell "no
/// comments" apart from "fetch failed".
#[derive(Debug, Clone, Serialize)]
pub struct CommentFeed {
    pub comments: Vec<Comment>,
    pub degraded: bool,
}
