use std::collections::{HashMap, HashSet};

use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::engagement::{Comment, CommentFeed, LikeToggle, RecipeStats};
use crate::infra::cache::RedisCache;
use crate::infra::db::Db;

/// How like toggles and stats reads hit the database.
///
/// `DbFunction` uses the SQL routines from migrations/002 (toggle and
/// recount in one transaction, one round trip). `Manual` composes primitive
/// reads and writes with idempotent race recovery, for databases where the
/// routines have not been installed. Selection happens once at startup from
/// config or a catalog probe, never by matching error strings at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialStrategy {
    DbFunction,
    Manual,
}

pub async fn detect_strategy(db: &Db, configured: Option<bool>) -> Result<SocialStrategy> {
    match configured {
        Some(true) => return Ok(SocialStrategy::DbFunction),
        Some(false) => return Ok(SocialStrategy::Manual),
        None => {}
    }

    let installed: i64 = sqlx::query_scalar(
        "SELECT count(DISTINCT proname) FROM pg_proc \
         WHERE proname IN ('toggle_recipe_like', 'toggle_comment_like', 'get_recipe_stats')",
    )
    .fetch_one(db.pool())
    .await?;

    if installed == 3 {
        Ok(SocialStrategy::DbFunction)
    } else {
        tracing::warn!(
            installed,
            "social SQL routines missing, falling back to manual toggles"
        );
        Ok(SocialStrategy::Manual)
    }
}

/// Outcome of an author-guarded comment write.
#[derive(Debug)]
pub enum CommentWrite<T> {
    Done(T),
    NotFound,
    Forbidden,
}

const COMMENT_COLUMNS: &str = "c.id, c.recipe_id, c.user_id, \
     COALESCE(u.username, 'Unknown') AS author_username, \
     COALESCE(u.full_name, 'Unknown User') AS author_full_name, \
     c.content, c.created_at, c.updated_at";

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
    cache: RedisCache,
    strategy: SocialStrategy,
}

impl EngagementService {
    pub fn new(db: Db, cache: RedisCache, strategy: SocialStrategy) -> Self {
        Self {
            db,
            cache,
            strategy,
        }
    }

    // ------------------------------------------------------------------
    // Like toggles
    // ------------------------------------------------------------------

    /// Flip the (recipe, user) like relationship and return the new state
    /// with a fresh recount. `None` when the recipe does not exist.
    pub async fn toggle_recipe_like(
        &self,
        recipe_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<LikeToggle>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM recipes WHERE id = $1)")
            .bind(recipe_id)
            .fetch_one(self.db.pool())
            .await?;
        if !exists {
            return Ok(None);
        }

        let toggle = match self.strategy {
            SocialStrategy::DbFunction => {
                self.toggle_via_function(
                    "SELECT liked, like_count FROM toggle_recipe_like($1, $2)",
                    recipe_id,
                    user_id,
                )
                .await?
            }
            SocialStrategy::Manual => self.toggle_recipe_like_manual(recipe_id, user_id).await?,
        };

        self.cache
            .invalidate_pages(&[
                format!("/recipes/{}", recipe_id),
                "/recipes".into(),
                "/dashboard".into(),
            ])
            .await;

        Ok(Some(toggle))
    }

    /// Same semantics as [`toggle_recipe_like`], scoped to a comment.
    pub async fn toggle_comment_like(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<LikeToggle>> {
        let recipe_id: Option<Uuid> =
            sqlx::query_scalar("SELECT recipe_id FROM recipe_comments WHERE id = $1")
                .bind(comment_id)
                .fetch_optional(self.db.pool())
                .await?;
        let Some(recipe_id) = recipe_id else {
            return Ok(None);
        };

        let toggle = match self.strategy {
            SocialStrategy::DbFunction => {
                self.toggle_via_function(
                    "SELECT liked, like_count FROM toggle_comment_like($1, $2)",
                    comment_id,
                    user_id,
                )
                .await?
            }
            SocialStrategy::Manual => self.toggle_comment_like_manual(comment_id, user_id).await?,
        };

        self.cache
            .invalidate_pages(&[format!("/recipes/{}", recipe_id)])
            .await;

        Ok(Some(toggle))
    }

    async fn toggle_via_function(
        &self,
        sql: &str,
        target_id: Uuid,
        user_id: Uuid,
    ) -> Result<LikeToggle> {
        let row = sqlx::query(sql)
            .bind(target_id)
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(LikeToggle {
            liked: row.get("liked"),
            like_count: row.get("like_count"),
        })
    }

    async fn toggle_recipe_like_manual(
        &self,
        recipe_id: Uuid,
        user_id: Uuid,
    ) -> Result<LikeToggle> {
        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM recipe_likes WHERE recipe_id = $1 AND user_id = $2",
        )
        .bind(recipe_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let liked = match existing {
            Some(_) => {
                sqlx::query("DELETE FROM recipe_likes WHERE recipe_id = $1 AND user_id = $2")
                    .bind(recipe_id)
                    .bind(user_id)
                    .execute(self.db.pool())
                    .await?;
                false
            }
            None => {
                // A conflicting concurrent toggle means the row already
                // exists; either way the relationship now holds.
                sqlx::query(
                    "INSERT INTO recipe_likes (recipe_id, user_id) VALUES ($1, $2) \
                     ON CONFLICT (recipe_id, user_id) DO NOTHING",
                )
                .bind(recipe_id)
                .bind(user_id)
                .execute(self.db.pool())
                .await?;
                true
            }
        };

        // Authoritative recount rather than an incremented counter.
        let like_count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM recipe_likes WHERE recipe_id = $1")
                .bind(recipe_id)
                .fetch_one(self.db.pool())
                .await?;

        Ok(LikeToggle { liked, like_count })
    }

    async fn toggle_comment_like_manual(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> Result<LikeToggle> {
        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM comment_likes WHERE comment_id = $1 AND user_id = $2",
        )
        .bind(comment_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let liked = match existing {
            Some(_) => {
                sqlx::query("DELETE FROM comment_likes WHERE comment_id = $1 AND user_id = $2")
                    .bind(comment_id)
                    .bind(user_id)
                    .execute(self.db.pool())
                    .await?;
                false
            }
            None => {
                sqlx::query(
                    "INSERT INTO comment_likes (comment_id, user_id) VALUES ($1, $2) \
                     ON CONFLICT (comment_id, user_id) DO NOTHING",
                )
                .bind(comment_id)
                .bind(user_id)
                .execute(self.db.pool())
                .await?;
                true
            }
        };

        let like_count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM comment_likes WHERE comment_id = $1")
                .bind(comment_id)
                .fetch_one(self.db.pool())
                .await?;

        Ok(LikeToggle { liked, like_count })
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    /// Insert a comment. `None` when the recipe does not exist. Content is
    /// expected to be trimmed and length-checked by the caller; the DB
    /// constraint backstops the bound.
    pub async fn create_comment(
        &self,
        recipe_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Option<Comment>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM recipes WHERE id = $1)")
            .bind(recipe_id)
            .fetch_one(self.db.pool())
            .await?;
        if !exists {
            return Ok(None);
        }

        let row = sqlx::query(&format!(
            "WITH inserted AS ( \
                INSERT INTO recipe_comments (recipe_id, user_id, content) \
                VALUES ($1, $2, $3) \
                RETURNING * \
             ) \
             SELECT {columns} FROM inserted c LEFT JOIN users u ON c.user_id = u.id",
            columns = COMMENT_COLUMNS,
        ))
        .bind(recipe_id)
        .bind(author_id)
        .bind(content)
        .fetch_one(self.db.pool())
        .await?;

        self.cache
            .invalidate_pages(&[format!("/recipes/{}", recipe_id), "/recipes".into()])
            .await;

        Ok(Some(Comment {
            id: row.get("id"),
            recipe_id: row.get("recipe_id"),
            user_id: row.get("user_id"),
            author_username: row.get("author_username"),
            author_full_name: row.get("author_full_name"),
            content: row.get("content"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            like_count: 0,
            user_has_liked: false,
        }))
    }

    /// Author-only edit. Bumps `updated_at`, leaves `created_at` alone.
    pub async fn update_comment(
        &self,
        comment_id: Uuid,
        requester_id: Uuid,
        content: &str,
    ) -> Result<CommentWrite<Comment>> {
        let meta = sqlx::query("SELECT user_id, recipe_id FROM recipe_comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(meta) = meta else {
            return Ok(CommentWrite::NotFound);
        };
        let author_id: Uuid = meta.get("user_id");
        let recipe_id: Uuid = meta.get("recipe_id");
        if author_id != requester_id {
            return Ok(CommentWrite::Forbidden);
        }

        let row = sqlx::query(&format!(
            "WITH updated AS ( \
                UPDATE recipe_comments \
                SET content = $2, updated_at = clock_timestamp() \
                WHERE id = $1 \
                RETURNING * \
             ) \
             SELECT {columns}, \
                    (SELECT count(*) FROM comment_likes cl WHERE cl.comment_id = c.id) AS like_count, \
                    EXISTS (SELECT 1 FROM comment_likes cl \
                            WHERE cl.comment_id = c.id AND cl.user_id = $3) AS user_has_liked \
             FROM updated c LEFT JOIN users u ON c.user_id = u.id",
            columns = COMMENT_COLUMNS,
        ))
        .bind(comment_id)
        .bind(content)
        .bind(requester_id)
        .fetch_one(self.db.pool())
        .await?;

        self.cache
            .invalidate_pages(&[format!("/recipes/{}", recipe_id)])
            .await;

        Ok(CommentWrite::Done(comment_from_row(&row)))
    }

    /// Author-only hard delete; the comment's likes go with it via cascade.
    pub async fn delete_comment(
        &self,
        comment_id: Uuid,
        requester_id: Uuid,
    ) -> Result<CommentWrite<()>> {
        let meta = sqlx::query("SELECT user_id, recipe_id FROM recipe_comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(meta) = meta else {
            return Ok(CommentWrite::NotFound);
        };
        let author_id: Uuid = meta.get("user_id");
        let recipe_id: Uuid = meta.get("recipe_id");
        if author_id != requester_id {
            return Ok(CommentWrite::Forbidden);
        }

        sqlx::query("DELETE FROM recipe_comments WHERE id = $1")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;

        self.cache
            .invalidate_pages(&[format!("/recipes/{}", recipe_id)])
            .await;

        Ok(CommentWrite::Done(()))
    }

    /// Chronological comment listing (oldest first, id as tie break) with
    /// author fields and per-comment like stats computed in one query.
    pub async fn list_comments(
        &self,
        recipe_id: Uuid,
        viewer_id: Option<Uuid>,
    ) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "SELECT {columns}, \
                    (SELECT count(*) FROM comment_likes cl WHERE cl.comment_id = c.id) AS like_count, \
                    ($2::uuid IS NOT NULL AND EXISTS ( \
                        SELECT 1 FROM comment_likes cl \
                        WHERE cl.comment_id = c.id AND cl.user_id = $2 \
                    )) AS user_has_liked \
             FROM recipe_comments c \
             LEFT JOIN users u ON c.user_id = u.id \
             WHERE c.recipe_id = $1 \
             ORDER BY c.created_at ASC, c.id ASC",
            columns = COMMENT_COLUMNS,
        ))
        .bind(recipe_id)
        .bind(viewer_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// Availability-over-correctness variant for page rendering: a failed
    /// read degrades to an empty feed marked `degraded` instead of blocking
    /// the rest of the recipe page.
    pub async fn list_comments_lenient(
        &self,
        recipe_id: Uuid,
        viewer_id: Option<Uuid>,
    ) -> CommentFeed {
        match self.list_comments(recipe_id, viewer_id).await {
            Ok(comments) => CommentFeed {
                comments,
                degraded: false,
            },
            Err(err) => {
                tracing::error!(error = ?err, recipe_id = %recipe_id, "comment listing degraded");
                CommentFeed {
                    comments: Vec::new(),
                    degraded: true,
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    /// Aggregate snapshot for one recipe. `None` when the recipe does not
    /// exist. An absent viewer means `user_has_liked = false` without a
    /// lookup.
    pub async fn recipe_stats(
        &self,
        recipe_id: Uuid,
        viewer_id: Option<Uuid>,
    ) -> Result<Option<RecipeStats>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM recipes WHERE id = $1)")
            .bind(recipe_id)
            .fetch_one(self.db.pool())
            .await?;
        if !exists {
            return Ok(None);
        }

        let stats = match self.strategy {
            SocialStrategy::DbFunction => {
                let row = sqlx::query(
                    "SELECT like_count, comment_count, user_has_liked \
                     FROM get_recipe_stats($1, $2)",
                )
                .bind(recipe_id)
                .bind(viewer_id)
                .fetch_one(self.db.pool())
                .await?;

                RecipeStats {
                    recipe_id,
                    like_count: row.get("like_count"),
                    comment_count: row.get("comment_count"),
                    user_has_liked: row.get("user_has_liked"),
                }
            }
            SocialStrategy::Manual => {
                // Three independent reads; slight skew between them is
                // acceptable for non-critical counters.
                let like_count: i64 =
                    sqlx::query_scalar("SELECT count(*) FROM recipe_likes WHERE recipe_id = $1")
                        .bind(recipe_id)
                        .fetch_one(self.db.pool())
                        .await?;
                let comment_count: i64 = sqlx::query_scalar(
                    "SELECT count(*) FROM recipe_comments WHERE recipe_id = $1",
                )
                .bind(recipe_id)
                .fetch_one(self.db.pool())
                .await?;
                let user_has_liked = match viewer_id {
                    Some(viewer_id) => {
                        sqlx::query_scalar(
                            "SELECT EXISTS(SELECT 1 FROM recipe_likes \
                             WHERE recipe_id = $1 AND user_id = $2)",
                        )
                        .bind(recipe_id)
                        .bind(viewer_id)
                        .fetch_one(self.db.pool())
                        .await?
                    }
                    None => false,
                };

                RecipeStats {
                    recipe_id,
                    like_count,
                    comment_count,
                    user_has_liked,
                }
            }
        };

        Ok(Some(stats))
    }

    /// Batched stats for listings: grouped counts keyed by recipe id plus
    /// one scan for the viewer's likes, instead of a fetch per recipe.
    pub async fn recipe_stats_many(
        &self,
        recipe_ids: &[Uuid],
        viewer_id: Option<Uuid>,
    ) -> Result<HashMap<Uuid, RecipeStats>> {
        if recipe_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let like_rows = sqlx::query(
            "SELECT recipe_id, count(*) AS n FROM recipe_likes \
             WHERE recipe_id = ANY($1) GROUP BY recipe_id",
        )
        .bind(recipe_ids)
        .fetch_all(self.db.pool())
        .await?;

        let comment_rows = sqlx::query(
            "SELECT recipe_id, count(*) AS n FROM recipe_comments \
             WHERE recipe_id = ANY($1) GROUP BY recipe_id",
        )
        .bind(recipe_ids)
        .fetch_all(self.db.pool())
        .await?;

        let viewer_liked: HashSet<Uuid> = match viewer_id {
            Some(viewer_id) => sqlx::query_scalar(
                "SELECT recipe_id FROM recipe_likes \
                 WHERE recipe_id = ANY($1) AND user_id = $2",
            )
            .bind(recipe_ids)
            .bind(viewer_id)
            .fetch_all(self.db.pool())
            .await?
            .into_iter()
            .collect(),
            None => HashSet::new(),
        };

        let like_counts: HashMap<Uuid, i64> = like_rows
            .iter()
            .map(|row| (row.get("recipe_id"), row.get("n")))
            .collect();
        let comment_counts: HashMap<Uuid, i64> = comment_rows
            .iter()
            .map(|row| (row.get("recipe_id"), row.get("n")))
            .collect();

        let stats = recipe_ids
            .iter()
            .map(|&recipe_id| {
                (
                    recipe_id,
                    RecipeStats {
                        recipe_id,
                        like_count: like_counts.get(&recipe_id).copied().unwrap_or(0),
                        comment_count: comment_counts.get(&recipe_id).copied().unwrap_or(0),
                        user_has_liked: viewer_liked.contains(&recipe_id),
                    },
                )
            })
            .collect();

        Ok(stats)
    }
}

fn comment_from_row(row: &sqlx::postgres::PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        recipe_id: row.get("recipe_id"),
        user_id: row.get("user_id"),
        author_username: row.get("author_username"),
        author_full_name: row.get("author_full_name"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        like_count: row.get("like_count"),
        user_has_liked: row.get("user_has_liked"),
    }
}
