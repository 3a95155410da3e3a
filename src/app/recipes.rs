use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::recipe::{encode_items, parse_items, Difficulty, Recipe};
use crate::infra::cache::RedisCache;
use crate::infra::db::Db;

const AUTHOR_JOIN: &str = "LEFT JOIN users u ON r.user_id = u.id";
const RECIPE_COLUMNS: &str = "r.id, r.user_id, \
     COALESCE(u.username, 'Unknown') AS author_username, \
     COALESCE(u.full_name, 'Unknown User') AS author_full_name, \
     r.title, r.description, r.ingredients, r.instructions, \
     r.cooking_time, r.difficulty, r.category, r.created_at";

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub cooking_time: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub category: Option<String>,
    pub query: Option<String>,
}

/// Outcome of an owner-guarded write.
#[derive(Debug)]
pub enum RecipeWrite<T> {
    Done(T),
    NotFound,
    Forbidden,
}

#[derive(Clone)]
pub struct RecipeService {
    db: Db,
    cache: RedisCache,
}

impl RecipeService {
    pub fn new(db: Db, cache: RedisCache) -> Self {
        Self { db, cache }
    }

    pub async fn create_recipe(&self, user_id: Uuid, new: NewRecipe) -> Result<Recipe> {
        let row = sqlx::query(&format!(
            "WITH inserted AS ( \
                INSERT INTO recipes \
                    (user_id, title, description, ingredients, instructions, \
                     cooking_time, difficulty, category) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                RETURNING * \
             ) \
             SELECT {columns} FROM inserted r {join}",
            columns = RECIPE_COLUMNS,
            join = AUTHOR_JOIN,
        ))
        .bind(user_id)
        .bind(new.title.trim())
        .bind(new.description.as_deref().map(str::trim))
        .bind(encode_items(&new.ingredients))
        .bind(encode_items(&new.instructions))
        .bind(new.cooking_time)
        .bind(new.difficulty.map(|d| d.as_db()))
        .bind(new.category.as_deref().map(str::trim))
        .fetch_one(self.db.pool())
        .await?;

        let recipe = recipe_from_row(&row)?;
        self.cache
            .invalidate_pages(&["/recipes".into(), "/dashboard".into()])
            .await;
        Ok(recipe)
    }

    pub async fn get_recipe(&self, recipe_id: Uuid) -> Result<Option<Recipe>> {
        let row = sqlx::query(&format!(
            "SELECT {columns} FROM recipes r {join} WHERE r.id = $1",
            columns = RECIPE_COLUMNS,
            join = AUTHOR_JOIN,
        ))
        .bind(recipe_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|row| recipe_from_row(&row)).transpose()
    }

    /// Newest-first catalog listing with optional category and free-text
    /// filters (title/description/ingredients, case-insensitive).
    pub async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Recipe>> {
        let pattern = filter.query.as_ref().map(|q| format!("%{}%", q));
        let rows = sqlx::query(&format!(
            "SELECT {columns} FROM recipes r {join} \
             WHERE ($1::text IS NULL OR r.category = $1) \
               AND ($2::text IS NULL \
                    OR r.title ILIKE $2 \
                    OR r.description ILIKE $2 \
                    OR r.ingredients ILIKE $2) \
             ORDER BY r.created_at DESC, r.id DESC \
             LIMIT $3 OFFSET $4",
            columns = RECIPE_COLUMNS,
            join = AUTHOR_JOIN,
        ))
        .bind(filter.category.as_deref())
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(recipe_from_row).collect()
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Recipe>> {
        let rows = sqlx::query(&format!(
            "SELECT {columns} FROM recipes r {join} \
             WHERE r.user_id = $1 \
             ORDER BY r.created_at DESC, r.id DESC",
            columns = RECIPE_COLUMNS,
            join = AUTHOR_JOIN,
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(recipe_from_row).collect()
    }

    pub async fn update_recipe(
        &self,
        recipe_id: Uuid,
        requester_id: Uuid,
        new: NewRecipe,
    ) -> Result<RecipeWrite<Recipe>> {
        let owner: Option<Uuid> = sqlx::query_scalar("SELECT user_id FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .fetch_optional(self.db.pool())
            .await?;

        match owner {
            None => return Ok(RecipeWrite::NotFound),
            Some(owner) if owner != requester_id => return Ok(RecipeWrite::Forbidden),
            Some(_) => {}
        }

        let row = sqlx::query(&format!(
            "WITH updated AS ( \
                UPDATE recipes SET \
                    title = $2, description = $3, ingredients = $4, instructions = $5, \
                    cooking_time = $6, difficulty = $7, category = $8 \
                WHERE id = $1 \
                RETURNING * \
             ) \
             SELECT {columns} FROM updated r {join}",
            columns = RECIPE_COLUMNS,
            join = AUTHOR_JOIN,
        ))
        .bind(recipe_id)
        .bind(new.title.trim())
        .bind(new.description.as_deref().map(str::trim))
        .bind(encode_items(&new.ingredients))
        .bind(encode_items(&new.instructions))
        .bind(new.cooking_time)
        .bind(new.difficulty.map(|d| d.as_db()))
        .bind(new.category.as_deref().map(str::trim))
        .fetch_one(self.db.pool())
        .await?;

        let recipe = recipe_from_row(&row)?;
        self.cache
            .invalidate_pages(&[
                "/recipes".into(),
                format!("/recipes/{}", recipe_id),
                "/dashboard".into(),
            ])
            .await;
        Ok(RecipeWrite::Done(recipe))
    }

    pub async fn delete_recipe(
        &self,
        recipe_id: Uuid,
        requester_id: Uuid,
    ) -> Result<RecipeWrite<()>> {
        let owner: Option<Uuid> = sqlx::query_scalar("SELECT user_id FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .fetch_optional(self.db.pool())
            .await?;

        match owner {
            None => return Ok(RecipeWrite::NotFound),
            Some(owner) if owner != requester_id => return Ok(RecipeWrite::Forbidden),
            Some(_) => {}
        }

        // Likes and comments go with the recipe via FK cascade.
        sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .execute(self.db.pool())
            .await?;

        self.cache
            .invalidate_pages(&[
                "/recipes".into(),
                format!("/recipes/{}", recipe_id),
                "/dashboard".into(),
            ])
            .await;
        Ok(RecipeWrite::Done(()))
    }
}

fn recipe_from_row(row: &sqlx::postgres::PgRow) -> Result<Recipe> {
    let difficulty: Option<String> = row.get("difficulty");
    let difficulty = match difficulty {
        Some(value) => Some(
            Difficulty::from_db(&value)
                .ok_or_else(|| anyhow::anyhow!("unknown difficulty: {}", value))?,
        ),
        None => None,
    };

    let ingredients: String = row.get("ingredients");
    let instructions: String = row.get("instructions");

    Ok(Recipe {
        id: row.get("id"),
        user_id: row.get("user_id"),
        author_username: row.get("author_username"),
        author_full_name: row.get("author_full_name"),
        title: row.get("title"),
        description: row.get("description"),
        ingredients: parse_items(&ingredients),
        instructions: parse_items(&instructions),
        cooking_time: row.get("cooking_time"),
        difficulty,
        category: row.get("category"),
        created_at: row.get("created_at"),
    })
}
