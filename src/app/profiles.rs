use anyhow::Result;
use uuid::Uuid;

use crate::app::auth::profile_from_row;
use crate::domain::profile::Profile;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct ProfileService {
    db: Db,
}

impl ProfileService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let row = sqlx::query(
            "SELECT id, username, email, full_name, bio, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| profile_from_row(&row)))
    }

    /// Owner-only update. `username`/`full_name` of `None` leave the column
    /// untouched; a `bio` of `Some("")` clears it to NULL.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        username: Option<String>,
        full_name: Option<String>,
        bio: Option<String>,
    ) -> Result<Option<Profile>> {
        let row = sqlx::query(
            "UPDATE users SET \
                username = COALESCE($2, username), \
                full_name = COALESCE($3, full_name), \
                bio = CASE WHEN $4::text IS NULL THEN bio ELSE NULLIF(btrim($4), '') END, \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING id, username, email, full_name, bio, created_at, updated_at",
        )
        .bind(user_id)
        .bind(username)
        .bind(full_name)
        .bind(bio)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| profile_from_row(&row)))
    }
}
