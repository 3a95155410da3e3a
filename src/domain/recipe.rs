use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_db(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_username: String,
    pub author_full_name: String,
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub cooking_time: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub category: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeWithStats {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub like_count: i64,
    pub comment_count: i64,
    pub user_has_liked: bool,
}

/// Ingredients and instructions are stored as text that may hold either a
/// JSON array of strings (the format written going forward) or legacy
/// newline-delimited freeform text. Reads tolerate both: best-effort JSON
/// parse, then line split.
pub fn parse_items(raw: &str) -> Vec<String> {
    if let Ok(items) = serde_json::from_str::<Vec<String>>(raw) {
        return items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
    }

    raw.lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn encode_items(items: &[String]) -> String {
    let trimmed: Vec<&str> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .collect();
    serde_json::to_string(&trimmed).unwrap_or_else(|_| "[]".to_string())
}
