use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::content::{Article, ArticleStatus};

/// `articles` 表中的一行
#[derive(Debug, sqlx::FromRow)]
pub struct ArticleRow {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub content_html: String,
    pub content_json: Option<serde_json::Value>,
    pub hero_img: Option<String>,
    /// `draft` / `published` / `archived`
    pub status: String,
    pub category_id: Option<String>,
    pub sub_category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = sqlx::Error;

    fn try_from(row: ArticleRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ArticleStatus>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Article {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            content_html: row.content_html,
            content_json: row.content_json,
            hero_img: row.hero_img,
            status,
            category_id: row.category_id,
            sub_category_id: row.sub_category_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
