use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ArticleRepository, HeroRef, Replaced};
use crate::{
    content::{Article, ArticleFields, ArticleStatus},
    error::Result,
};

struct Row {
    article: Article,
    deleted: bool,
}

/// 内存中的 [`ArticleRepository`]，进程退出即丢失
///
/// 适用于测试和 `memory` 存储后端。
#[derive(Default)]
pub struct MemoryRepository {
    rows: RwLock<Vec<Row>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArticleRepository for MemoryRepository {
    async fn create(
        &self,
        user_id: &str,
        fields: &ArticleFields,
        hero_img: Option<&str>,
    ) -> Result<Article> {
        let article = Article::draft(user_id, fields.clone(), hero_img.map(str::to_string));
        self.rows.write().await.push(Row {
            article: article.clone(),
            deleted: false,
        });
        Ok(article)
    }

    async fn update(
        &self,
        id: Uuid,
        fields: &ArticleFields,
        hero: HeroRef<'_>,
    ) -> Result<Option<Replaced>> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.iter_mut().find(|r| !r.deleted && r.article.id == id) else {
            return Ok(None);
        };

        let previous_hero = row.article.hero_img.clone();
        row.article.replace_fields(fields.clone());
        match hero {
            HeroRef::Keep => {}
            HeroRef::Set(reference) => row.article.hero_img = Some(reference.to_string()),
            HeroRef::Clear => row.article.hero_img = None,
        }

        Ok(Some(Replaced {
            article: row.article.clone(),
            previous_hero,
        }))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|r| !r.deleted && r.article.id == id)
            .map(|r| r.article.clone()))
    }

    async fn list(
        &self,
        owner: Option<&str>,
        status: Option<ArticleStatus>,
    ) -> Result<Vec<Article>> {
        // 逆序遍历再稳定排序，创建时间相同时后插入的排在前面
        let mut articles: Vec<Article> = self
            .rows
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| !r.deleted)
            .filter(|r| owner.is_none_or(|o| r.article.user_id == o))
            .filter(|r| status.is_none_or(|s| r.article.status == s))
            .map(|r| r.article.clone())
            .collect();

        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(articles)
    }

    async fn set_status(
        &self,
        id: Uuid,
        from: ArticleStatus,
        to: ArticleStatus,
    ) -> Result<Option<Article>> {
        let mut rows = self.rows.write().await;
        Ok(rows
            .iter_mut()
            .find(|r| !r.deleted && r.article.id == id && r.article.status == from)
            .map(|r| {
                r.article.status = to;
                r.article.updated_at = Utc::now();
                r.article.clone()
            }))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|r| !r.deleted && r.article.id == id) {
            Some(row) => {
                row.deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
