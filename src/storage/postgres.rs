use std::{env, time::Duration};

use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::{ArticleRepository, HeroRef, Replaced, models::ArticleRow};
use crate::{
    content::{Article, ArticleFields, ArticleStatus},
    error::{Error, Result},
};

/// 数据库连接池类型
pub type Db = sqlx::PgPool;

/// 文章表查询列
const ARTICLE_COLUMNS: &str = "id, user_id, title, content_html, content_json, hero_img, status, \
     category_id, sub_category_id, created_at, updated_at";

/// 从环境变量 `DATABASE_URL` 初始化数据库连接池
pub async fn init_db_from_env() -> Result<Db> {
    let conn_url = env::var("DATABASE_URL")
        .map_err(|_| Error::FormatError("环境变量: `DATABASE_URL`: NotPresent"))?;
    Ok(new_db_pool(&conn_url).await?)
}

/// 根据连接 URL 创建新的数据库连接池
///
/// 连接池配置：
///
/// - 最大空闲时间 60 秒
/// - 最大生存时间 1500 秒（约 25 分钟）
/// - 最大连接数 10
/// - 获取连接超时 2 秒
/// - 获取前测试连接
/// - 最小连接数 2
pub async fn new_db_pool(conn_url: &str) -> core::result::Result<Db, sqlx::Error> {
    PgPoolOptions::new()
        .idle_timeout(Duration::from_secs(60))
        .max_lifetime(Duration::from_secs(1500))
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(2))
        .test_before_acquire(true)
        .min_connections(2)
        .connect(conn_url)
        .await
}

/// 执行 SQL 文件中的迁移语句
///
/// 将文件内容按 `;` 分割，每条 SQL 单独执行
pub async fn migrate(db: &Db, file: &str) -> core::result::Result<(), sqlx::Error> {
    let content = tokio::fs::read_to_string(file).await?;

    for sql in content.split(';') {
        if sql.trim().is_empty() {
            continue;
        }
        sqlx::query(sql).execute(db).await?;
    }
    Ok(())
}

/// 基于 PostgreSQL 的 [`ArticleRepository`]
#[derive(Clone)]
pub struct PgRepository {
    db: Db,
}

impl PgRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

impl ArticleRepository for PgRepository {
    async fn create(
        &self,
        user_id: &str,
        fields: &ArticleFields,
        hero_img: Option<&str>,
    ) -> Result<Article> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            r#"
            INSERT INTO articles
                (id, user_id, title, content_html, content_json, hero_img, status,
                 category_id, sub_category_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now())
            RETURNING {ARTICLE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&fields.title)
        .bind(&fields.content_html)
        .bind(&fields.content_json)
        .bind(hero_img)
        .bind(ArticleStatus::Draft.as_str())
        .bind(&fields.category_id)
        .bind(&fields.sub_category_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.try_into()?)
    }

    async fn update(
        &self,
        id: Uuid,
        fields: &ArticleFields,
        hero: HeroRef<'_>,
    ) -> Result<Option<Replaced>> {
        let mut tx = self.db.begin().await?;

        // 锁定行，确保读到的旧引用就是被替换的那个
        let previous: Option<Option<String>> = sqlx::query_scalar(
            "SELECT hero_img FROM articles WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(tx.as_mut())
        .await?;

        let Some(previous_hero) = previous else {
            tx.rollback().await?;
            return Ok(None);
        };

        let (replace_hero, new_hero) = match hero {
            HeroRef::Keep => (false, None),
            HeroRef::Set(reference) => (true, Some(reference)),
            HeroRef::Clear => (true, None),
        };

        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            r#"
            UPDATE articles
            SET
                title = $2,
                content_html = $3,
                content_json = $4,
                category_id = $5,
                sub_category_id = $6,
                hero_img = CASE WHEN $7 THEN $8 ELSE hero_img END,
                updated_at = now()
            WHERE id = $1
            RETURNING {ARTICLE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.content_html)
        .bind(&fields.content_json)
        .bind(&fields.category_id)
        .bind(&fields.sub_category_id)
        .bind(replace_hero)
        .bind(new_hero)
        .fetch_one(tx.as_mut())
        .await?;

        tx.commit().await?;

        Ok(Some(Replaced {
            article: row.try_into()?,
            previous_hero,
        }))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Article::try_from).transpose()?)
    }

    async fn list(
        &self,
        owner: Option<&str>,
        status: Option<ArticleStatus>,
    ) -> Result<Vec<Article>> {
        let mut builder = sqlx::QueryBuilder::new(format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE deleted_at IS NULL"
        ));

        if let Some(owner) = owner {
            builder.push(" AND user_id = ").push_bind(owner);
        }
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY created_at DESC");

        let rows = builder
            .build_query_as::<ArticleRow>()
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(Article::try_from)
            .collect::<core::result::Result<Vec<_>, _>>()?)
    }

    async fn set_status(
        &self,
        id: Uuid,
        from: ArticleStatus,
        to: ArticleStatus,
    ) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            r#"
            UPDATE articles
            SET status = $2, updated_at = now()
            WHERE id = $1 AND status = $3 AND deleted_at IS NULL
            RETURNING {ARTICLE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(to.as_str())
        .bind(from.as_str())
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Article::try_from).transpose()?)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE articles SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
