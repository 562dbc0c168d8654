use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ArticleFields, ArticleStatus};

/// 文章
///
/// `content_html` 是权威的渲染形式，`content_json` 是编辑器结构化文档的镜像，可为空。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    /// 作者标识，由认证层提供
    pub user_id: String,
    pub title: String,
    pub content_html: String,
    pub content_json: Option<serde_json::Value>,
    /// 封面图在 blob 存储中的引用
    pub hero_img: Option<String>,
    pub status: ArticleStatus,
    pub category_id: Option<String>,
    pub sub_category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// 以 `fields` 创建一篇草稿
    pub fn draft(user_id: impl Into<String>, fields: ArticleFields, hero_img: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title: fields.title,
            content_html: fields.content_html,
            content_json: fields.content_json,
            hero_img,
            status: ArticleStatus::Draft,
            category_id: fields.category_id,
            sub_category_id: fields.sub_category_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// 整体替换可编辑字段
    pub fn replace_fields(&mut self, fields: ArticleFields) {
        self.title = fields.title;
        self.content_html = fields.content_html;
        self.content_json = fields.content_json;
        self.category_id = fields.category_id;
        self.sub_category_id = fields.sub_category_id;
        self.updated_at = Utc::now();
    }
}
