use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// 文章发布状态
///
/// 状态迁移：
///
/// ```text
/// draft     --publish-->  published
/// published --archive-->  archived
/// published --draft-->    draft
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// 触发状态迁移的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusAction {
    Publish,
    Draft,
    Archive,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
            ArticleStatus::Archived => "archived",
        }
    }

    /// 对当前状态执行 `action`，返回迁移后的状态。
    ///
    /// 目标状态与当前状态相同时视为无操作，直接返回当前状态；
    /// 不允许的迁移返回 `None`。
    pub fn transition(self, action: StatusAction) -> Option<ArticleStatus> {
        let target = action.target();
        if self == target {
            return Some(self);
        }

        match (self, action) {
            (ArticleStatus::Draft, StatusAction::Publish)
            | (ArticleStatus::Published, StatusAction::Archive)
            | (ArticleStatus::Published, StatusAction::Draft) => Some(target),
            _ => None,
        }
    }
}

impl StatusAction {
    /// 动作对应的目标状态
    pub fn target(self) -> ArticleStatus {
        match self {
            StatusAction::Publish => ArticleStatus::Published,
            StatusAction::Draft => ArticleStatus::Draft,
            StatusAction::Archive => ArticleStatus::Archived,
        }
    }

    /// 路由中使用的路径片段
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusAction::Publish => "publish",
            StatusAction::Draft => "draft",
            StatusAction::Archive => "archive",
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for StatusAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown value: {0}")]
pub struct UnknownValue(String);

impl UnknownValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl FromStr for ArticleStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ArticleStatus::Draft),
            "published" => Ok(ArticleStatus::Published),
            "archived" => Ok(ArticleStatus::Archived),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

impl FromStr for StatusAction {
    type Err = UnknownValue;

    /// `unpublish` 是 `draft` 的别名
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish" => Ok(StatusAction::Publish),
            "draft" | "unpublish" => Ok(StatusAction::Draft),
            "archive" => Ok(StatusAction::Archive),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}
