use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{Article, UnknownValue};

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 可以查看和管理所有文章
    Admin,
    /// 只能查看和管理自己的文章
    #[default]
    Author,
}

/// 当前请求的用户身份，由认证层提供，只读
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 列表查询的作者过滤条件，管理员不过滤
    pub fn owner_filter(&self) -> Option<&str> {
        match self.role {
            Role::Admin => None,
            Role::Author => Some(&self.id),
        }
    }

    /// 是否可以查看或修改 `article`
    pub fn can_manage(&self, article: &Article) -> bool {
        self.is_admin() || article.user_id == self.id
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Author => "author",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "author" => Ok(Role::Author),
            _ => Err(UnknownValue::new(s)),
        }
    }
}
