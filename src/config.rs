use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

/// 默认监听地址
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
/// 封面图默认上传上限：5 MiB
pub const DEFAULT_MAX_UPLOAD: usize = 5 * 1024 * 1024;

/// 文章存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    /// 进程内存储，重启后数据丢失
    Memory,
}

/// 服务配置
///
/// 先读取 `NOTEDESK_CONFIG` 指向的 TOML 文件（可选），再用环境变量覆盖：
///
/// - `NOTEDESK_BIND`：监听地址
/// - `NOTEDESK_STORAGE`：`postgres` 或 `memory`
/// - `DATABASE_URL`：PostgreSQL 连接串
/// - `NOTEDESK_MIGRATIONS`：启动时执行的 SQL 文件
/// - `NOTEDESK_BLOB_DIR`：blob 存储目录
/// - `NOTEDESK_MAX_UPLOAD`：封面图上传上限（字节）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub migrations: Option<PathBuf>,
    pub blob_dir: PathBuf,
    pub max_upload: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },

    #[error("DATABASE_URL is required for the postgres storage backend")]
    MissingDatabaseUrl,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            storage: StorageBackend::default(),
            database_url: None,
            migrations: None,
            blob_dir: PathBuf::from("storage"),
            max_upload: DEFAULT_MAX_UPLOAD,
        }
    }
}

impl Config {
    /// 从 TOML 文本解析配置
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// 从 TOML 文件读取配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// 从配置文件和环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = match env::var_os("NOTEDESK_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.overlay(|name| env::var(name).ok())
    }

    /// 用 `lookup` 提供的变量覆盖配置，并检查后端所需的设置
    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(bind) = lookup("NOTEDESK_BIND") {
            self.bind = bind;
        }
        if let Some(storage) = lookup("NOTEDESK_STORAGE") {
            self.storage = match storage.trim().to_ascii_lowercase().as_str() {
                "postgres" => StorageBackend::Postgres,
                "memory" => StorageBackend::Memory,
                _ => {
                    return Err(ConfigError::InvalidVar {
                        name: "NOTEDESK_STORAGE",
                        value: storage,
                    });
                }
            };
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(path) = lookup("NOTEDESK_MIGRATIONS") {
            self.migrations = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup("NOTEDESK_BLOB_DIR") {
            self.blob_dir = PathBuf::from(dir);
        }
        if let Some(max) = lookup("NOTEDESK_MAX_UPLOAD") {
            self.max_upload = max.trim().parse().map_err(|_| ConfigError::InvalidVar {
                name: "NOTEDESK_MAX_UPLOAD",
                value: max,
            })?;
        }

        if self.storage == StorageBackend::Postgres && self.database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        Ok(self)
    }
}
