use std::{path::Path, sync::Arc};

use axum::extract::FromRef;

use crate::service::ArticleService;

/// 应用程序上下文
///
/// [`AppState`] 封装了文章服务、blob 存储目录和上传大小限制，提供统一访问入口。
pub struct AppState<R, B> {
    service: ArticleService<R, B>,
    blob_root: Arc<Path>,
    max_upload: usize,
}

impl<R, B> Clone for AppState<R, B> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            blob_root: self.blob_root.clone(),
            max_upload: self.max_upload,
        }
    }
}

impl<R, B> AppState<R, B> {
    /// 创建一个新的 [`AppState`] 实例
    pub fn new(service: ArticleService<R, B>, blob_root: impl AsRef<Path>, max_upload: usize) -> Self {
        Self {
            service,
            blob_root: Arc::<Path>::from(blob_root.as_ref()),
            max_upload,
        }
    }

    /// 获取文章服务
    pub fn service(&self) -> &ArticleService<R, B> {
        &self.service
    }

    /// 获取 blob 存储根目录
    pub fn blob_root(&self) -> &Path {
        &self.blob_root
    }

    /// 封面图上传的最大字节数
    pub fn max_upload(&self) -> usize {
        self.max_upload
    }
}

impl<R, B> FromRef<AppState<R, B>> for ArticleService<R, B> {
    fn from_ref(app: &AppState<R, B>) -> Self {
        app.service.clone()
    }
}
