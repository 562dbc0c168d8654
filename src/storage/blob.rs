use std::{
    future::Future,
    io,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use uuid::Uuid;

use crate::error::{Error, Result};

/// 二进制对象存储
///
/// 对象通过 `store` 返回的引用字符串定位，例如 `hero_images/<uuid>.jpg`。
pub trait BlobStore: Send + Sync {
    /// 将 `bytes` 存入 `namespace`，返回引用
    fn store(
        &self,
        bytes: &[u8],
        namespace: &str,
        extension: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// 删除引用对应的对象，对象不存在时视为成功
    fn delete(&self, reference: &str) -> impl Future<Output = Result<()>> + Send;

    /// 引用对应的对象是否存在
    fn exists(&self, reference: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// 基于本地文件系统的 [`BlobStore`]
#[derive(Clone)]
pub struct FsBlobStore {
    root: Arc<Path>,
}

impl FsBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: Arc::<Path>::from(root.as_ref()),
        }
    }

    /// 存储根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 将引用解析为根目录下的路径
    ///
    /// 绝对路径、`..` 等越出根目录的引用会被拒绝。
    fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let relative = Path::new(reference);
        let is_plain = !reference.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_plain {
            return Err(Error::FormatError("invalid blob reference"));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    async fn store(&self, bytes: &[u8], namespace: &str, extension: &str) -> Result<String> {
        let reference = format!("{namespace}/{}.{extension}", Uuid::new_v4());
        let path = self.resolve(&reference)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(%reference, size = bytes.len(), "blob stored");
        Ok(reference)
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        let path = self.resolve(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(%reference, "blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, reference: &str) -> Result<bool> {
        let path = self.resolve(reference)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}
