use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::{
    content::{Article, ArticleFields, ArticleStatus, CurrentUser, StatusAction},
    error::{Error, Result},
    storage::{ArticleRepository, BlobStore, HeroRef},
};

/// 封面图在 blob 存储中的命名空间
pub const HERO_NAMESPACE: &str = "hero_images";

/// 新上传的封面图
#[derive(Debug, Clone)]
pub struct HeroUpload {
    pub bytes: Vec<u8>,
    /// 文件扩展名，由图片格式决定
    pub extension: &'static str,
}

/// 提交中对封面图的处理方式
#[derive(Debug, Clone, Default)]
pub enum HeroUpdate {
    /// 不改动已有封面图
    #[default]
    Keep,
    /// 替换为新图片
    Replace(HeroUpload),
    /// 删除已有封面图
    Remove,
}

/// 一次完整的文章提交，字段已校验
#[derive(Debug, Clone)]
pub struct ArticleSubmission {
    pub fields: ArticleFields,
    pub hero: HeroUpdate,
}

/// 文章业务逻辑：权限、状态迁移与封面图替换顺序
///
/// 封面图替换顺序固定为：先存新图 → 更新文章 → 删除旧图。
/// 文章更新失败时删除新图，旧图保持不变；
/// 旧图删除失败只记录日志，不影响本次更新。
pub struct ArticleService<R, B> {
    repo: Arc<R>,
    blobs: Arc<B>,
}

impl<R, B> Clone for ArticleService<R, B> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            blobs: self.blobs.clone(),
        }
    }
}

impl<R: ArticleRepository, B: BlobStore> ArticleService<R, B> {
    pub fn new(repo: R, blobs: B) -> Self {
        Self {
            repo: Arc::new(repo),
            blobs: Arc::new(blobs),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// 列出当前用户可见的文章，按创建时间倒序
    pub async fn list(
        &self,
        user: &CurrentUser,
        status: Option<ArticleStatus>,
    ) -> Result<Vec<Article>> {
        self.repo.list(user.owner_filter(), status).await
    }

    /// 查询单篇文章，非作者且非管理员视为不存在
    pub async fn show(&self, user: &CurrentUser, id: Uuid) -> Result<Article> {
        self.repo
            .find(id)
            .await?
            .filter(|article| user.can_manage(article))
            .ok_or(Error::NotFound)
    }

    #[instrument(skip_all, fields(user = %user.id))]
    pub async fn create(&self, user: &CurrentUser, submission: ArticleSubmission) -> Result<Article> {
        let hero = match &submission.hero {
            HeroUpdate::Replace(upload) => Some(self.store_hero(upload).await?),
            HeroUpdate::Keep | HeroUpdate::Remove => None,
        };

        match self
            .repo
            .create(&user.id, &submission.fields, hero.as_deref())
            .await
        {
            Ok(article) => {
                tracing::info!(id = %article.id, "article created");
                Ok(article)
            }
            Err(e) => {
                if let Some(reference) = hero {
                    self.discard_blob(&reference).await;
                }
                Err(e)
            }
        }
    }

    #[instrument(skip_all, fields(user = %user.id, %id))]
    pub async fn update(
        &self,
        user: &CurrentUser,
        id: Uuid,
        submission: ArticleSubmission,
    ) -> Result<Article> {
        self.show(user, id).await?;

        let new_hero = match &submission.hero {
            HeroUpdate::Replace(upload) => Some(self.store_hero(upload).await?),
            HeroUpdate::Keep | HeroUpdate::Remove => None,
        };
        let hero_ref = match (&submission.hero, &new_hero) {
            (_, Some(reference)) => HeroRef::Set(reference),
            (HeroUpdate::Remove, None) => HeroRef::Clear,
            _ => HeroRef::Keep,
        };

        let replaced = match self.repo.update(id, &submission.fields, hero_ref).await {
            Ok(Some(replaced)) => replaced,
            Ok(None) => {
                if let Some(reference) = &new_hero {
                    self.discard_blob(reference).await;
                }
                return Err(Error::NotFound);
            }
            Err(e) => {
                if let Some(reference) = &new_hero {
                    self.discard_blob(reference).await;
                }
                return Err(e);
            }
        };

        if hero_ref != HeroRef::Keep {
            if let Some(previous) = replaced.previous_hero.as_deref() {
                if Some(previous) != new_hero.as_deref() {
                    self.discard_blob(previous).await;
                }
            }
        }

        tracing::info!("article updated");
        Ok(replaced.article)
    }

    /// 软删除文章，封面图保留以便恢复
    #[instrument(skip_all, fields(user = %user.id, %id))]
    pub async fn delete(&self, user: &CurrentUser, id: Uuid) -> Result<()> {
        self.show(user, id).await?;

        if !self.repo.soft_delete(id).await? {
            return Err(Error::NotFound);
        }

        tracing::info!("article deleted");
        Ok(())
    }

    /// 执行状态迁移
    ///
    /// 目标状态与当前状态相同时不写库，直接返回文章。
    /// 写入以读取到的状态为前提，并发迁移中只有一个能成功。
    #[instrument(skip_all, fields(user = %user.id, %id, %action))]
    pub async fn transition(
        &self,
        user: &CurrentUser,
        id: Uuid,
        action: StatusAction,
    ) -> Result<Article> {
        let article = self.show(user, id).await?;

        let target = article
            .status
            .transition(action)
            .ok_or(Error::InvalidTransition {
                from: article.status,
                action,
            })?;

        if target == article.status {
            return Ok(article);
        }

        match self.repo.set_status(id, article.status, target).await? {
            Some(article) => {
                tracing::info!(status = %article.status, "article status changed");
                Ok(article)
            }
            None => {
                // 读取之后状态已被其他请求改变
                let current = self.repo.find(id).await?.ok_or(Error::NotFound)?;
                if current.status == target {
                    return Ok(current);
                }
                tracing::warn!(status = %current.status, "article status changed concurrently");
                Err(Error::InvalidTransition {
                    from: current.status,
                    action,
                })
            }
        }
    }

    async fn store_hero(&self, upload: &HeroUpload) -> Result<String> {
        self.blobs
            .store(&upload.bytes, HERO_NAMESPACE, upload.extension)
            .await
    }

    /// 删除不再被引用的 blob，失败只记录日志
    async fn discard_blob(&self, reference: &str) {
        if let Err(e) = self.blobs.delete(reference).await {
            tracing::warn!(%reference, error = %e, "failed to delete stale blob");
        }
    }
}
