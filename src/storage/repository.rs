use std::future::Future;

use uuid::Uuid;

use crate::{
    content::{Article, ArticleFields, ArticleStatus},
    error::Result,
};

/// 更新文章时对封面图引用的处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeroRef<'a> {
    /// 保持原引用不变
    Keep,
    /// 指向新存储的 blob
    Set(&'a str),
    /// 清空引用
    Clear,
}

/// 更新结果，附带更新前的封面图引用，供调用方清理旧 blob
#[derive(Debug)]
pub struct Replaced {
    pub article: Article,
    pub previous_hero: Option<String>,
}

/// 文章持久化接口
///
/// 已软删除的文章对所有查询不可见。每个方法本身是原子的。
pub trait ArticleRepository: Send + Sync {
    /// 新建一篇草稿
    fn create(
        &self,
        user_id: &str,
        fields: &ArticleFields,
        hero_img: Option<&str>,
    ) -> impl Future<Output = Result<Article>> + Send;

    /// 整体替换文章字段
    ///
    /// 文章不存在时返回 `None`。
    fn update(
        &self,
        id: Uuid,
        fields: &ArticleFields,
        hero: HeroRef<'_>,
    ) -> impl Future<Output = Result<Option<Replaced>>> + Send;

    /// 查询单篇文章
    fn find(&self, id: Uuid) -> impl Future<Output = Result<Option<Article>>> + Send;

    /// 按创建时间倒序列出文章
    ///
    /// `owner` 为 `None` 时返回所有人的文章。
    fn list(
        &self,
        owner: Option<&str>,
        status: Option<ArticleStatus>,
    ) -> impl Future<Output = Result<Vec<Article>>> + Send;

    /// 仅当当前状态仍为 `from` 时写入 `to`
    ///
    /// 文章不存在或状态已被其他请求改变时返回 `None`。
    fn set_status(
        &self,
        id: Uuid,
        from: ArticleStatus,
        to: ArticleStatus,
    ) -> impl Future<Output = Result<Option<Article>>> + Send;

    /// 软删除，返回是否有文章被删除
    fn soft_delete(&self, id: Uuid) -> impl Future<Output = Result<bool>> + Send;
}
