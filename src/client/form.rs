use serde_json::Value;

use super::CroppedImage;
use crate::content::{Article, ArticleFields, ArticleInput, FieldErrors};

/// 表单中的封面图
#[derive(Debug, Clone, Default, PartialEq)]
pub enum HeroImage {
    /// 没有封面图
    #[default]
    Absent,
    /// 已保存的封面图，提交时不改动
    Stored(String),
    /// 新裁剪的图片，提交时上传
    Upload(CroppedImage),
    /// 删除已保存的封面图
    Removed,
}

impl HeroImage {
    pub fn is_present(&self) -> bool {
        matches!(self, HeroImage::Stored(_) | HeroImage::Upload(_))
    }
}

/// 文章表单的草稿状态
///
/// 新建时为空表单，编辑时从已有文章填充。
#[derive(Debug, Clone, Default)]
pub struct ArticleForm {
    pub title: String,
    pub content_html: String,
    pub content_json: Option<String>,
    pub category_id: Option<String>,
    pub sub_category_id: Option<String>,
    hero_img: HeroImage,
    /// 编辑前已保存的封面图
    original_hero: Option<String>,
    errors: FieldErrors,
    processing: bool,
}

impl ArticleForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_article(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            content_html: article.content_html.clone(),
            content_json: article.content_json.as_ref().map(Value::to_string),
            category_id: article.category_id.clone(),
            sub_category_id: article.sub_category_id.clone(),
            hero_img: match &article.hero_img {
                Some(reference) => HeroImage::Stored(reference.clone()),
                None => HeroImage::Absent,
            },
            original_hero: article.hero_img.clone(),
            ..Self::default()
        }
    }

    /// 写入编辑器的两种内容形式，重复写入相同内容没有副作用
    pub fn sync_from_editor(&mut self, html: String, document: Option<Value>) {
        self.content_html = html;
        self.content_json = document.map(|doc| doc.to_string());
    }

    pub fn hero_img(&self) -> &HeroImage {
        &self.hero_img
    }

    /// 编辑前已保存的封面图引用
    pub fn original_hero(&self) -> Option<&str> {
        self.original_hero.as_deref()
    }

    /// 使用新裁剪的图片作为封面图
    pub fn select_hero(&mut self, image: CroppedImage) {
        self.hero_img = HeroImage::Upload(image);
    }

    /// 移除封面图
    ///
    /// 已保存的封面图标记为删除；只是尚未上传的图片则直接丢弃。
    pub fn remove_hero(&mut self) {
        self.hero_img = match self.original_hero {
            Some(_) => HeroImage::Removed,
            None => HeroImage::Absent,
        };
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// 用最近一次提交的错误替换当前错误
    pub fn merge_errors(&mut self, errors: FieldErrors) {
        self.errors = errors;
    }

    pub fn clear_errors(&mut self) {
        self.errors = FieldErrors::default();
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub(crate) fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }

    pub fn to_input(&self) -> ArticleInput {
        ArticleInput {
            title: self.title.clone(),
            content_html: self.content_html.clone(),
            content_json: self.content_json.clone(),
            category_id: self.category_id.clone(),
            sub_category_id: self.sub_category_id.clone(),
        }
    }

    /// 与服务端一致的本地校验
    pub fn validate(&self) -> Result<ArticleFields, FieldErrors> {
        self.to_input().validate()
    }
}
