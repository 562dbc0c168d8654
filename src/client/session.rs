use std::sync::Arc;

use super::{
    ArticleClient, ArticleForm, AspectRatio, ClientError, CropCoordinator, CropError, CropRect,
    DocumentEditor, EditorBinding, HeroImage, ImageCropper, RichTextEditor, SubmitOutcome, Target,
};
use crate::content::Article;

/// 一次新建或编辑文章的会话
///
/// 把表单、编辑器绑定和封面图裁剪串起来。会话结束（析构或 [`EditSession::finish`]）时
/// 编辑器被销毁，未完成的裁剪被中止。
pub struct EditSession<E: RichTextEditor> {
    form: ArticleForm,
    binding: EditorBinding<E>,
    cropper: Option<ImageCropper>,
    coordinator: Option<CropCoordinator>,
    target: Target,
}

impl<E: RichTextEditor> EditSession<E> {
    pub fn create(editor: E) -> Self {
        Self::start(ArticleForm::new(), editor, Target::Create)
    }

    /// 编辑已有文章
    ///
    /// 绑定时表单内容即被编辑器内容覆盖：编辑器不提供结构化文档时，
    /// 保存会清空文章的 `content_json`。
    pub fn edit(article: &Article, editor: E) -> Self {
        Self::start(ArticleForm::from_article(article), editor, Target::Update(article.id))
    }

    fn start(mut form: ArticleForm, editor: E, target: Target) -> Self {
        let binding = EditorBinding::attach(editor, &mut form);
        Self {
            form,
            binding,
            cropper: None,
            coordinator: None,
            target,
        }
    }

    pub fn form(&self) -> &ArticleForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut ArticleForm {
        &mut self.form
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn editor_mut(&mut self) -> Option<&mut E> {
        self.binding.editor_mut()
    }

    /// 编辑器内容变化后调用，把内容同步到表单
    pub fn on_editor_change(&mut self) -> bool {
        self.binding.sync(&mut self.form)
    }

    /// 打开待裁剪的图片，返回初始裁剪框
    ///
    /// 图片无法解码时返回错误，表单保持不变。
    pub fn open_image(&mut self, bytes: impl Into<Arc<[u8]>>) -> Result<CropRect, CropError> {
        let cropper = ImageCropper::open(bytes, AspectRatio::HERO)?;
        let mut coordinator = CropCoordinator::new(cropper.source().clone());
        let rect = cropper.rect();
        coordinator.request(rect)?;

        self.cropper = Some(cropper);
        self.coordinator = Some(coordinator);
        Ok(rect)
    }

    pub fn zoom(&mut self, zoom: f64) -> Result<CropRect, CropError> {
        self.adjust(|cropper| cropper.set_zoom(zoom))
    }

    pub fn pan(&mut self, dx: f64, dy: f64) -> Result<CropRect, CropError> {
        self.adjust(|cropper| cropper.pan(dx, dy))
    }

    fn adjust(&mut self, f: impl FnOnce(&mut ImageCropper) -> CropRect) -> Result<CropRect, CropError> {
        let (Some(cropper), Some(coordinator)) = (self.cropper.as_mut(), self.coordinator.as_mut()) else {
            return Err(CropError::NothingSelected);
        };
        let rect = f(cropper);
        coordinator.request(rect)?;
        Ok(rect)
    }

    /// 当前可展示的封面图预览
    ///
    /// 裁剪中时为最近一次完成的裁剪结果，否则为表单中待上传的图片。
    pub fn preview(&self) -> Option<String> {
        if let Some(image) = self.coordinator.as_ref().and_then(CropCoordinator::latest) {
            return Some(image.preview());
        }
        match self.form.hero_img() {
            HeroImage::Upload(image) => Some(image.preview()),
            _ => None,
        }
    }

    /// 等待最后一次裁剪完成并设为封面图，随后关闭裁剪器
    ///
    /// 失败时裁剪器保持打开，表单不变。
    pub async fn save_crop(&mut self) -> Result<CropRect, CropError> {
        let Some(coordinator) = self.coordinator.as_ref() else {
            return Err(CropError::NothingSelected);
        };
        let image = coordinator.save().await?;
        let rect = image.rect();

        self.form.select_hero(image);
        self.cancel_crop();
        Ok(rect)
    }

    /// 关闭裁剪器，丢弃未保存的裁剪
    pub fn cancel_crop(&mut self) {
        self.cropper = None;
        self.coordinator = None;
    }

    pub fn is_cropping(&self) -> bool {
        self.cropper.is_some()
    }

    pub fn remove_hero(&mut self) {
        self.form.remove_hero();
    }

    /// 同步编辑器内容后提交
    pub async fn submit(&mut self, client: &ArticleClient) -> Result<SubmitOutcome, ClientError> {
        self.binding.sync(&mut self.form);
        client.submit(&mut self.form, self.target).await
    }

    /// 结束会话并返回表单，编辑器随之销毁
    pub fn finish(self) -> ArticleForm {
        let Self { form, .. } = self;
        form
    }
}

impl EditSession<DocumentEditor> {
    /// 用文章已有的结构化文档（没有时用 HTML）打开编辑器
    pub fn edit_article(article: &Article) -> Self {
        let editor = DocumentEditor::from_article(article.content_json.as_ref(), &article.content_html);
        Self::edit(article, editor)
    }
}
