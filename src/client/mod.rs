//! 文章编辑会话的客户端核心：图片裁剪、裁剪协调、富文本编辑器绑定、表单状态与提交。

mod coordinator;
mod cropper;
mod document;
mod editor;
mod error;
mod form;
mod session;
mod submit;

pub use self::{
    coordinator::CropCoordinator,
    cropper::{AspectRatio, CropError, CropRect, CropSelection, CropSource, CroppedImage, ImageCropper},
    document::{DocumentEditor, render_html},
    editor::{EditorBinding, RichTextEditor},
    error::ClientError,
    form::{ArticleForm, HeroImage},
    session::EditSession,
    submit::{ArticleClient, ClientConfig, MethodMode, SubmitOutcome, Target},
};
