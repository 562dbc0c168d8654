use serde_json::Value;
use tokio::sync::watch;

use super::ArticleForm;

/// 富文本编辑器
///
/// 编辑器同时提供渲染后的 HTML 和结构化文档，每次内容变化时递增修订号。
pub trait RichTextEditor {
    /// 当前内容的 HTML
    fn html(&self) -> String;

    /// 当前内容的结构化文档，没有时返回 `None`
    fn document(&self) -> Option<Value>;

    /// 订阅内容变化，接收到的值是修订号
    fn subscribe(&mut self) -> watch::Receiver<u64>;

    /// 释放编辑器资源
    fn destroy(&mut self);
}

/// 编辑器与表单的绑定
///
/// 创建时订阅编辑器并立即同步一次内容；析构时取消订阅并销毁编辑器，且只销毁一次。
pub struct EditorBinding<E: RichTextEditor> {
    editor: Option<E>,
    updates: Option<watch::Receiver<u64>>,
    dirty: bool,
}

impl<E: RichTextEditor> EditorBinding<E> {
    pub fn attach(mut editor: E, form: &mut ArticleForm) -> Self {
        let mut updates = editor.subscribe();
        updates.mark_unchanged();
        form.sync_from_editor(editor.html(), editor.document());

        Self {
            editor: Some(editor),
            updates: Some(updates),
            dirty: false,
        }
    }

    /// 编辑器有新内容时同步到表单，返回是否发生了同步
    pub fn sync(&mut self, form: &mut ArticleForm) -> bool {
        let (Some(editor), Some(updates)) = (self.editor.as_ref(), self.updates.as_mut()) else {
            return false;
        };

        if !self.dirty && !updates.has_changed().unwrap_or(false) {
            return false;
        }
        updates.borrow_and_update();
        self.dirty = false;

        form.sync_from_editor(editor.html(), editor.document());
        true
    }

    /// 等待下一次内容变化
    ///
    /// 编辑器已销毁或不再发送变化时返回 `false`。
    pub async fn changed(&mut self) -> bool {
        let Some(updates) = self.updates.as_mut() else {
            return false;
        };
        if updates.changed().await.is_err() {
            return false;
        }
        self.dirty = true;
        true
    }

    pub fn editor(&self) -> Option<&E> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut E> {
        self.editor.as_mut()
    }
}

impl<E: RichTextEditor> Drop for EditorBinding<E> {
    fn drop(&mut self) {
        self.updates.take();
        if let Some(mut editor) = self.editor.take() {
            editor.destroy();
        }
    }
}
