use std::fmt::Write as _;

use serde_json::Value;
use tokio::sync::watch;

use super::RichTextEditor;

/// 基于结构化文档的编辑器
///
/// 文档形如 `{"type": "doc", "content": [...]}`，节点和标记与 Tiptap 一致。
/// 只有 HTML 而没有文档的文章以 HTML 原样保存，直到第一次设置文档。
pub struct DocumentEditor {
    content: Content,
    revision: watch::Sender<u64>,
    destroyed: bool,
}

enum Content {
    Document(Value),
    Html(String),
}

impl DocumentEditor {
    pub fn from_html(html: impl Into<String>) -> Self {
        Self::with_content(Content::Html(html.into()))
    }

    pub fn from_document(document: Value) -> Self {
        Self::with_content(Content::Document(document))
    }

    /// 按文章已有内容创建：优先使用结构化文档
    pub fn from_article(document: Option<&Value>, html: &str) -> Self {
        match document {
            Some(doc) if doc.is_object() => Self::from_document(doc.clone()),
            _ => Self::from_html(html),
        }
    }

    fn with_content(content: Content) -> Self {
        Self {
            content,
            revision: watch::Sender::new(0),
            destroyed: false,
        }
    }

    /// 替换文档内容并通知订阅者
    pub fn set_document(&mut self, document: Value) {
        if self.destroyed {
            return;
        }
        self.content = Content::Document(document);
        self.revision.send_modify(|r| *r += 1);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl RichTextEditor for DocumentEditor {
    fn html(&self) -> String {
        match &self.content {
            Content::Document(doc) => render_html(doc),
            Content::Html(html) => html.clone(),
        }
    }

    fn document(&self) -> Option<Value> {
        match &self.content {
            Content::Document(doc) => Some(doc.clone()),
            Content::Html(_) => None,
        }
    }

    fn subscribe(&mut self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        // 关闭通道，订阅者的 changed() 随即返回错误
        let last = *self.revision.borrow();
        self.revision = watch::Sender::new(last);
    }
}

/// 把文档渲染为 HTML
///
/// 未知节点只渲染其子节点，未知标记被忽略。文本和属性值都会转义。
pub fn render_html(document: &Value) -> String {
    let mut out = String::new();
    render_node(document, &mut out);
    out
}

fn render_node(node: &Value, out: &mut String) {
    let attrs = node.get("attrs");
    let attr = |name: &str| attrs.and_then(|a| a.get(name));

    match node.get("type").and_then(Value::as_str).unwrap_or_default() {
        "text" => render_text(node, out),
        "paragraph" => wrap(node, out, "p", &align(attr("textAlign"))),
        "heading" => {
            let level = attr("level").and_then(Value::as_u64).unwrap_or(1).clamp(1, 6);
            wrap(node, out, &format!("h{level}"), &align(attr("textAlign")));
        }
        "blockquote" => wrap(node, out, "blockquote", ""),
        "bulletList" => wrap(node, out, "ul", ""),
        "orderedList" => {
            let attrs = match attr("start").and_then(Value::as_u64) {
                Some(start) if start != 1 => format!(" start=\"{start}\""),
                _ => String::new(),
            };
            wrap(node, out, "ol", &attrs);
        }
        "listItem" => wrap(node, out, "li", ""),
        "codeBlock" => {
            let class = match attr("language").and_then(Value::as_str) {
                Some(lang) if !lang.is_empty() => {
                    format!(" class=\"language-{}\"", escape(lang))
                }
                _ => String::new(),
            };
            out.push_str("<pre><code");
            out.push_str(&class);
            out.push('>');
            render_children(node, out);
            out.push_str("</code></pre>");
        }
        "hardBreak" => out.push_str("<br>"),
        "horizontalRule" => out.push_str("<hr>"),
        _ => render_children(node, out),
    }
}

fn render_children(node: &Value, out: &mut String) {
    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children {
            render_node(child, out);
        }
    }
}

fn wrap(node: &Value, out: &mut String, tag: &str, attrs: &str) {
    let _ = write!(out, "<{tag}{attrs}>");
    render_children(node, out);
    let _ = write!(out, "</{tag}>");
}

fn align(value: Option<&Value>) -> String {
    match value.and_then(Value::as_str) {
        Some(a @ ("center" | "right" | "justify")) => format!(" style=\"text-align: {a}\""),
        _ => String::new(),
    }
}

fn render_text(node: &Value, out: &mut String) {
    let text = node.get("text").and_then(Value::as_str).unwrap_or_default();
    let marks = node
        .get("marks")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut closing = Vec::with_capacity(marks.len());
    for mark in marks {
        let tag = match mark.get("type").and_then(Value::as_str) {
            Some("bold") => "strong",
            Some("italic") => "em",
            Some("strike") => "s",
            Some("underline") => "u",
            Some("code") => "code",
            Some("link") => {
                let href = mark
                    .get("attrs")
                    .and_then(|a| a.get("href"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let _ = write!(out, "<a href=\"{}\">", escape(href));
                closing.push("a");
                continue;
            }
            _ => continue,
        };
        let _ = write!(out, "<{tag}>");
        closing.push(tag);
    }

    out.push_str(&escape(text));

    for tag in closing.iter().rev() {
        let _ = write!(out, "</{tag}>");
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_render_paragraph_with_marks() {
        let doc = json!({
            "type": "doc",
            "content": [{
                "type": "paragraph",
                "content": [
                    {"type": "text", "text": "Hi "},
                    {"type": "text", "text": "there", "marks": [{"type": "bold"}, {"type": "italic"}]},
                ]
            }]
        });
        assert_eq!(render_html(&doc), "<p>Hi <strong><em>there</em></strong></p>");
    }

    #[test]
    fn test_render_blocks() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "heading", "attrs": {"level": 2, "textAlign": "center"},
                 "content": [{"type": "text", "text": "Title"}]},
                {"type": "bulletList", "content": [
                    {"type": "listItem", "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "one"}]}
                    ]}
                ]},
                {"type": "orderedList", "attrs": {"start": 3}, "content": []},
                {"type": "codeBlock", "attrs": {"language": "rust"},
                 "content": [{"type": "text", "text": "a < b"}]},
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "x"}, {"type": "hardBreak"}, {"type": "text", "text": "y"}
                ]},
                {"type": "horizontalRule"},
                {"type": "blockquote", "content": [{"type": "paragraph", "attrs": {"textAlign": "left"}}]},
            ]
        });

        assert_eq!(
            render_html(&doc),
            concat!(
                "<h2 style=\"text-align: center\">Title</h2>",
                "<ul><li><p>one</p></li></ul>",
                "<ol start=\"3\"></ol>",
                "<pre><code class=\"language-rust\">a &lt; b</code></pre>",
                "<p>x<br>y</p>",
                "<hr>",
                "<blockquote><p></p></blockquote>",
            )
        );
    }

    #[test]
    fn test_escape_text_and_link() {
        let doc = json!({
            "type": "paragraph",
            "content": [{
                "type": "text",
                "text": "<script>",
                "marks": [{"type": "link", "attrs": {"href": "https://x.io/?a=1&b=\"2\""}}]
            }]
        });
        assert_eq!(
            render_html(&doc),
            "<p><a href=\"https://x.io/?a=1&amp;b=&quot;2&quot;\">&lt;script&gt;</a></p>"
        );
    }

    #[test]
    fn test_editor_notifies_and_destroys() {
        let mut editor = DocumentEditor::from_article(None, "<p>old</p>");
        assert_eq!(editor.html(), "<p>old</p>");
        assert!(editor.document().is_none());

        let mut rx = editor.subscribe();
        editor.set_document(json!({"type": "doc", "content": [{"type": "paragraph"}]}));
        assert!(rx.has_changed().unwrap());
        assert_eq!(editor.html(), "<p></p>");
        assert_eq!(editor.document().unwrap()["type"], "doc");

        rx.mark_unchanged();
        editor.destroy();
        assert!(editor.is_destroyed());
        assert!(rx.has_changed().is_err());

        editor.set_document(json!({"type": "doc"}));
        assert_eq!(editor.html(), "<p></p>");
    }
}
