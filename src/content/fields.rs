use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// 标题最大长度（按字符计）
const TITLE_MAX_CHARS: usize = 255;

/// 选取响应 `message` 时的字段顺序，未列出的字段排在最后
const FIELD_PRIORITY: [&str; 6] = [
    "title",
    "content_html",
    "content_json",
    "category_id",
    "sub_category_id",
    "hero_img",
];

/// 按字段名归类的校验错误
///
/// 序列化后形如 `{"title": ["The title field is required."]}`。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为字段追加一条错误信息
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// 合并另一组错误
    pub fn extend(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// 按字段顺序的第一条错误信息，用于响应中的 `message`
    pub fn first_message(&self) -> Option<&str> {
        self.0
            .iter()
            .filter(|(_, messages)| !messages.is_empty())
            .min_by_key(|(field, _)| {
                FIELD_PRIORITY
                    .iter()
                    .position(|p| p == field)
                    .unwrap_or(FIELD_PRIORITY.len())
            })
            .and_then(|(_, messages)| messages.first())
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in self.iter() {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// 表单提交的原始文章字段，尚未校验
#[derive(Debug, Clone, Default)]
pub struct ArticleInput {
    pub title: String,
    pub content_html: String,
    /// 结构化文档的 JSON 文本，空串等同于未提供
    pub content_json: Option<String>,
    pub category_id: Option<String>,
    pub sub_category_id: Option<String>,
}

/// 校验通过的文章字段
///
/// 更新时整体替换，不做局部合并。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleFields {
    pub title: String,
    pub content_html: String,
    pub content_json: Option<serde_json::Value>,
    pub category_id: Option<String>,
    pub sub_category_id: Option<String>,
}

impl ArticleInput {
    /// 校验并转换为 [`ArticleFields`]
    ///
    /// - `title`：必填，去除首尾空白后不能为空，最长 255 字符
    /// - `content_html`：必填
    /// - `content_json`：可选，提供时必须是合法 JSON
    /// - 所有文本字段都不能包含 NUL 字符，数据库不接受
    ///
    /// `content_json` 只做语法校验，不与 `content_html` 做结构比对。
    pub fn validate(&self) -> Result<ArticleFields, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim();
        if title.contains('\0') {
            errors.add("title", "The title field contains invalid characters.");
        } else if title.is_empty() {
            errors.add("title", "The title field is required.");
        } else if title.chars().count() > TITLE_MAX_CHARS {
            errors.add(
                "title",
                format!("The title may not be greater than {TITLE_MAX_CHARS} characters."),
            );
        }

        if self.content_html.contains('\0') {
            errors.add("content_html", "The content html field contains invalid characters.");
        } else if self.content_html.trim().is_empty() {
            errors.add("content_html", "The content html field is required.");
        }

        let content_json = match non_blank(self.content_json.as_deref()) {
            None => None,
            Some(raw) => match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(value) if contains_nul(&value) => {
                    errors.add(
                        "content_json",
                        "The content json field contains invalid characters.",
                    );
                    None
                }
                Ok(value) => Some(value),
                Err(_) => {
                    errors.add("content_json", "The content json must be a valid JSON string.");
                    None
                }
            },
        };

        for (field, value) in [
            ("category_id", &self.category_id),
            ("sub_category_id", &self.sub_category_id),
        ] {
            if value.as_deref().is_some_and(|v| v.contains('\0')) {
                let name = field.replace('_', " ");
                errors.add(field, format!("The {name} field contains invalid characters."));
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ArticleFields {
            title: title.to_string(),
            content_html: self.content_html.clone(),
            content_json,
            category_id: non_blank(self.category_id.as_deref()).map(str::to_string),
            sub_category_id: non_blank(self.sub_category_id.as_deref()).map(str::to_string),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// 文档中任一字符串或键是否含 NUL
fn contains_nul(value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match value {
        Value::String(s) => s.contains('\0'),
        Value::Array(items) => items.iter().any(contains_nul),
        Value::Object(map) => map.iter().any(|(k, v)| k.contains('\0') || contains_nul(v)),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str, html: &str) -> ArticleInput {
        ArticleInput {
            title: title.to_string(),
            content_html: html.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_input() {
        let fields = input("  Hello ", "<p>Hi</p>").validate().expect("should pass");
        assert_eq!(fields.title, "Hello");
        assert_eq!(fields.content_html, "<p>Hi</p>");
        assert!(fields.content_json.is_none());
        assert!(fields.category_id.is_none());
    }

    #[test]
    fn test_empty_title_and_content() {
        let errors = input("   ", "").validate().unwrap_err();
        assert_eq!(
            errors.get("title"),
            Some(&["The title field is required.".to_string()][..])
        );
        assert!(errors.contains("content_html"));
        assert!(!errors.contains("content_json"));
    }

    #[test]
    fn test_title_too_long() {
        let errors = input(&"a".repeat(256), "<p>x</p>").validate().unwrap_err();
        assert!(errors.contains("title"));
    }

    #[test]
    fn test_content_json_must_parse() {
        let mut raw = input("Hello", "<p>Hi</p>");
        raw.content_json = Some("{not json".to_string());
        let errors = raw.validate().unwrap_err();
        assert!(errors.contains("content_json"));

        raw.content_json = Some(r#"{"type":"doc","content":[]}"#.to_string());
        let fields = raw.validate().unwrap();
        assert_eq!(fields.content_json.unwrap()["type"], "doc");
    }

    #[test]
    fn test_blank_optionals_become_none() {
        let mut raw = input("Hello", "<p>Hi</p>");
        raw.content_json = Some(String::new());
        raw.category_id = Some(" ".to_string());
        raw.sub_category_id = Some("news".to_string());

        let fields = raw.validate().unwrap();
        assert!(fields.content_json.is_none());
        assert!(fields.category_id.is_none());
        assert_eq!(fields.sub_category_id.as_deref(), Some("news"));
    }

    #[test]
    fn test_field_errors_serialize_and_merge() {
        let mut errors = FieldErrors::new();
        errors.add("title", "a");
        let mut other = FieldErrors::new();
        other.add("title", "b");
        other.add("hero_img", "c");
        errors.extend(other);

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["title"], serde_json::json!(["a", "b"]));
        assert_eq!(json["hero_img"], serde_json::json!(["c"]));
        assert_eq!(errors.first_message(), Some("a"));
        assert_eq!(errors.to_string(), "hero_img: c; title: a; title: b");
    }

    #[test]
    fn test_first_message_follows_field_order() {
        let errors = input("", "").validate().unwrap_err();
        assert_eq!(errors.first_message(), Some("The title field is required."));

        let mut errors = FieldErrors::new();
        errors.add("zzz", "z");
        errors.add("hero_img", "h");
        errors.add("content_json", "j");
        assert_eq!(errors.first_message(), Some("j"));

        let mut unknown = FieldErrors::new();
        unknown.add("b", "second");
        unknown.add("a", "first");
        assert_eq!(unknown.first_message(), Some("first"));
        assert_eq!(FieldErrors::new().first_message(), None);
    }

    #[test]
    fn test_nul_characters_rejected() {
        let errors = input("Hel\0lo", "<p>\0</p>").validate().unwrap_err();
        assert_eq!(
            errors.get("title"),
            Some(&["The title field contains invalid characters.".to_string()][..])
        );
        assert!(errors.contains("content_html"));

        let mut raw = input("Hello", "<p>Hi</p>");
        raw.content_json = Some(r#"{"type":"doc","content":[{"type":"text","text":"a\u0000b"}]}"#.to_string());
        let errors = raw.validate().unwrap_err();
        assert_eq!(
            errors.get("content_json"),
            Some(&["The content json field contains invalid characters.".to_string()][..])
        );

        raw.content_json = Some(r#"{"ke\u0000y":1}"#.to_string());
        assert!(raw.validate().unwrap_err().contains("content_json"));

        raw.content_json = None;
        raw.category_id = Some("news\0".to_string());
        let errors = raw.validate().unwrap_err();
        assert_eq!(
            errors.get("category_id"),
            Some(&["The category id field contains invalid characters.".to_string()][..])
        );
    }
}
