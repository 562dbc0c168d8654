use axum::{
    extract::{Multipart, multipart::Field},
    http::Method,
};
use image::ImageFormat;

use crate::{
    content::{ArticleInput, FieldErrors},
    error::{Error, Result},
    service::{ArticleSubmission, HeroUpdate, HeroUpload},
};

/// 从 multipart 表单读取的文章提交
///
/// 支持的字段：`_method`、`title`、`content_html`、`content_json`、`category_id`、
/// `sub_category_id`、`hero_img`（文件）、`remove_hero_img`。其余字段忽略。
#[derive(Debug, Default)]
pub struct SubmittedForm {
    /// `_method` 覆盖的 HTTP 方法
    pub method: Option<Method>,
    input: ArticleInput,
    hero: HeroUpdate,
    remove_hero: bool,
    errors: FieldErrors,
}

impl SubmittedForm {
    /// 读取整个表单，封面图超过 `max_upload` 字节时记为字段错误
    pub async fn read(mut multipart: Multipart, max_upload: usize) -> Result<Self> {
        let mut form = SubmittedForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match name.as_str() {
                "_method" => {
                    let value = field.text().await?;
                    let method = Method::from_bytes(value.trim().to_ascii_uppercase().as_bytes())
                        .map_err(|_| Error::FormatError("invalid _method override"))?;
                    form.method = Some(method);
                }
                "title" => form.input.title = field.text().await?,
                "content_html" => form.input.content_html = field.text().await?,
                "content_json" => form.input.content_json = Some(field.text().await?),
                "category_id" => form.input.category_id = Some(field.text().await?),
                "sub_category_id" => form.input.sub_category_id = Some(field.text().await?),
                "remove_hero_img" => {
                    let value = field.text().await?;
                    form.remove_hero = matches!(value.trim(), "1" | "true" | "on");
                }
                "hero_img" => form.read_hero(field, max_upload).await?,
                _ => {}
            }
        }

        Ok(form)
    }

    async fn read_hero(&mut self, field: Field<'_>, max_upload: usize) -> Result<()> {
        let declared_image = field
            .content_type()
            .is_none_or(|ct| ct.starts_with("image/"));
        let bytes = field.bytes().await?;

        // 浏览器在未选择文件时会提交空的文件字段
        if bytes.is_empty() {
            return Ok(());
        }

        if bytes.len() > max_upload {
            self.errors.add(
                "hero_img",
                format!(
                    "The hero img may not be greater than {} kilobytes.",
                    max_upload / 1024
                ),
            );
            return Ok(());
        }

        match image_extension(&bytes) {
            Some(extension) if declared_image => {
                self.hero = HeroUpdate::Replace(HeroUpload {
                    bytes: bytes.to_vec(),
                    extension,
                });
            }
            _ => self.errors.add("hero_img", "The hero img must be an image."),
        }
        Ok(())
    }

    /// 校验字段并转换为 [`ArticleSubmission`]
    ///
    /// 同时提供新图片和删除标记时以新图片为准。
    pub fn into_submission(self) -> Result<ArticleSubmission> {
        let mut errors = self.errors;

        let fields = match self.input.validate() {
            Ok(fields) => Some(fields),
            Err(field_errors) => {
                errors.extend(field_errors);
                None
            }
        };

        match fields {
            Some(fields) if errors.is_empty() => {
                let hero = match self.hero {
                    HeroUpdate::Keep if self.remove_hero => HeroUpdate::Remove,
                    hero => hero,
                };
                Ok(ArticleSubmission { fields, hero })
            }
            _ => Err(Error::Validation(errors)),
        }
    }
}

/// 根据文件头判断图片格式，返回存储用的扩展名
fn image_extension(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        _ => None,
    }
}
