use std::ops::{Deref, DerefMut};

use reqwest::{
    Method, Response, StatusCode,
    header::{self, HeaderMap, HeaderValue},
    multipart::{Form, Part},
    redirect,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ArticleForm, ClientError, CroppedImage, HeroImage};
use crate::{
    api::{USER_ID_HEADER, USER_ROLE_HEADER},
    content::{Article, ArticleStatus, CurrentUser, FieldErrors, StatusAction},
};

/// 更新和删除请求的发送方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodMode {
    /// 直接使用 PATCH / DELETE
    Native,
    /// 使用 POST，并在 `_method` 字段中指定真实方法
    #[default]
    Override,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 服务地址，如 `http://localhost:3000`
    pub base_url: String,
    pub method_mode: MethodMode,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            method_mode: MethodMode::default(),
        }
    }
}

/// 提交目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Create,
    Update(Uuid),
}

/// 提交成功后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 服务端要求跳转到的地址
    Redirect(String),
    Done,
}

#[derive(Deserialize)]
struct ValidationBody {
    #[serde(default)]
    errors: FieldErrors,
}

/// 文章服务的 HTTP 客户端
///
/// 不跟随重定向，重定向地址作为 [`SubmitOutcome::Redirect`] 返回。
#[derive(Clone)]
pub struct ArticleClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ArticleClient {
    pub fn new(config: ClientConfig, user: &CurrentUser) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_ID_HEADER,
            HeaderValue::from_str(&user.id).map_err(|_| ClientError::AccessDenied)?,
        );
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static(user.role.as_str()));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// 提交表单
    ///
    /// 先在本地校验，校验失败不会发出请求。提交期间表单处于 processing 状态，
    /// 此时再次提交返回 [`ClientError::InFlight`]。
    /// 服务端返回的字段错误写回表单；其它失败保持表单不变。
    pub async fn submit(
        &self,
        form: &mut ArticleForm,
        target: Target,
    ) -> Result<SubmitOutcome, ClientError> {
        if form.is_processing() {
            return Err(ClientError::InFlight);
        }

        if let Err(errors) = form.validate() {
            form.merge_errors(errors.clone());
            return Err(ClientError::Validation(errors));
        }

        let mut form = Processing::start(form);

        let (method, path, override_method) = match target {
            Target::Create => (Method::POST, "/articles".to_string(), None),
            Target::Update(id) => {
                let path = format!("/articles/{id}");
                match self.config.method_mode {
                    MethodMode::Native => (Method::PATCH, path, None),
                    MethodMode::Override => (Method::POST, path, Some("PATCH")),
                }
            }
        };

        let body = multipart_body(&form, override_method)?;
        let response = self
            .client
            .request(method, self.url(&path))
            .multipart(body)
            .send()
            .await?;

        match outcome(response).await {
            Ok(outcome) => {
                form.clear_errors();
                Ok(outcome)
            }
            Err(ClientError::Validation(errors)) => {
                form.merge_errors(errors.clone());
                Err(ClientError::Validation(errors))
            }
            Err(e) => Err(e),
        }
    }

    /// 当前用户可见的文章，可按状态过滤
    pub async fn list(&self, status: Option<ArticleStatus>) -> Result<Vec<Article>, ClientError> {
        let mut request = self.client.get(self.url("/articles"));
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        Ok(success(request.send().await?).await?.json().await?)
    }

    pub async fn show(&self, id: Uuid) -> Result<Article, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/articles/{id}")))
            .send()
            .await?;
        Ok(success(response).await?.json().await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<SubmitOutcome, ClientError> {
        let url = self.url(&format!("/articles/{id}"));
        let request = match self.config.method_mode {
            MethodMode::Native => self.client.delete(url),
            MethodMode::Override => self
                .client
                .post(url)
                .multipart(Form::new().text("_method", "DELETE")),
        };
        outcome(request.send().await?).await
    }

    /// 执行状态迁移，返回迁移后的文章
    pub async fn transition(&self, id: Uuid, action: StatusAction) -> Result<Article, ClientError> {
        let response = self
            .client
            .post(self.url(&format!("/articles/{id}/{}", action.as_str())))
            .send()
            .await?;
        Ok(success(response).await?.json().await?)
    }
}

/// 提交期间保持表单的 processing 状态，结束时（包括被取消）恢复
struct Processing<'a>(&'a mut ArticleForm);

impl<'a> Processing<'a> {
    fn start(form: &'a mut ArticleForm) -> Self {
        form.set_processing(true);
        Self(form)
    }
}

impl Deref for Processing<'_> {
    type Target = ArticleForm;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl DerefMut for Processing<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl Drop for Processing<'_> {
    fn drop(&mut self) {
        self.0.set_processing(false);
    }
}

fn multipart_body(form: &ArticleForm, override_method: Option<&'static str>) -> Result<Form, ClientError> {
    let mut body = Form::new()
        .text("title", form.title.clone())
        .text("content_html", form.content_html.clone());

    if let Some(method) = override_method {
        body = body.text("_method", method);
    }
    if let Some(json) = &form.content_json {
        body = body.text("content_json", json.clone());
    }
    if let Some(category) = &form.category_id {
        body = body.text("category_id", category.clone());
    }
    if let Some(sub_category) = &form.sub_category_id {
        body = body.text("sub_category_id", sub_category.clone());
    }

    match form.hero_img() {
        HeroImage::Upload(image) => body = body.part("hero_img", hero_part(image)?),
        HeroImage::Removed => body = body.text("remove_hero_img", "1"),
        HeroImage::Absent | HeroImage::Stored(_) => {}
    }

    Ok(body)
}

fn hero_part(image: &CroppedImage) -> Result<Part, ClientError> {
    Ok(Part::bytes(image.bytes().to_vec())
        .file_name("hero.jpg")
        .mime_str(CroppedImage::MIME)?)
}

/// 把写操作的响应转换为结果
async fn outcome(response: Response) -> Result<SubmitOutcome, ClientError> {
    let status = response.status();

    if status.is_redirection() {
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("/articles")
            .to_string();
        return Ok(SubmitOutcome::Redirect(location));
    }

    success(response).await?;
    Ok(SubmitOutcome::Done)
}

/// 非 2xx 响应转换为错误
async fn success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNPROCESSABLE_ENTITY => {
            let body: ValidationBody = response.json().await?;
            Err(ClientError::Validation(body.errors))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::AccessDenied),
        status => Err(ClientError::UnexpectedStatus {
            status,
            body: response.text().await.unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Role;

    fn client() -> ArticleClient {
        // 不会真正发出请求
        ArticleClient::new(
            ClientConfig::new("http://127.0.0.1:9/"),
            &CurrentUser::new("alice", Role::Author),
        )
        .unwrap()
    }

    #[test]
    fn test_url_join() {
        assert_eq!(client().url("/articles"), "http://127.0.0.1:9/articles");
    }

    #[tokio::test]
    async fn test_invalid_form_sends_nothing() {
        let mut form = ArticleForm::new();
        form.content_html = "<p>Hi</p>".to_string();

        let err = client().submit(&mut form, Target::Create).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ref e) if e.contains("title")));
        assert!(form.errors().contains("title"));
        assert!(!form.is_processing());
    }

    #[tokio::test]
    async fn test_duplicate_submit_rejected() {
        let mut form = ArticleForm::new();
        form.title = "Hello".to_string();
        form.content_html = "<p>Hi</p>".to_string();
        form.set_processing(true);

        let err = client().submit(&mut form, Target::Create).await.unwrap_err();
        assert!(matches!(err, ClientError::InFlight));
        assert!(form.is_processing());
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_form() {
        let mut form = ArticleForm::new();
        form.title = "Hello".to_string();
        form.content_html = "<p>Hi</p>".to_string();

        let err = client().submit(&mut form, Target::Create).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(form.title, "Hello");
        assert!(!form.is_processing());
    }
}
