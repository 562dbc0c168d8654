use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::Method,
    response::Redirect,
    routing::{get, post},
};
use axum_extra::extract::Query;
use serde::Deserialize;
use uuid::Uuid;

use super::form::SubmittedForm;
use crate::{
    content::{Article, ArticleStatus, CurrentUser, StatusAction},
    error::{Error, Result},
    service::ArticleService,
    state::AppState,
    storage::{ArticleRepository, BlobStore},
};

/// 创建、更新、删除成功后重定向到的列表地址
pub const ARTICLE_INDEX: &str = "/articles";

/// 配置文章相关路由。
///
/// 路由包括：
/// - `GET /articles`：文章列表
/// - `POST /articles`：新建文章
/// - `GET /articles/{id}`：获取单篇文章
/// - `PATCH|PUT /articles/{id}`：更新文章
/// - `DELETE /articles/{id}`：删除文章
/// - `POST /articles/{id}`：通过 `_method` 字段覆盖为更新或删除
/// - `POST /articles/{id}/{action}`：发布、撤回为草稿、归档
pub fn setup_route<R, B>() -> Router<AppState<R, B>>
where
    R: ArticleRepository + 'static,
    B: BlobStore + 'static,
{
    Router::new()
        .route(
            "/articles",
            get(articles_list::<R, B>).post(article_create::<R, B>),
        )
        .route(
            "/articles/{id}",
            get(article::<R, B>)
                .patch(article_update::<R, B>)
                .put(article_update::<R, B>)
                .delete(article_delete::<R, B>)
                .post(article_method_override::<R, B>),
        )
        .route(
            "/articles/{id}/{action}",
            post(article_transition::<R, B>),
        )
}

/// 列表查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    status: Option<ArticleStatus>,
}

/// 获取文章列表。
///
/// 管理员返回所有文章，普通作者只返回自己的文章，按创建时间倒序。
async fn articles_list<R, B>(
    user: CurrentUser,
    Query(params): Query<ListParams>,
    State(service): State<ArticleService<R, B>>,
) -> Result<Json<Vec<Article>>>
where
    R: ArticleRepository,
    B: BlobStore,
{
    service.list(&user, params.status).await.map(Json)
}

/// 根据 id 获取单篇文章。
async fn article<R, B>(
    user: CurrentUser,
    Path(id): Path<Uuid>,
    State(service): State<ArticleService<R, B>>,
) -> Result<Json<Article>>
where
    R: ArticleRepository,
    B: BlobStore,
{
    service.show(&user, id).await.map(Json)
}

/// 新建文章，成功后重定向到列表。
async fn article_create<R, B>(
    user: CurrentUser,
    State(app): State<AppState<R, B>>,
    multipart: Multipart,
) -> Result<Redirect>
where
    R: ArticleRepository,
    B: BlobStore,
{
    let form = SubmittedForm::read(multipart, app.max_upload()).await?;
    app.service().create(&user, form.into_submission()?).await?;
    Ok(Redirect::to(ARTICLE_INDEX))
}

/// 更新文章，字段整体替换，成功后重定向到列表。
async fn article_update<R, B>(
    user: CurrentUser,
    Path(id): Path<Uuid>,
    State(app): State<AppState<R, B>>,
    multipart: Multipart,
) -> Result<Redirect>
where
    R: ArticleRepository,
    B: BlobStore,
{
    let form = SubmittedForm::read(multipart, app.max_upload()).await?;
    update_with_form(&app, &user, id, form).await
}

/// 软删除文章，成功后重定向到列表。
async fn article_delete<R, B>(
    user: CurrentUser,
    Path(id): Path<Uuid>,
    State(service): State<ArticleService<R, B>>,
) -> Result<Redirect>
where
    R: ArticleRepository,
    B: BlobStore,
{
    service.delete(&user, id).await?;
    Ok(Redirect::to(ARTICLE_INDEX))
}

/// 只能发送 GET/POST 的客户端通过 `_method` 字段指定真实方法。
async fn article_method_override<R, B>(
    user: CurrentUser,
    Path(id): Path<Uuid>,
    State(app): State<AppState<R, B>>,
    multipart: Multipart,
) -> Result<Redirect>
where
    R: ArticleRepository,
    B: BlobStore,
{
    let form = SubmittedForm::read(multipart, app.max_upload()).await?;

    match form.method.clone() {
        Some(m) if m == Method::PATCH || m == Method::PUT => {
            update_with_form(&app, &user, id, form).await
        }
        Some(m) if m == Method::DELETE => {
            app.service().delete(&user, id).await?;
            Ok(Redirect::to(ARTICLE_INDEX))
        }
        _ => Err(Error::FormatError(
            "POST to an article requires a _method of PATCH, PUT or DELETE",
        )),
    }
}

/// 执行状态迁移，返回迁移后的文章。
///
/// 未知的 `action` 返回 [`Error::NotFound`]。
async fn article_transition<R, B>(
    user: CurrentUser,
    Path((id, action)): Path<(Uuid, String)>,
    State(service): State<ArticleService<R, B>>,
) -> Result<Json<Article>>
where
    R: ArticleRepository,
    B: BlobStore,
{
    let action = action
        .parse::<StatusAction>()
        .map_err(|_| Error::NotFound)?;

    service.transition(&user, id, action).await.map(Json)
}

async fn update_with_form<R, B>(
    app: &AppState<R, B>,
    user: &CurrentUser,
    id: Uuid,
    form: SubmittedForm,
) -> Result<Redirect>
where
    R: ArticleRepository,
    B: BlobStore,
{
    app.service()
        .update(user, id, form.into_submission()?)
        .await?;
    Ok(Redirect::to(ARTICLE_INDEX))
}
