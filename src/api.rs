mod articles;
mod auth;
mod form;

use axum::{Router, extract::DefaultBodyLimit};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::instrument;

pub use self::auth::{USER_ID_HEADER, USER_ROLE_HEADER};

use crate::{
    state::AppState,
    storage::{ArticleRepository, BlobStore},
};

/// 表单中除封面图外其余字段预留的大小
const FORM_OVERHEAD: usize = 2 * 1024 * 1024;

/// 设置应用的路由。
///
/// 文章接口位于 `/articles` 下，已存储的 blob 通过 `/storage` 访问。
pub fn setup_route<R, B>(app: AppState<R, B>) -> Router
where
    R: ArticleRepository + 'static,
    B: BlobStore + 'static,
{
    let body_limit = app.max_upload() + FORM_OVERHEAD;

    Router::new()
        .merge(articles::setup_route())
        .nest_service("/storage", ServeDir::new(app.blob_root()))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app)
}

/// 启动 HTTP 服务，并使用给定的路由处理请求。
///
/// 在 `bind` 上监听 TCP 连接，并打印启动日志。
#[instrument(name = "http server", skip(router))]
pub async fn run_server_with_router(router: Router, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router).await
}

/// 启动 HTTP 服务，自动设置路由和中间件。
///
/// 1. 生成路由
/// 2. 添加日志和追踪中间件
/// 3. 启动服务器
pub async fn run_server<R, B>(app: AppState<R, B>, bind: &str) -> std::io::Result<()>
where
    R: ArticleRepository + 'static,
    B: BlobStore + 'static,
{
    let router = setup_route(app);
    let router = add_middlewares(router);
    run_server_with_router(router, bind).await
}

/// 为路由添加中间件，包括请求追踪和失败日志记录。
///
/// 日志记录会在请求失败时输出错误信息。
fn add_middlewares(router: Router) -> Router {
    fn log_failure(
        err: tower_http::classify::ServerErrorsFailureClass,
        _latency: std::time::Duration,
        _span: &tracing::Span,
    ) {
        tracing::error!(error = %err, "request failed");
    }

    router.layer(
        TraceLayer::new_for_http()
            .on_failure(log_failure)
            .on_request(|_req: &_, _span: &tracing::Span| {
                // 空实现，关闭请求日志
            }),
    )
}
