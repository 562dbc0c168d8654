use std::io::Cursor;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::Request,
    http::{Response, StatusCode, header},
};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt;

use notedesk::{
    api::{self, USER_ID_HEADER, USER_ROLE_HEADER},
    service::ArticleService,
    state::AppState,
    storage::{ArticleRepository, FsBlobStore, MemoryRepository},
};

const BOUNDARY: &str = "notedesk-test-boundary";

struct TestApp {
    router: Router,
    blobs: TempDir,
}

/// 手工拼装的 multipart 请求体
#[derive(Default)]
struct MultipartBody {
    buf: Vec<u8>,
}

impl MultipartBody {
    fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"upload\"\r\n\
                 Content-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(bytes);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Body {
        self.buf
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(self.buf)
    }
}

fn article_form(title: &str, html: &str) -> MultipartBody {
    MultipartBody::default()
        .text("title", title)
        .text("content_html", html)
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 64]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("生成图片失败");
    buf
}

impl TestApp {
    fn new() -> Self {
        Self::with_repo(MemoryRepository::new())
    }

    fn with_repo<R: ArticleRepository + 'static>(repo: R) -> Self {
        let blobs = TempDir::new().expect("创建临时目录失败");
        let service = ArticleService::new(repo, FsBlobStore::new(blobs.path()));
        let app = AppState::new(service, blobs.path(), 1024 * 1024);

        Self {
            router: api::setup_route(app),
            blobs,
        }
    }

    async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot fail")
    }

    async fn send_form(
        &self,
        method: &str,
        uri: &str,
        user: (&str, &str),
        form: MultipartBody,
    ) -> Response<Body> {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, user.0)
            .header(USER_ROLE_HEADER, user.1)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(form.finish())
            .expect("请求失败");
        self.request(req).await
    }

    async fn send_empty(&self, method: &str, uri: &str, user: (&str, &str)) -> Response<Body> {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, user.0)
            .header(USER_ROLE_HEADER, user.1)
            .body(Body::empty())
            .expect("请求失败");
        self.request(req).await
    }

    /// 新建文章并返回其 JSON
    async fn create(&self, user: (&str, &str), form: MultipartBody) -> Value {
        let resp = self.send_form("POST", "/articles", user, form).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "新建文章");
        assert_eq!(resp.headers()[header::LOCATION], "/articles");

        // 列表按创建时间倒序，第一篇即刚创建的文章
        self.list(user, "").await.remove(0)
    }

    async fn list(&self, user: (&str, &str), query: &str) -> Vec<Value> {
        let resp = self
            .send_empty("GET", &format!("/articles{query}"), user)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        match json(resp).await {
            Value::Array(items) => items,
            other => panic!("列表应为数组: {other}"),
        }
    }

    fn blob_exists(&self, reference: &str) -> bool {
        self.blobs.path().join(reference).is_file()
    }
}

async fn json(resp: Response<Body>) -> Value {
    let data = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("读取数据失败");
    serde_json::from_slice(&data).expect("反序列化失败")
}

const ALICE: (&str, &str) = ("alice", "author");
const BOB: (&str, &str) = ("bob", "author");
const ADMIN: (&str, &str) = ("root", "admin");

#[tokio::test]
async fn test_create_list_delete() {
    let app = TestApp::new();

    let article = app.create(ALICE, article_form("Hello", "<p>Hi</p>")).await;
    assert_eq!(article["title"], "Hello");
    assert_eq!(article["content_html"], "<p>Hi</p>");
    assert_eq!(article["content_json"], Value::Null);
    assert_eq!(article["status"], "draft");
    assert_eq!(article["user_id"], "alice");

    let list = app.list(ALICE, "").await;
    assert_eq!(list.len(), 1);

    let id = article["id"].as_str().unwrap();
    let resp = app.send_empty("DELETE", &format!("/articles/{id}"), ALICE).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    assert!(app.list(ALICE, "").await.is_empty());
    let resp = app.send_empty("GET", &format!("/articles/{id}"), ALICE).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_errors() {
    let app = TestApp::new();

    let resp = app
        .send_form("POST", "/articles", ALICE, article_form("  ", "<p>Hi</p>"))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(resp).await;
    assert_eq!(body["errors"]["title"][0], "The title field is required.");
    assert_eq!(body["message"], "The title field is required.");

    let resp = app
        .send_form(
            "POST",
            "/articles",
            ALICE,
            article_form("Hello", "<p>Hi</p>").text("content_json", "{oops"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(resp).await;
    assert!(body["errors"]["content_json"].is_array());

    let resp = app
        .send_form(
            "POST",
            "/articles",
            ALICE,
            article_form("Hello", "<p>Hi</p>").file("hero_img", "image/png", b"not an image"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(resp).await;
    assert_eq!(body["errors"]["hero_img"][0], "The hero img must be an image.");

    // 多个字段出错时 message 取标题的错误
    let resp = app
        .send_form("POST", "/articles", ALICE, article_form("", ""))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(resp).await;
    assert!(body["errors"]["content_html"].is_array());
    assert_eq!(body["message"], "The title field is required.");

    // NUL 字符在入库前被拒绝
    let resp = app
        .send_form(
            "POST",
            "/articles",
            ALICE,
            article_form("Hello", "<p>Hi</p>").text("content_json", r#"{"text":"a\u0000"}"#),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(resp).await;
    assert_eq!(
        body["errors"]["content_json"][0],
        "The content json field contains invalid characters."
    );

    assert!(app.list(ALICE, "").await.is_empty(), "校验失败不应创建文章");
}

#[tokio::test]
async fn test_missing_identity() {
    let app = TestApp::new();

    let req = Request::get("/articles")
        .body(Body::empty())
        .expect("请求失败");
    let resp = app.request(req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_hero_image_lifecycle() {
    let app = TestApp::new();

    let article = app
        .create(
            ALICE,
            article_form("Hello", "<p>Hi</p>").file("hero_img", "image/png", &png(32, 18)),
        )
        .await;
    let id = article["id"].as_str().unwrap().to_string();
    let first = article["hero_img"].as_str().expect("应有封面图").to_string();
    assert!(first.starts_with("hero_images/") && first.ends_with(".png"));
    assert!(app.blob_exists(&first));

    // 已存储的 blob 可以通过 /storage 访问
    let resp = app
        .send_empty("GET", &format!("/storage/{first}"), ALICE)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // 不提交封面图时保持原引用
    let resp = app
        .send_form(
            "PATCH",
            &format!("/articles/{id}"),
            ALICE,
            article_form("Hello again", "<p>Hi</p>"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let article = json(app.send_empty("GET", &format!("/articles/{id}"), ALICE).await).await;
    assert_eq!(article["title"], "Hello again");
    assert_eq!(article["hero_img"], first.as_str());
    assert!(app.blob_exists(&first));

    // 替换后旧图被删除
    let resp = app
        .send_form(
            "PUT",
            &format!("/articles/{id}"),
            ALICE,
            article_form("Hello again", "<p>Hi</p>").file("hero_img", "image/png", &png(16, 9)),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let article = json(app.send_empty("GET", &format!("/articles/{id}"), ALICE).await).await;
    let second = article["hero_img"].as_str().expect("应有新封面图").to_string();
    assert_ne!(second, first);
    assert!(app.blob_exists(&second));
    assert!(!app.blob_exists(&first));

    // 删除封面图
    let resp = app
        .send_form(
            "PATCH",
            &format!("/articles/{id}"),
            ALICE,
            article_form("Hello again", "<p>Hi</p>").text("remove_hero_img", "1"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let article = json(app.send_empty("GET", &format!("/articles/{id}"), ALICE).await).await;
    assert_eq!(article["hero_img"], Value::Null);
    assert!(!app.blob_exists(&second));
}

#[tokio::test]
async fn test_method_override() {
    let app = TestApp::new();
    let article = app.create(ALICE, article_form("Hello", "<p>Hi</p>")).await;
    let uri = format!("/articles/{}", article["id"].as_str().unwrap());

    let resp = app
        .send_form(
            "POST",
            &uri,
            ALICE,
            article_form("Patched", "<p>x</p>").text("_method", "PATCH"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.list(ALICE, "").await[0]["title"], "Patched");

    let resp = app
        .send_form("POST", &uri, ALICE, article_form("Patched", "<p>x</p>"))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "缺少 _method");

    let resp = app
        .send_form(
            "POST",
            &uri,
            ALICE,
            MultipartBody::default().text("_method", "DELETE"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(app.list(ALICE, "").await.is_empty());
}

#[tokio::test]
async fn test_status_transitions() {
    let app = TestApp::new();
    let article = app.create(ALICE, article_form("Hello", "<p>Hi</p>")).await;
    let id = article["id"].as_str().unwrap().to_string();

    let app = &app;
    let transition = move |action: &'static str| {
        let uri = format!("/articles/{id}/{action}");
        async move { app.send_empty("POST", &uri, ALICE).await }
    };

    // 草稿不能直接归档
    assert_eq!(transition("archive").await.status(), StatusCode::CONFLICT);

    let resp = transition("publish").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json(resp).await["status"], "published");

    // 重复发布是无操作
    assert_eq!(transition("publish").await.status(), StatusCode::OK);

    let resp = transition("unpublish").await;
    assert_eq!(json(resp).await["status"], "draft");
    assert_eq!(transition("publish").await.status(), StatusCode::OK);

    let resp = transition("archive").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json(resp).await["status"], "archived");

    assert_eq!(transition("publish").await.status(), StatusCode::CONFLICT);
    assert_eq!(transition("draft").await.status(), StatusCode::CONFLICT);
    assert_eq!(transition("explode").await.status(), StatusCode::NOT_FOUND);

    assert_eq!(app.list(ALICE, "?status=archived").await.len(), 1);
    assert!(app.list(ALICE, "?status=draft").await.is_empty());
}

#[tokio::test]
async fn test_role_visibility() {
    let app = TestApp::new();
    let alice = app.create(ALICE, article_form("Alice", "<p>a</p>")).await;
    app.create(BOB, article_form("Bob", "<p>b</p>")).await;
    app.create(ADMIN, article_form("Admin", "<p>c</p>")).await;

    let list = app.list(ALICE, "").await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Alice");

    let titles: Vec<_> = app
        .list(ADMIN, "")
        .await
        .iter()
        .map(|a| a["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, ["Admin", "Bob", "Alice"], "管理员可见全部，按创建时间倒序");

    // 他人的文章对普通作者不可见
    let uri = format!("/articles/{}", alice["id"].as_str().unwrap());
    assert_eq!(
        app.send_empty("GET", &uri, BOB).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.send_empty("DELETE", &uri, BOB).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.send_empty("POST", &format!("{uri}/publish"), BOB)
            .await
            .status(),
        StatusCode::NOT_FOUND
    );

    // 管理员可以操作任何文章
    let resp = app.send_empty("POST", &format!("{uri}/publish"), ADMIN).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_upload_too_large() {
    let app = TestApp::new();
    let mut big = png(8, 8);
    big.resize(2 * 1024 * 1024, 0);

    let resp = app
        .send_form(
            "POST",
            "/articles",
            ALICE,
            article_form("Hello", "<p>Hi</p>").file("hero_img", "image/png", &big),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(resp).await;
    assert_eq!(
        body["errors"]["hero_img"][0],
        "The hero img may not be greater than 1024 kilobytes."
    );
}

#[cfg(feature = "db_tests")]
#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_api_postgres() {
    use notedesk::storage::{PgRepository, init_db_from_env, migrate};

    let db = init_db_from_env().await.expect("连接数据库失败");
    migrate(&db, "sql/01-CREATE_TABLE.sql")
        .await
        .expect("初始化sql失败");

    let app = TestApp::with_repo(PgRepository::new(db));
    let user = ("pg-test-user", "author");

    let article = app.create(user, article_form("Hello", "<p>Hi</p>")).await;
    assert_eq!(article["title"], "Hello");
    let id = article["id"].as_str().unwrap().to_string();

    let resp = app
        .send_empty("POST", &format!("/articles/{id}/publish"), user)
        .await;
    assert_eq!(json(resp).await["status"], "published");

    let resp = app.send_empty("DELETE", &format!("/articles/{id}"), user).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(
        app.list(user, "")
            .await
            .iter()
            .all(|a| a["id"].as_str() != Some(id.as_str()))
    );
}
