pub mod api;
pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod service;
pub mod state;
pub mod storage;

use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use config::{Config, StorageBackend};
use service::ArticleService;
use state::AppState;
use storage::{ArticleRepository, FsBlobStore, MemoryRepository, PgRepository};

/// 初始化日志，过滤规则来自环境变量 `NOTEDESK_LOG`
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_env_filter(EnvFilter::from_env("NOTEDESK_LOG"))
        .init();
}

pub async fn run() {
    init_tracing();

    let config = Config::from_env().expect("invalid notedesk configuration");
    let blobs = FsBlobStore::new(&config.blob_dir);

    match config.storage {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL not set");
            let db = storage::new_db_pool(url)
                .await
                .expect("Failed to connect to database");

            if let Some(file) = &config.migrations {
                storage::migrate(&db, &file.to_string_lossy())
                    .await
                    .expect("Failed to run migrations");
                tracing::info!(file = %file.display(), "migrations applied");
            }

            serve(&config, PgRepository::new(db), blobs).await
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage, articles are lost on restart");
            serve(&config, MemoryRepository::new(), blobs).await
        }
    }
}

async fn serve<R: ArticleRepository + 'static>(config: &Config, repo: R, blobs: FsBlobStore) {
    let app = AppState::new(
        ArticleService::new(repo, blobs),
        &config.blob_dir,
        config.max_upload,
    );

    if let Err(e) = api::run_server(app, &config.bind).await {
        tracing::error!(error = %e, "http server stopped");
    }
}
