mod blob;
mod memory;
mod models;
mod postgres;
mod repository;

pub use self::{
    blob::{BlobStore, FsBlobStore},
    memory::MemoryRepository,
    postgres::{Db, PgRepository, init_db_from_env, migrate, new_db_pool},
    repository::{ArticleRepository, HeroRef, Replaced},
};
