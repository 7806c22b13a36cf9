// Typed Postgres data-access layer. One narrow store per entity; no
// loosely-typed row maps anywhere above this crate.

pub mod error;
pub mod jobs;
pub mod marked_blobs;
pub mod platforms;
pub mod playbooks;
pub mod pool;
pub mod posts;
pub mod sentiment;
pub mod threads;

pub use error::{Result, StoreError};
pub use jobs::{Job, JobStore, NewJob};
pub use marked_blobs::MarkedBlobStore;
pub use platforms::{Platform, PlatformStore};
pub use playbooks::{NewPlaybook, Playbook, PlaybookStore};
pub use posts::{LabelCounts, NewPost, Post, PostRank, PostStore, SentimentUpdate};
pub use sentiment::{SentimentStore, SentimentSummary};
pub use threads::{NewThread, Thread, ThreadStore};

use sqlx::PgPool;

/// All entity stores over one shared pool.
#[derive(Clone)]
pub struct Store {
    pub threads: ThreadStore,
    pub platforms: PlatformStore,
    pub jobs: JobStore,
    pub posts: PostStore,
    pub sentiment: SentimentStore,
    pub playbooks: PlaybookStore,
    pub marked_blobs: MarkedBlobStore,
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self {
            threads: ThreadStore::new(pool.clone()),
            platforms: PlatformStore::new(pool.clone()),
            jobs: JobStore::new(pool.clone()),
            posts: PostStore::new(pool.clone()),
            sentiment: SentimentStore::new(pool.clone()),
            playbooks: PlaybookStore::new(pool.clone()),
            marked_blobs: MarkedBlobStore::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the bounded pool and run the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = pool::connect(database_url).await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}
