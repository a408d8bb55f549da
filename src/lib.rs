pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use anyhow::{anyhow, Result};
use std::sync::Arc;
use url::Url;

use crate::app::feed::{FeedService, FeedState};
use crate::config::{AppConfig, BlobBackend, StoreBackend};
use crate::infra::db::Db;
use crate::infra::memory::MemoryStore;
use crate::infra::postgres::PgStore;
use crate::infra::storage::{BlobStore, MemoryBlobStore, ObjectStorage};
use crate::infra::store::ResourceStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResourceStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub feed: FeedState,
    pub session_key: [u8; 32],
    pub session_ttl_hours: u64,
    pub upload_max_bytes: usize,
}

impl AppState {
    /// Connects the configured backends. The feed starts empty; callers run
    /// the first refresh.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store: Arc<dyn ResourceStore> = match config.store_backend {
            StoreBackend::Postgres => Arc::new(PgStore::new(Db::connect(config).await?)),
            StoreBackend::Memory => {
                tracing::warn!("using in-memory resource store; data is lost on restart");
                Arc::new(MemoryStore::default())
            }
        };

        let blobs: Arc<dyn BlobStore> = match config.blob_backend {
            BlobBackend::S3 => Arc::new(ObjectStorage::new(config).await?),
            BlobBackend::Memory => {
                let base = Url::parse(&config.blob_public_base)
                    .map_err(|err| anyhow!("invalid BLOB_PUBLIC_BASE: {}", err))?;
                Arc::new(MemoryBlobStore::new(base))
            }
        };

        Ok(Self {
            store,
            blobs,
            feed: FeedState::new(),
            session_key: config.session_key,
            session_ttl_hours: config.session_ttl_hours,
            upload_max_bytes: config.upload_max_bytes,
        })
    }

    pub fn feed_service(&self) -> FeedService {
        FeedService::new(self.store.clone(), self.feed.clone())
    }
}
