use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::warn;

use crate::app::search::{self, FeedQuery};
use crate::domain::resource::Resource;
use crate::infra::store::ResourceStore;

/// One full view of the resource collection as read from the store.
#[derive(Debug, Default)]
pub struct FeedSnapshot {
    pub version: u64,
    pub resources: Vec<Resource>,
}

/// Holder of the latest snapshot. The only way in is `apply_snapshot`;
/// subscribers are woken with every new version.
#[derive(Clone)]
pub struct FeedState {
    tx: Arc<watch::Sender<Arc<FeedSnapshot>>>,
    // held from store read to apply, so an older read never lands last
    refresh: Arc<Mutex<()>>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(FeedSnapshot::default()));
        Self {
            tx: Arc::new(tx),
            refresh: Arc::new(Mutex::new(())),
        }
    }

    pub fn apply_snapshot(&self, resources: Vec<Resource>) -> u64 {
        let mut version = 0;
        self.tx.send_modify(|current| {
            version = current.version + 1;
            *current = Arc::new(FeedSnapshot { version, resources });
        });
        version
    }

    pub fn current(&self) -> Arc<FeedSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<FeedSnapshot>> {
        self.tx.subscribe()
    }
}

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn ResourceStore>,
    state: FeedState,
}

impl FeedService {
    pub fn new(store: Arc<dyn ResourceStore>, state: FeedState) -> Self {
        Self { store, state }
    }

    /// Re-reads the whole collection and publishes it.
    pub async fn refresh(&self) -> Result<u64> {
        let _guard = self.state.refresh.lock().await;
        let resources = self.store.list_resources().await?;
        Ok(self.state.apply_snapshot(resources))
    }

    /// Refresh after a write. A failed read keeps the previous snapshot.
    pub async fn publish(&self) {
        if let Err(err) = self.refresh().await {
            warn!(error = ?err, "failed to refresh feed snapshot");
        }
    }

    pub fn view(&self, query: &FeedQuery) -> Vec<Resource> {
        search::apply(&self.state.current().resources, query)
    }

    pub fn snapshot(&self) -> Arc<FeedSnapshot> {
        self.state.current()
    }

    /// Periodic re-read so writes made elsewhere eventually show up.
    pub async fn run_refresher(self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.publish().await;
        }
    }
}
