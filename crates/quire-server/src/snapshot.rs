//! The published snapshot shared with request handlers.

use std::sync::Arc;

use quire_static::SiteSnapshot;
use tokio::sync::{watch, RwLock};

/// Handle to the most recently published build output.
///
/// Readers take the lock only long enough to clone the `Arc`; bytes are
/// served from the clone with no lock held.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    current: Arc<RwLock<Arc<SiteSnapshot>>>,
    generation: Arc<watch::Sender<u64>>,
}

impl SnapshotHandle {
    pub fn new(initial: SiteSnapshot) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            current: Arc::new(RwLock::new(Arc::new(initial))),
            generation: Arc::new(generation),
        }
    }

    /// The snapshot being served right now.
    pub async fn current(&self) -> Arc<SiteSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Replace the served snapshot wholesale.
    pub async fn publish(&self, snapshot: SiteSnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.current.write().await = snapshot;
        self.generation.send_modify(|g| *g += 1);
    }

    /// Number of snapshots published since the initial one.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}
