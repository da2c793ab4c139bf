use std::collections::HashMap;

use tokio::sync::broadcast;
use tokio::sync::Mutex;

use crate::domain::models::StatusUpdate;

/// Buffered updates per repository channel. Slow subscribers that fall more
/// than this far behind observe a lag and resynchronize from the stored
/// snapshot.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Fan-out hub for analysis progress. Each repository gets its own broadcast
/// channel, created lazily on first publish or subscribe.
pub struct ProgressHub {
    channels: Mutex<HashMap<String, broadcast::Sender<StatusUpdate>>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Publishes an update to the repository's channel. Updates sent while
    /// nobody is subscribed are dropped; the authoritative state lives in
    /// the metadata store.
    pub async fn publish(&self, update: StatusUpdate) {
        let sender = self.sender_for(&update.repository_id).await;
        let _ = sender.send(update);
    }

    /// Subscribes to a repository's updates. The receiver only sees updates
    /// published after this call; callers wanting the current state fetch a
    /// snapshot first.
    pub async fn subscribe(&self, repository_id: &str) -> broadcast::Receiver<StatusUpdate> {
        self.sender_for(repository_id).await.subscribe()
    }

    /// Drops the channel for a deleted repository.
    pub async fn remove(&self, repository_id: &str) {
        let mut channels = self.channels.lock().await;
        channels.remove(repository_id);
    }

    async fn sender_for(&self, repository_id: &str) -> broadcast::Sender<StatusUpdate> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(repository_id.to_string())
            .or_insert_with(|| broadcast::channel(PROGRESS_CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new()
    }
}
