use crate::stream::stream::MediaStream;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Stream-path → stream map shared by all connections of a server. One
/// publisher per path; players and delivery tasks hold `Arc`s that keep a
/// finished stream alive until released.
pub struct StreamRegistry {
    streams: RwLock<HashMap<String, Arc<MediaStream>>>,
    ring_capacity: usize,
}

impl StreamRegistry {
    pub fn new(ring_capacity: usize) -> Self {
        StreamRegistry {
            streams: RwLock::new(HashMap::new()),
            ring_capacity,
        }
    }

    /// Claim a path for publishing. A registered path always has a live
    /// publisher (`finish` removes the entry), so any existing entry means
    /// the claim is refused.
    pub async fn publish(&self, path: &str) -> Result<Arc<MediaStream>> {
        let mut streams = self.streams.write().await;
        if streams.contains_key(path) {
            return Err(Error::stream(format!(
                "stream '{}' is already being published",
                path
            )));
        }

        let stream = Arc::new(MediaStream::new(self.ring_capacity));
        stream.publish();
        streams.insert(path.to_string(), stream.clone());
        info!(path, "stream published");
        Ok(stream)
    }

    pub async fn get(&self, path: &str) -> Option<Arc<MediaStream>> {
        self.streams.read().await.get(path).cloned()
    }

    /// End a published stream: write end-of-stream into its ring, clear the
    /// publishing flag and forget the path.
    pub async fn finish(&self, path: &str) {
        let removed = self.streams.write().await.remove(path);
        if let Some(stream) = removed {
            stream.write(None);
            stream.unpublish();
            info!(path, subscribers = stream.subscriber_count(), "stream finished");
        }
    }

    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }
}
