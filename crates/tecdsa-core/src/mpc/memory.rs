//! In-memory relay implementation for testing

use super::{async_trait, Relay};
use crate::{Error, Result, SessionId};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::warn;

/// How long `collect_broadcasts` waits before giving up by default
pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_secs(120);

/// In-memory message relay for local testing
pub struct MemoryRelay {
    /// Broadcast messages: (session_id, round) -> Vec<message_bytes>
    broadcasts: Arc<DashMap<(SessionId, u32), Vec<Vec<u8>>>>,
    /// Notification channel
    notify: broadcast::Sender<()>,
    collect_timeout: Duration,
}

impl MemoryRelay {
    /// Create a new in-memory relay
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_COLLECT_TIMEOUT)
    }

    /// Create a relay whose collects fail with [`Error::Timeout`] after
    /// `collect_timeout`
    pub fn with_timeout(collect_timeout: Duration) -> Self {
        let (notify, _) = broadcast::channel(100);
        Self {
            broadcasts: Arc::new(DashMap::new()),
            notify,
            collect_timeout,
        }
    }

    /// Messages published so far for a round
    pub fn pending(&self, session_id: &SessionId, round: u32) -> usize {
        self.broadcasts
            .get(&(*session_id, round))
            .map_or(0, |messages| messages.len())
    }

    fn try_take<T: DeserializeOwned>(
        &self,
        session_id: &SessionId,
        round: u32,
        count: usize,
    ) -> Option<Result<Vec<T>>> {
        let messages = self.broadcasts.get(&(*session_id, round))?;
        if messages.len() < count {
            return None;
        }
        Some(
            messages
                .iter()
                .take(count)
                .map(|bytes| deserialize(bytes))
                .collect(),
        )
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        message: &T,
    ) -> Result<()> {
        let bytes = serialize(message)?;

        self.broadcasts
            .entry((*session_id, round))
            .or_default()
            .push(bytes);

        let _ = self.notify.send(());
        Ok(())
    }

    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        count: usize,
    ) -> Result<Vec<T>> {
        let mut rx = self.notify.subscribe();

        let wait = async {
            loop {
                if let Some(result) = self.try_take(session_id, round, count) {
                    return result;
                }

                // Wait for notification with timeout
                tokio::select! {
                    _ = rx.recv() => continue,
                    _ = tokio::time::sleep(Duration::from_millis(100)) => continue,
                }
            }
        };

        match tokio::time::timeout(self.collect_timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                let received = self.pending(session_id, round);
                warn!(round, expected = count, received, "Timed out collecting broadcasts");
                Err(Error::Timeout(format!(
                    "round {} broadcasts ({} of {} received)",
                    round, received, count
                )))
            }
        }
    }
}
