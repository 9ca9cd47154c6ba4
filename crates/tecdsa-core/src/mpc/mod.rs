//! MPC coordination utilities
//!
//! Both protocols only ever broadcast, so a relay needs two operations:
//! publish this member's message for a round and wait for everybody's.

use crate::{Result, SessionId};
use serde::{de::DeserializeOwned, Serialize};

pub use ::async_trait::async_trait;

/// Message relay trait for MPC communication
#[async_trait]
pub trait Relay: Send + Sync {
    /// Broadcast a message to all group members, the sender included
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        message: &T,
    ) -> Result<()>;

    /// Wait for `count` broadcast messages of a round
    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        count: usize,
    ) -> Result<Vec<T>>;
}

/// In-memory relay for testing
pub mod memory;

pub use memory::MemoryRelay;
