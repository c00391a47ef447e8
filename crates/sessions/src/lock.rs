//! Per-channel concurrency control.
//!
//! Connector events are handled on many tasks at once.  Every transition
//! for a channel runs while holding that channel's permit, so two events for
//! the same channel serialize while different channels proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use tv_domain::error::{Error, Result};
use tv_domain::ids::ChannelId;

/// Manages per-channel locks.
///
/// Each channel maps to a `Semaphore(1)`.  The permit auto-releases on drop.
pub struct ChannelLockMap {
    locks: Mutex<HashMap<ChannelId, Arc<Semaphore>>>,
}

impl Default for ChannelLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for a channel, waiting for the current holder.
    pub async fn acquire(&self, channel_id: ChannelId) -> Result<OwnedSemaphorePermit> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(channel_id)
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        if let Ok(permit) = sem.clone().try_acquire_owned() {
            return Ok(permit);
        }

        sem.acquire_owned()
            .await
            .map_err(|_| Error::Other(format!("lock for channel {channel_id} was closed")))
    }

    /// Number of tracked channels (for monitoring).
    pub fn channel_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop locks nobody holds or waits on.
    ///
    /// An entry whose `Arc` is shared is still referenced by an in-flight
    /// `acquire`, so removing it would let a second semaphore be minted for
    /// the same channel.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| Arc::strong_count(sem) > 1 || sem.available_permits() == 0);
    }
}
