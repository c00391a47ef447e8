//! In-memory set of channels known to be bot-managed temporary channels.
//!
//! The registry is a cache derived from the store's open sessions and is
//! rebuilt from it on every start.  Only the
//! [`LifecycleManager`](crate::LifecycleManager) writes to it, so the
//! mutating methods are crate-private.

use std::collections::HashSet;

use parking_lot::RwLock;

use tv_domain::ids::ChannelId;

#[derive(Debug, Default)]
pub struct EphemeralRegistry {
    channels: RwLock<HashSet<ChannelId>>,
}

impl EphemeralRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set.
    pub(crate) fn rebuild(&self, channels: impl IntoIterator<Item = ChannelId>) {
        let mut set = self.channels.write();
        set.clear();
        set.extend(channels);
    }

    pub(crate) fn add(&self, channel_id: ChannelId) -> bool {
        self.channels.write().insert(channel_id)
    }

    pub(crate) fn remove(&self, channel_id: ChannelId) -> bool {
        self.channels.write().remove(&channel_id)
    }

    pub fn contains(&self, channel_id: ChannelId) -> bool {
        self.channels.read().contains(&channel_id)
    }

    /// Copy of the current set, sorted for stable iteration.
    pub fn snapshot(&self) -> Vec<ChannelId> {
        let mut ids: Vec<ChannelId> = self.channels.read().iter().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}
