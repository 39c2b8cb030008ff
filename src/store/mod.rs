// src/store/mod.rs
// =============================================================================
// This module owns all persisted state.
//
// Two records live in the key-value store:
// - "rawLinks": link -> last timestamp (ms), written by both jobs
// - "visitProfile": { links, currentIndex }, the visit job's work list
//
// Submodules:
// - kv: the key-value service (trait + memory and JSON file backends)
// - links: LinkStore, dedup and cooldown semantics over "rawLinks"
// - visit_queue: VisitQueue, the regenerable cursor over eligible links
// - clock: where "now" comes from
// - error: error types for all of the above
//
// Both jobs may run at the same time, so every read-modify-write of either
// record happens under one shared async lock (StoreCore::write_lock).
// =============================================================================

mod clock;
mod error;
mod kv;
mod links;
mod visit_queue;

pub use clock::{Clock, SystemClock};
pub use error::{StorageError, StoreError};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use links::LinkStore;
pub use visit_queue::{QueueStep, VisitProfile, VisitQueue};

#[cfg(test)]
pub use clock::ManualClock;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const RAW_LINKS_KEY: &str = "rawLinks";
pub const VISIT_PROFILE_KEY: &str = "visitProfile";

/// Default cooldown between two visits of the same link: 7 days.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// link -> last discovered/visited time in ms. Keeps discovery order.
pub type LinkMap = IndexMap<String, i64>;

/// Shared plumbing behind LinkStore and VisitQueue.
pub(crate) struct StoreCore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    cooldown_ms: i64,
    write_lock: Mutex<()>,
}

impl StoreCore {
    pub(crate) fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, cooldown: Duration) -> Self {
        Self {
            kv,
            clock,
            cooldown_ms: clock::duration_millis(cooldown),
            write_lock: Mutex::new(()),
        }
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    pub(crate) fn cooldown_ms(&self) -> i64 {
        self.cooldown_ms
    }

    /// A link is eligible once strictly more than the cooldown has passed.
    pub(crate) fn is_eligible(&self, last_timestamp: i64, now: i64) -> bool {
        now.saturating_sub(last_timestamp) > self.cooldown_ms
    }

    async fn read<T: DeserializeOwned>(&self, key: &'static str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StoreError::Decode { key, source }),
            None => Ok(None),
        }
    }

    async fn write<T: serde::Serialize>(&self, key: &'static str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(StorageError::from)?;
        self.kv.set(key, value).await?;
        Ok(())
    }

    /// Reads "rawLinks", writing an empty map first if it was never set.
    /// Callers must hold `write_lock`.
    pub(crate) async fn load_links(&self) -> Result<LinkMap, StoreError> {
        match self.read::<LinkMap>(RAW_LINKS_KEY).await? {
            Some(links) => Ok(links),
            None => {
                let empty = LinkMap::new();
                self.write(RAW_LINKS_KEY, &empty).await?;
                Ok(empty)
            }
        }
    }

    pub(crate) async fn save_links(&self, links: &LinkMap) -> Result<(), StoreError> {
        self.write(RAW_LINKS_KEY, links).await
    }

    /// Reads "visitProfile". Missing or empty means an exhausted, empty queue.
    pub(crate) async fn load_profile(&self) -> Result<VisitProfile, StoreError> {
        Ok(self
            .read::<VisitProfile>(VISIT_PROFILE_KEY)
            .await?
            .unwrap_or_default())
    }

    pub(crate) async fn save_profile(&self, profile: &VisitProfile) -> Result<(), StoreError> {
        self.write(VISIT_PROFILE_KEY, profile).await
    }
}
