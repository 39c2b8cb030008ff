// src/store/links.rs
// =============================================================================
// LinkStore: every link we have ever discovered, with one timestamp each.
//
// The timestamp means "last time this link was discovered or visited".
// A link is due for a visit once that timestamp is older than the cooldown.
//
// Newly discovered links are backdated by the cooldown (plus 1ms) so they are
// due right away. Known links are never re-seeded, so re-scraping an
// overlapping page can't push a recently visited link back into the queue.
//
// Rust concepts:
// - Arc: LinkStore is cheap to clone; every clone talks to the same state
// - IndexMap: keeps links in discovery order, so the visit queue does too
// =============================================================================

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{Clock, KeyValueStore, LinkMap, StoreCore, StoreError, VisitQueue};

#[derive(Clone)]
pub struct LinkStore {
    core: Arc<StoreCore>,
}

impl LinkStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, cooldown: Duration) -> Self {
        Self {
            core: Arc::new(StoreCore::new(kv, clock, cooldown)),
        }
    }

    /// The visit queue backed by the same key-value store and lock.
    pub fn visit_queue(&self) -> VisitQueue {
        VisitQueue::new(self.core.clone())
    }

    /// Wipes both the link map and the visit queue snapshot.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.core.write_lock.lock().await;
        self.core.save_links(&LinkMap::new()).await?;
        self.core.save_profile(&Default::default()).await?;
        debug!("cleared link store and visit queue");
        Ok(())
    }

    /// Returns every known link with its last timestamp.
    pub async fn get_all(&self) -> Result<LinkMap, StoreError> {
        let _guard = self.core.write_lock.lock().await;
        self.core.load_links().await
    }

    /// Number of discovered links.
    pub async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.get_all().await?.len())
    }

    /// Records links seen on a listing page.
    ///
    /// Links already in the store keep their timestamp. New ones are stored as
    /// `now - cooldown - 1ms`, which makes them eligible immediately.
    ///
    /// Returns how many links were new.
    pub async fn append_discovered<I, S>(&self, links: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _guard = self.core.write_lock.lock().await;
        let mut all = self.core.load_links().await?;

        let seeded = self
            .core
            .now()
            .saturating_sub(self.core.cooldown_ms())
            .saturating_sub(1);

        let mut added = 0;
        for link in links {
            let link = link.as_ref();
            if all.contains_key(link) {
                continue;
            }
            all.insert(link.to_string(), seeded);
            added += 1;
        }

        if added > 0 {
            self.core.save_links(&all).await?;
        }
        debug!(added, total = all.len(), "appended discovered links");
        Ok(added)
    }

    /// Stamps a link as visited now.
    ///
    /// Fails with `StoreError::UnknownLink` if the link was never discovered
    /// (for example because the store was cleared mid-visit); nothing is written.
    pub async fn mark_visited(&self, link: &str) -> Result<(), StoreError> {
        let _guard = self.core.write_lock.lock().await;
        let mut all = self.core.load_links().await?;

        let now = self.core.now();
        match all.get_mut(link) {
            Some(last) => *last = now,
            None => return Err(StoreError::UnknownLink(link.to_string())),
        }

        self.core.save_links(&all).await
    }

    /// Whether a link with this timestamp would be picked up by the next regeneration.
    pub fn is_eligible(&self, last_timestamp: i64) -> bool {
        self.core.is_eligible(last_timestamp, self.core.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ManualClock, MemoryStore, DEFAULT_COOLDOWN, RAW_LINKS_KEY};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    fn store_with_clock() -> (LinkStore, Arc<ManualClock>, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::new(NOW));
        let kv = Arc::new(MemoryStore::new());
        let store = LinkStore::new(kv.clone(), clock.clone(), DEFAULT_COOLDOWN);
        (store, clock, kv)
    }

    fn cooldown_ms() -> i64 {
        DEFAULT_COOLDOWN.as_millis() as i64
    }

    #[tokio::test]
    async fn test_get_all_initializes_empty_record() {
        let (store, _, kv) = store_with_clock();
        assert!(kv.get(RAW_LINKS_KEY).await.unwrap().is_none());

        let all = store.get_all().await.unwrap();
        assert!(all.is_empty());
        assert_eq!(kv.get(RAW_LINKS_KEY).await.unwrap(), Some(json!({})));
    }

    #[tokio::test]
    async fn test_new_links_are_backdated_by_cooldown() {
        let (store, _, _) = store_with_clock();
        let added = store.append_discovered(["A", "B"]).await.unwrap();
        assert_eq!(added, 2);

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        for ts in all.values() {
            let age = NOW - ts;
            assert!(age > cooldown_ms());
            assert!(age - cooldown_ms() <= 1);
            assert!(store.is_eligible(*ts));
        }
    }

    #[tokio::test]
    async fn test_rediscovery_keeps_first_timestamp() {
        let (store, clock, _) = store_with_clock();
        store.append_discovered(["A", "B"]).await.unwrap();
        let first = store.get_all().await.unwrap();

        clock.advance(Duration::from_secs(3600));
        let added = store.append_discovered(["B", "C"]).await.unwrap();
        assert_eq!(added, 1);

        let second = store.get_all().await.unwrap();
        assert_eq!(second["A"], first["A"]);
        assert_eq!(second["B"], first["B"]);
        assert_eq!(second["C"], NOW + 3_600_000 - cooldown_ms() - 1);
    }

    #[tokio::test]
    async fn test_rediscovery_does_not_requeue_visited_link() {
        let (store, clock, _) = store_with_clock();
        store.append_discovered(["A"]).await.unwrap();
        store.mark_visited("A").await.unwrap();

        clock.advance(Duration::from_secs(60));
        store.append_discovered(["A"]).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all["A"], NOW);
        assert!(!store.is_eligible(all["A"]));
    }

    #[tokio::test]
    async fn test_duplicates_within_one_batch() {
        let (store, _, _) = store_with_clock();
        let added = store.append_discovered(["A", "A", "A"]).await.unwrap();
        assert_eq!(added, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_discovery_order_is_preserved() {
        let (store, _, _) = store_with_clock();
        store.append_discovered(["zeta", "alpha"]).await.unwrap();
        store.append_discovered(["mid"]).await.unwrap();

        let keys: Vec<_> = store.get_all().await.unwrap().into_keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn test_mark_visited_sets_now() {
        let (store, clock, _) = store_with_clock();
        store.append_discovered(["A"]).await.unwrap();

        clock.advance(Duration::from_millis(250));
        store.mark_visited("A").await.unwrap();

        assert_eq!(store.get_all().await.unwrap()["A"], NOW + 250);
    }

    #[tokio::test]
    async fn test_mark_visited_unknown_link() {
        let (store, _, _) = store_with_clock();
        let result = store.mark_visited("ghost").await;

        assert!(matches!(result, Err(StoreError::UnknownLink(ref l)) if l == "ghost"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let (store, _, _) = store_with_clock();
        store.append_discovered(["A", "B"]).await.unwrap();
        store.visit_queue().generate().await.unwrap();

        store.clear().await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.visit_queue().snapshot().await.unwrap().links.is_empty());
        assert!(store.visit_queue().generate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_storage_fault() {
        let (store, _, kv) = store_with_clock();
        kv.set(RAW_LINKS_KEY, json!(["not", "a", "map"])).await.unwrap();

        let err = store.get_all().await.unwrap_err();
        assert!(err.is_storage_fault());
    }
}
