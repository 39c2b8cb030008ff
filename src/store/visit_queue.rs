// src/store/visit_queue.rs
// =============================================================================
// VisitQueue: the visit job's work list.
//
// A snapshot of links that were eligible when it was generated, plus a cursor.
// The visit job pops one link per tick. Once the cursor reaches the end the
// queue is exhausted and gets regenerated from LinkStore.
//
// Invariant: 0 <= current_index <= links.len()
//
// The cursor is persisted *before* the caller visits the popped link, so a
// crash mid-visit never replays it.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{StoreCore, StoreError};

/// The persisted "visitProfile" record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitProfile {
    pub links: Vec<String>,
    #[serde(rename = "currentIndex")]
    pub current_index: usize,
}

impl VisitProfile {
    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.links.len()
    }

    pub fn remaining(&self) -> usize {
        self.links.len().saturating_sub(self.current_index)
    }
}

/// Result of asking the queue for the next link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStep {
    /// A link was popped; the cursor already points past it.
    Next { link: String, position: usize },
    /// Nothing left; call `generate()` before popping again.
    Exhausted,
}

#[derive(Clone)]
pub struct VisitQueue {
    core: Arc<StoreCore>,
}

impl VisitQueue {
    pub(crate) fn new(core: Arc<StoreCore>) -> Self {
        Self { core }
    }

    /// Rebuilds the queue from every link whose cooldown has expired.
    ///
    /// Order follows the link store. The cursor is reset to 0 and the previous
    /// snapshot is discarded.
    pub async fn generate(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.core.write_lock.lock().await;
        let all = self.core.load_links().await?;

        let now = self.core.now();
        let links: Vec<String> = all
            .into_iter()
            .filter(|(_, ts)| self.core.is_eligible(*ts, now))
            .map(|(link, _)| link)
            .collect();

        let profile = VisitProfile {
            links: links.clone(),
            current_index: 0,
        };
        self.core.save_profile(&profile).await?;

        debug!(eligible = links.len(), "regenerated visit queue");
        Ok(links)
    }

    /// Pops the link under the cursor and persists the advanced cursor.
    pub async fn pop_next(&self) -> Result<QueueStep, StoreError> {
        let _guard = self.core.write_lock.lock().await;
        let mut profile = self.core.load_profile().await?;

        if profile.is_exhausted() {
            return Ok(QueueStep::Exhausted);
        }

        let position = profile.current_index;
        let link = profile.links[position].clone();
        profile.current_index += 1;
        self.core.save_profile(&profile).await?;

        Ok(QueueStep::Next { link, position })
    }

    /// The persisted queue as it is right now.
    pub async fn snapshot(&self) -> Result<VisitProfile, StoreError> {
        let _guard = self.core.write_lock.lock().await;
        self.core.load_profile().await
    }
}
