// src/jobs/visit.rs
// =============================================================================
// VisitJob: opens one due link per tick.
//
// Each tick is one of two transitions:
//
//   queue has a link  -> pop it (cursor persisted first), open it, stamp it
//   queue exhausted   -> regenerate from LinkStore
//                          empty  -> Finished (job goes Idle)
//                          else   -> Continue with the fresh queue
//
// The cursor moves even if the page never finishes loading ("fire and
// advance"). The link is stamped whether or not the page loaded: a dead link
// waits out the cooldown like any other, so a round always drains and the
// job can go Idle.
//
// Page loads are bounded by `load_timeout`; a hang is logged and stamped.
// =============================================================================

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{Job, TickOutcome};
use crate::page::PageLoader;
use crate::store::{LinkStore, QueueStep, StoreError, VisitQueue};

pub struct VisitJob {
    store: LinkStore,
    queue: VisitQueue,
    loader: Arc<dyn PageLoader>,
    load_timeout: Duration,
    visited: usize,
}

impl VisitJob {
    pub fn new(store: LinkStore, loader: Arc<dyn PageLoader>, load_timeout: Duration) -> Self {
        Self {
            queue: store.visit_queue(),
            store,
            loader,
            load_timeout,
            visited: 0,
        }
    }

    /// Links whose page loaded and that were stamped by this job.
    pub fn visited(&self) -> usize {
        self.visited
    }

    async fn regenerate(&mut self) -> Result<TickOutcome, StoreError> {
        let links = self.queue.generate().await?;
        if links.is_empty() {
            info!(visited = self.visited, "no links are due, ending visits");
            return Ok(TickOutcome::Finished);
        }
        info!(queued = links.len(), "visit queue regenerated");
        Ok(TickOutcome::Continue)
    }

    async fn visit(&mut self, link: String, position: usize) -> Result<TickOutcome, StoreError> {
        let loaded = match tokio::time::timeout(self.load_timeout, self.loader.open(&link)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(link = %link, error = %e, "page failed to load, stamping anyway");
                false
            }
            Err(_) => {
                warn!(
                    link = %link,
                    timeout_ms = self.load_timeout.as_millis() as u64,
                    "page load timed out, stamping anyway"
                );
                false
            }
        };

        // Stamped either way; failed loads are not retried before the cooldown
        match self.store.mark_visited(&link).await {
            Ok(()) if loaded => {
                self.visited += 1;
                info!(link = %link, position, "visited");
            }
            Ok(()) => {}
            Err(StoreError::UnknownLink(_)) => {
                // Happens when the store is cleared while a visit is in flight
                warn!(link = %link, "visited link is no longer in the store, skipping");
            }
            Err(e) => return Err(e),
        }
        Ok(TickOutcome::Continue)
    }
}

#[async_trait]
impl Job for VisitJob {
    fn name(&self) -> &'static str {
        "visit"
    }

    async fn tick(&mut self) -> Result<TickOutcome, StoreError> {
        match self.queue.pop_next().await? {
            QueueStep::Next { link, position } => self.visit(link, position).await,
            QueueStep::Exhausted => self.regenerate().await,
        }
    }
}
