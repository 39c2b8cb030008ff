// src/jobs/scrape.rs
// =============================================================================
// ScrapeJob: walks a paginated listing one page per tick.
//
// Each tick:
// 1. settle the page, then wait the settle interval for late content
// 2. extract the page's links
// 3. append them to LinkStore (known links keep their timestamp)
// 4. advance to the next page; stop when there isn't one
//
// Page problems (no listing, no next control, failed load) end the job the
// same way running out of pages does. Only storage faults are errors.
// =============================================================================

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{Job, TickOutcome};
use crate::page::{PageAdapter, PageAdvance};
use crate::store::{LinkStore, StoreError};

pub struct ScrapeJob {
    adapter: Arc<dyn PageAdapter>,
    store: LinkStore,
    settle: Duration,
    pages: usize,
}

impl ScrapeJob {
    pub fn new(adapter: Arc<dyn PageAdapter>, store: LinkStore, settle: Duration) -> Self {
        Self {
            adapter,
            store,
            settle,
            pages: 0,
        }
    }
}

#[async_trait]
impl Job for ScrapeJob {
    fn name(&self) -> &'static str {
        "scrape"
    }

    async fn tick(&mut self) -> Result<TickOutcome, StoreError> {
        if let Err(e) = self.adapter.settle().await {
            warn!(error = %e, "listing page unavailable, ending scrape");
            return Ok(TickOutcome::Finished);
        }

        // Sequential on purpose: the next tick can't start until this returns
        tokio::time::sleep(self.settle).await;

        let links = match self.adapter.extract_links().await {
            Ok(links) => links,
            Err(e) => {
                warn!(error = %e, "could not read listing, ending scrape");
                return Ok(TickOutcome::Finished);
            }
        };

        let added = self.store.append_discovered(&links).await?;
        self.pages += 1;
        info!(page = self.pages, found = links.len(), added, "scraped listing page");

        match self.adapter.advance_page().await {
            Ok(PageAdvance::Advanced) => Ok(TickOutcome::Continue),
            Ok(PageAdvance::Exhausted) => {
                info!(pages = self.pages, "reached the last listing page");
                Ok(TickOutcome::Finished)
            }
            Err(e) => {
                warn!(error = %e, "cannot paginate further, ending scrape");
                Ok(TickOutcome::Finished)
            }
        }
    }
}
