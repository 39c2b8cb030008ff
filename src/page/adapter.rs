// src/page/adapter.rs
// =============================================================================
// The capability the scrape job drives: something that shows one page of a
// paginated listing at a time.
//
// The scrape job calls, in order, once per tick:
//   settle() -> extract_links() -> advance_page()
//
// Rust concepts:
// - async-trait: lets us keep adapters behind Arc<dyn PageAdapter>
// - Send + Sync: the adapter is used from a spawned tokio task
// =============================================================================

use async_trait::async_trait;
use thiserror::Error;

/// What happened when we asked for the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAdvance {
    /// The adapter now shows the next page.
    Advanced,
    /// There are no further pages.
    Exhausted,
}

/// The page doesn't look the way the adapter expects.
///
/// The scrape job treats every one of these as "no further work".
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("no listing found on {url}")]
    NoListing { url: String },

    #[error("no next-page control on {url}")]
    MissingNextControl { url: String },

    #[error("page has not been loaded yet")]
    NotLoaded,

    #[error("failed to load {url}: {reason}")]
    Load { url: String, reason: String },

    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("invalid listing URL '{0}'")]
    InvalidUrl(String),
}

#[async_trait]
pub trait PageAdapter: Send + Sync {
    /// Brings the current page into a readable state (load it, scroll it,
    /// whatever the surface needs). The caller waits afterwards for dynamic
    /// content to finish.
    async fn settle(&self) -> Result<(), AdapterError>;

    /// Links listed on the current page, in page order.
    async fn extract_links(&self) -> Result<Vec<String>, AdapterError>;

    /// Moves to the next page, or reports that there isn't one.
    async fn advance_page(&self) -> Result<PageAdvance, AdapterError>;
}
