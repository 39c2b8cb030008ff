// src/page/mod.rs
// =============================================================================
// This module holds everything that touches actual web pages.
//
// Submodules:
// - adapter: the PageAdapter capability the scrape job uses
// - listing: ListingAdapter, a PageAdapter for paginated HTML listings
// - loader: the PageLoader capability the visit job uses, plus HttpPageLoader
//
// The jobs only ever see the traits, so tests swap in fakes.
// =============================================================================

mod adapter;
mod listing;
mod loader;

pub use adapter::{AdapterError, PageAdapter, PageAdvance};
pub use listing::{ListingAdapter, DEFAULT_LINK_SELECTOR, DEFAULT_NEXT_SELECTOR};
pub use loader::{HttpPageLoader, LoaderError, PageLoader};

use reqwest::Client;
use std::time::Duration;

/// Builds the HTTP client shared by the listing adapter and the page loader.
///
/// One client means one connection pool for the whole run.
pub fn http_client(request_timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(request_timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}
