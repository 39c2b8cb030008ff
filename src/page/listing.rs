// src/page/listing.rs
// =============================================================================
// ListingAdapter: a PageAdapter for server-rendered, paginated result pages.
//
// How it works:
// 1. settle(): fetch the HTML of the current page
// 2. extract_links(): pick every element matching the link selector and
//    resolve its href against the page URL
// 3. advance_page(): find the "next" control; follow its href, or report
//    exhaustion if it is disabled
//
// We use the `scraper` crate for the DOM and CSS selectors, and the `url`
// crate to turn relative hrefs into absolute URLs.
//
// scraper's Html type is not Send, so it never lives across an .await:
// parsing happens inside the plain functions at the bottom of this file.
// =============================================================================

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use super::adapter::{AdapterError, PageAdapter, PageAdvance};

/// Result links on the listing pages this tool was first written for.
pub const DEFAULT_LINK_SELECTOR: &str = ".search-result__info a.search-result__result-link";

/// The pagination "next" button on those same pages.
pub const DEFAULT_NEXT_SELECTOR: &str = ".artdeco-pagination__button--next";

// Where the adapter currently is in the listing
struct ListingState {
    url: Url,
    html: Option<String>,
    page: usize,
}

pub struct ListingAdapter {
    client: Client,
    link_selector: Selector,
    next_selector: Selector,
    state: Mutex<ListingState>,
}

impl ListingAdapter {
    /// Creates an adapter positioned on `start_url` (page 1, not yet loaded).
    pub fn new(
        client: Client,
        start_url: &str,
        link_selector: &str,
        next_selector: &str,
    ) -> Result<Self, AdapterError> {
        let url = Url::parse(start_url).map_err(|_| AdapterError::InvalidUrl(start_url.to_string()))?;

        Ok(Self {
            client,
            link_selector: parse_selector(link_selector)?,
            next_selector: parse_selector(next_selector)?,
            state: Mutex::new(ListingState {
                url,
                html: None,
                page: 1,
            }),
        })
    }
}

#[async_trait]
impl PageAdapter for ListingAdapter {
    async fn settle(&self) -> Result<(), AdapterError> {
        let (url, page) = {
            let state = self.state.lock().await;
            (state.url.clone(), state.page)
        };

        debug!(url = %url, page, "loading listing page");
        let html = fetch_page(&self.client, &url)
            .await
            .map_err(|reason| AdapterError::Load {
                url: url.to_string(),
                reason,
            })?;

        let mut state = self.state.lock().await;
        state.html = Some(html);
        Ok(())
    }

    async fn extract_links(&self) -> Result<Vec<String>, AdapterError> {
        let state = self.state.lock().await;
        let html = state.html.as_deref().ok_or(AdapterError::NotLoaded)?;

        extract_listing_links(html, &state.url, &self.link_selector).ok_or_else(|| {
            AdapterError::NoListing {
                url: state.url.to_string(),
            }
        })
    }

    async fn advance_page(&self) -> Result<PageAdvance, AdapterError> {
        let mut state = self.state.lock().await;
        let html = state.html.as_deref().ok_or(AdapterError::NotLoaded)?;

        match find_next_control(html, &state.url, &self.next_selector) {
            NextControl::Missing => Err(AdapterError::MissingNextControl {
                url: state.url.to_string(),
            }),
            NextControl::Disabled => Ok(PageAdvance::Exhausted),
            // A "next" that points back at this page would loop forever
            NextControl::Target(next) if next == state.url => Ok(PageAdvance::Exhausted),
            NextControl::Target(next) => {
                state.page += 1;
                info!(page = state.page, url = %next, "advanced to next listing page");
                state.url = next;
                state.html = None;
                Ok(PageAdvance::Advanced)
            }
        }
    }
}

// Fetches a page and returns its HTML, or a short reason it couldn't
async fn fetch_page(client: &Client, url: &Url) -> Result<String, String> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status().as_u16()));
    }

    response.text().await.map_err(|e| e.to_string())
}

fn parse_selector(css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|_| AdapterError::InvalidSelector(css.to_string()))
}

/// What the "next" control on a page looks like.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum NextControl {
    Missing,
    Disabled,
    Target(Url),
}

// Pulls the result links out of one listing page
//
// Parameters:
//   html: the page's HTML (borrowed as &str)
//   base: the page URL, for resolving relative hrefs
//   selector: which elements count as result links
//
// Returns: None when nothing matches the selector (this isn't a listing),
//   otherwise the absolute links in page order, each once
//
// Example:
//   html = "<li class='search-result__info'><a class='search-result__result-link' href='/in/alice/'>"
//   base = "https://example.com/search"
//   result = Some(["https://example.com/in/alice/"])
pub(crate) fn extract_listing_links(html: &str, base: &Url, selector: &Selector) -> Option<Vec<String>> {
    // Parse the HTML into a document
    let document = Html::parse_document(html);

    let mut matched = false;
    // The same result is often linked twice (title and avatar)
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(selector) {
        matched = true;

        // A matched element without an href still means "this is a listing"
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        // Convert relative links to absolute, drop mailto: and friends
        if let Some(link) = resolve_link(base, href) {
            if seen.insert(link.clone()) {
                links.push(link);
            }
        }
    }

    matched.then_some(links)
}

// Finds the first "next" control and decides where it leads
//
// Parameters:
//   html: the page's HTML
//   base: the page URL, for resolving the control's href
//   selector: matches the pagination "next" control
//
// Returns:
//   Missing = no control on the page at all
//   Disabled = the control is disabled, or leads nowhere usable (last page)
//   Target(url) = the next page to load
//
// Example:
//   html = "<button class='artdeco-pagination__button--next' disabled>"
//   result = Disabled
pub(crate) fn find_next_control(html: &str, base: &Url, selector: &Selector) -> NextControl {
    let document = Html::parse_document(html);

    let Some(element) = document.select(selector).next() else {
        return NextControl::Missing;
    };

    if is_disabled(&element) {
        return NextControl::Disabled;
    }

    // The control itself may be an <a>, or a button wrapping one
    let href = match element.value().attr("href") {
        Some(href) => Some(href),
        None => nested_href(&element),
    };

    match href.and_then(|h| resolve_link(base, h)) {
        Some(link) => match Url::parse(&link) {
            Ok(url) => NextControl::Target(url),
            Err(_) => NextControl::Disabled,
        },
        None => NextControl::Disabled,
    }
}

fn nested_href<'a>(element: &ElementRef<'a>) -> Option<&'a str> {
    let anchor = Selector::parse("a[href]").ok()?;
    let found = element.select(&anchor).next();
    found.and_then(|a| a.value().attr("href"))
}

fn is_disabled(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    value.attr("disabled").is_some()
        || value
            .attr("aria-disabled")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

// Resolves a link (possibly relative) to an absolute http(s) URL
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();

    // Skip anchors and special protocols
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}
