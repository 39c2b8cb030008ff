// src/page/loader.rs
// =============================================================================
// The capability the visit job drives: open a link and report when the page
// is ready.
//
// HttpPageLoader is the concrete version: a GET request whose body we read
// to the end ("ready") and then drop.
//
// Failure modes are split out the same way link-checking results are:
// timeouts, too many redirects and connection problems each get a variant so
// the log line says what actually went wrong.
// =============================================================================

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request timed out for {0}")]
    Timeout(String),

    #[error("too many redirects for {0}")]
    TooManyRedirects(String),

    #[error("connection failed for {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("failed to load {url}: {reason}")]
    Other { url: String, reason: String },
}

#[async_trait]
pub trait PageLoader: Send + Sync {
    /// Opens `link` and resolves once the page has finished loading.
    /// The page is released before this returns.
    async fn open(&self, link: &str) -> Result<(), LoaderError>;
}

pub struct HttpPageLoader {
    client: Client,
}

impl HttpPageLoader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageLoader for HttpPageLoader {
    async fn open(&self, link: &str) -> Result<(), LoaderError> {
        let response = self
            .client
            .get(link)
            .send()
            .await
            .map_err(|e| categorize_error(link, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::Status {
                url: link.to_string(),
                status: status.as_u16(),
            });
        }

        // Reading the body to the end is our "page is ready" signal
        let body = response.bytes().await.map_err(|e| categorize_error(link, e))?;
        debug!(link, bytes = body.len(), "page loaded");
        Ok(())
    }
}

// Sorts reqwest errors into the variants above
fn categorize_error(url: &str, error: reqwest::Error) -> LoaderError {
    let url = url.to_string();

    if error.is_timeout() {
        LoaderError::Timeout(url)
    } else if error.is_redirect() {
        LoaderError::TooManyRedirects(url)
    } else if error.is_connect() {
        LoaderError::Connect {
            url,
            reason: error.to_string(),
        }
    } else {
        LoaderError::Other {
            url,
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unparseable_link_is_an_error() {
        let loader = HttpPageLoader::new(Client::new());
        let result = loader.open("not a url").await;
        assert!(matches!(result, Err(LoaderError::Other { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let loader = HttpPageLoader::new(client);
        // Port 9 on localhost (discard) is essentially never listening
        let result = loader.open("http://127.0.0.1:9/").await;
        assert!(result.is_err());
    }
}
