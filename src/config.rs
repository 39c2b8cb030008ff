// src/config.rs
// =============================================================================
// Runtime settings, with the defaults the tool was tuned with.
//
// The CLI (src/cli.rs) fills a HarvestConfig from flags and LINK_HARVESTER_*
// environment variables; everything below main works from this struct.
// =============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::jobs::JobSettings;
use crate::store::{
    JsonFileStore, KeyValueStore, LinkStore, MemoryStore, StorageError, SystemClock, DEFAULT_COOLDOWN,
};

pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_VISIT_INTERVAL: Duration = Duration::from_millis(4000);
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_STORE_PATH: &str = "links.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// JSON file holding the link map and visit queue.
    pub store_path: PathBuf,
    /// Keep state in memory only; nothing is read from or written to disk.
    pub ephemeral: bool,
    pub cooldown: Duration,
    pub scrape_interval: Duration,
    pub visit_interval: Duration,
    pub load_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            ephemeral: false,
            cooldown: DEFAULT_COOLDOWN,
            scrape_interval: DEFAULT_SCRAPE_INTERVAL,
            visit_interval: DEFAULT_VISIT_INTERVAL,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl HarvestConfig {
    /// Rejects settings the schedulers can't run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("scrape interval", self.scrape_interval),
            ("visit interval", self.visit_interval),
            ("load timeout", self.load_timeout),
            ("request timeout", self.request_timeout),
        ];
        match checks.iter().find(|(_, d)| d.is_zero()) {
            Some((name, _)) => Err(ConfigError::ZeroDuration(*name)),
            None => Ok(()),
        }
    }

    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            scrape_interval: self.scrape_interval,
            visit_interval: self.visit_interval,
            load_timeout: self.load_timeout,
        }
    }

    /// Opens the configured key-value backend and wraps it in a LinkStore.
    pub async fn open_store(&self) -> Result<LinkStore, StorageError> {
        let kv: Arc<dyn KeyValueStore> = if self.ephemeral {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(JsonFileStore::open(&self.store_path).await?)
        };
        Ok(LinkStore::new(kv, Arc::new(SystemClock), self.cooldown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarvestConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.cooldown, Duration::from_secs(604_800));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config = HarvestConfig {
            visit_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroDuration("visit interval")));
    }

    #[tokio::test]
    async fn test_ephemeral_store_starts_empty() {
        let config = HarvestConfig {
            ephemeral: true,
            ..Default::default()
        };
        let store = config.open_store().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarvestConfig {
            store_path: dir.path().join("links.json"),
            ..Default::default()
        };

        let store = config.open_store().await.unwrap();
        store.append_discovered(["https://example.com/a"]).await.unwrap();
        drop(store);

        let reopened = config.open_store().await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
