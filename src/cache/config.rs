//! Feed cache configuration.

use std::time::Duration;

/// Key the home listing is stored under.
pub const INDEX_PAGE_KEY: &str = "index_page";

const DEFAULT_TTL_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct FeedCacheConfig {
    /// Fixed key; every cached home request shares this one slot.
    pub key: &'static str,
    pub ttl: Duration,
    pub enabled: bool,
}

impl Default for FeedCacheConfig {
    fn default() -> Self {
        Self {
            key: INDEX_PAGE_KEY,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            enabled: true,
        }
    }
}

impl From<&crate::config::CacheSettings> for FeedCacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            key: INDEX_PAGE_KEY,
            ttl: settings.index_ttl,
            enabled: settings.enabled,
        }
    }
}
