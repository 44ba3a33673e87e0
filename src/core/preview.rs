//! Preview metadata and its short-lived cache

use crate::utils::{cache_key, format_clock};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Metadata shown to a caller before downloading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewEntry {
    /// Cache key of the normalized URL
    pub url_key: String,
    pub title: String,
    /// Media length in seconds
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    /// `MM:SS` or `HH:MM:SS`
    pub duration_str: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    #[serde(rename = "channel")]
    pub channel_name: String,
    #[serde(rename = "views")]
    pub view_count: u64,
    pub captured_at: DateTime<Utc>,
}

impl PreviewEntry {
    /// Create a new entry captured now
    pub fn new(
        url_key: String,
        title: String,
        duration_seconds: u64,
        thumbnail_url: String,
        channel_name: String,
        view_count: u64,
    ) -> Self {
        Self {
            url_key,
            title,
            duration_seconds,
            duration_str: format_clock(duration_seconds),
            thumbnail_url,
            channel_name,
            view_count,
            captured_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
struct CachedPreview {
    entry: PreviewEntry,
    stored_at: Instant,
}

/// Time-bounded memoization of preview lookups keyed by URL.
///
/// Expiry is checked lazily on read against the configured TTL. The moka
/// store additionally bounds memory and drops entries on its own schedule;
/// [`PreviewCache::sweep`] removes anything already stale.
#[derive(Clone)]
pub struct PreviewCache {
    entries: Cache<String, CachedPreview>,
    ttl: Duration,
}

impl PreviewCache {
    /// Create a cache with the given TTL and capacity
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            ttl,
        }
    }

    /// Look up a live entry
    pub async fn get(&self, url: &Url) -> Option<PreviewEntry> {
        let key = cache_key(url);
        let cached = self.entries.get(&key).await?;

        if cached.stored_at.elapsed() >= self.ttl {
            self.entries.invalidate(&key).await;
            return None;
        }
        Some(cached.entry)
    }

    /// Store or overwrite the entry for a URL
    pub async fn put(&self, url: &Url, entry: PreviewEntry) {
        let cached = CachedPreview {
            entry,
            stored_at: Instant::now(),
        };
        self.entries.insert(cache_key(url), cached).await;
    }

    /// Remove expired entries, returning how many were dropped
    pub async fn sweep(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, cached)| cached.stored_at.elapsed() >= self.ttl)
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in &expired {
            self.entries.invalidate(key).await;
        }
        self.entries.run_pending_tasks().await;
        expired.len()
    }

    /// Number of entries currently held
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// Cache time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn entry(url: &Url, title: &str) -> PreviewEntry {
        PreviewEntry::new(
            cache_key(url),
            title.to_string(),
            212,
            "https://i.ytimg.com/vi/abc/hq.jpg".to_string(),
            "Channel".to_string(),
            42,
        )
    }

    #[test]
    fn test_entry_formats_duration() {
        let url = Url::parse("https://youtu.be/abc").unwrap();
        assert_eq!(entry(&url, "t").duration_str, "03:32");
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = PreviewCache::new(Duration::from_secs(300), 16);
        let url = Url::parse("https://youtu.be/abc").unwrap();
        let stored = entry(&url, "First");

        cache.put(&url, stored.clone()).await;
        advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get(&url).await, Some(stored));

        advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&url).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_overwrites() {
        let cache = PreviewCache::new(Duration::from_secs(300), 16);
        let url = Url::parse("https://youtu.be/abc").unwrap();

        cache.put(&url, entry(&url, "First")).await;
        cache.put(&url, entry(&url, "Second")).await;
        assert_eq!(cache.get(&url).await.unwrap().title, "Second");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_stale_entries() {
        let cache = PreviewCache::new(Duration::from_secs(300), 16);
        let old = Url::parse("https://youtu.be/old").unwrap();
        let fresh = Url::parse("https://youtu.be/fresh").unwrap();

        cache.put(&old, entry(&old, "Old")).await;
        advance(Duration::from_secs(200)).await;
        cache.put(&fresh, entry(&fresh, "Fresh")).await;
        advance(Duration::from_secs(150)).await;

        assert_eq!(cache.sweep().await, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get(&fresh).await.is_some());
    }
}
