//! Service configuration

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration shared by every component of the service
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Directory holding downloaded artifacts
    pub downloads_dir: PathBuf,
    /// Optional cookie file handed to the engine when it exists
    pub cookie_file: Option<PathBuf>,
    /// Engine executable
    pub engine_binary: PathBuf,
    /// Requests admitted per caller within `rate_window`
    pub rate_limit: usize,
    /// Sliding window for the per-caller limit
    pub rate_window: Duration,
    /// Preview cache time-to-live
    pub cache_ttl: Duration,
    /// Upper bound on cached previews
    pub cache_capacity: u64,
    /// Age after which downloaded files are swept
    pub retention: Duration,
    /// Interval of the periodic retention sweep
    pub sweep_interval: Duration,
    /// Delay between serving a file and deleting it
    pub serve_grace: Duration,
    /// Files modified within this window are accepted as a last-resort match
    pub recent_window: Duration,
    /// Socket timeout passed to the engine
    pub socket_timeout: Duration,
    /// Hard limit on one engine invocation
    pub extract_timeout: Duration,
    /// Engine-level retries for transient network errors
    pub retries: u32,
    /// Engine download throughput limit in bytes per second
    pub download_rate_bps: Option<u64>,
    /// Process-wide engine starts per second
    pub engine_starts_per_second: Option<NonZeroU32>,
    /// Use the first `X-Forwarded-For` hop as the caller identity
    pub trust_forwarded: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("temp_downloads"),
            cookie_file: Some(PathBuf::from("cookies.txt")),
            engine_binary: PathBuf::from("yt-dlp"),
            rate_limit: 5,
            rate_window: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 1024,
            retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(3600),
            serve_grace: Duration::from_secs(60),
            recent_window: Duration::from_secs(60),
            socket_timeout: Duration::from_secs(30),
            extract_timeout: Duration::from_secs(180),
            retries: 10,
            download_rate_bps: Some(1024 * 1024),
            engine_starts_per_second: NonZeroU32::new(2),
            trust_forwarded: false,
        }
    }
}

impl ServiceOptions {
    /// Cookie file, only if it is actually present on disk
    pub fn active_cookie_file(&self) -> Option<PathBuf> {
        self.cookie_file
            .as_ref()
            .filter(|path| path.is_file())
            .cloned()
    }

    /// Set downloads directory
    pub fn with_downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads_dir = dir.into();
        self
    }

    /// Set cookie file
    pub fn with_cookie_file(mut self, path: Option<PathBuf>) -> Self {
        self.cookie_file = path;
        self
    }

    /// Disable process-wide engine pacing
    pub fn without_engine_pacing(mut self) -> Self {
        self.engine_starts_per_second = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_policy() {
        let options = ServiceOptions::default();
        assert_eq!(options.rate_limit, 5);
        assert_eq!(options.rate_window, Duration::from_secs(60));
        assert_eq!(options.cache_ttl, Duration::from_secs(300));
        assert_eq!(options.retention, Duration::from_secs(3600));
        assert_eq!(options.serve_grace, Duration::from_secs(60));
        assert_eq!(options.extract_timeout, Duration::from_secs(180));
    }

    #[test]
    fn test_missing_cookie_file_is_inactive() {
        let options = ServiceOptions::default()
            .with_cookie_file(Some(PathBuf::from("/definitely/not/here/cookies.txt")));
        assert!(options.active_cookie_file().is_none());

        let options = ServiceOptions::default().with_cookie_file(None);
        assert!(options.active_cookie_file().is_none());
    }
}
