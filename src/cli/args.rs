//! Command line argument parsing

use crate::core::ServiceOptions;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// Video preview and download service backed by yt-dlp
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Directory for downloaded files
    #[arg(long, env = "DOWNLOADS_DIR", value_name = "DIR", default_value = "temp_downloads")]
    pub downloads_dir: PathBuf,

    /// Cookie file handed to the engine when present
    #[arg(long, env = "COOKIES_FILE", value_name = "PATH", default_value = "cookies.txt")]
    pub cookies: PathBuf,

    /// Extraction engine executable
    #[arg(long, env = "ENGINE", value_name = "PATH", default_value = "yt-dlp")]
    pub engine: PathBuf,

    /// Requests per caller within the rate window
    #[arg(long, env = "RATE_LIMIT", default_value = "5")]
    pub rate_limit: usize,

    /// Rate limiting window (e.g., 60s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "60s")]
    pub rate_window: humantime::Duration,

    /// Preview cache time-to-live
    #[arg(long, value_name = "DURATION", default_value = "5m")]
    pub cache_ttl: humantime::Duration,

    /// Maximum number of cached previews
    #[arg(long, default_value = "1024")]
    pub cache_capacity: u64,

    /// Age after which downloaded files are deleted
    #[arg(long, value_name = "DURATION", default_value = "1h")]
    pub retention: humantime::Duration,

    /// Interval between retention sweeps
    #[arg(long, value_name = "DURATION", default_value = "1h")]
    pub sweep_interval: humantime::Duration,

    /// Delay between serving a file and deleting it
    #[arg(long, value_name = "DURATION", default_value = "60s")]
    pub serve_grace: humantime::Duration,

    /// Engine socket timeout
    #[arg(long, value_name = "DURATION", default_value = "30s")]
    pub socket_timeout: humantime::Duration,

    /// Hard limit on one engine invocation
    #[arg(long, value_name = "DURATION", default_value = "3m")]
    pub extract_timeout: humantime::Duration,

    /// Engine retries for transient network errors
    #[arg(long, default_value = "10")]
    pub retries: u32,

    /// Engine download rate limit (e.g., 1MiB/s, 500KiB/s), 0 disables
    #[arg(long, value_name = "RATE", default_value = "1MiB/s")]
    pub download_rate: String,

    /// Engine starts per second across all callers, 0 disables
    #[arg(long, default_value = "2")]
    pub engine_starts: u32,

    /// Identify callers by the first X-Forwarded-For hop
    #[arg(long, env = "TRUST_FORWARDED")]
    pub trust_forwarded: bool,

    /// Empty the downloads directory before serving
    #[arg(long)]
    pub purge_on_start: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Socket address to bind
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Parse rate limit string to bytes per second
    pub fn parse_download_rate(&self) -> Option<u64> {
        parse_rate_limit(&self.download_rate)
    }

    /// Service options described by these arguments
    pub fn to_options(&self) -> ServiceOptions {
        ServiceOptions {
            downloads_dir: self.downloads_dir.clone(),
            cookie_file: Some(self.cookies.clone()),
            engine_binary: self.engine.clone(),
            rate_limit: self.rate_limit,
            rate_window: self.rate_window.into(),
            cache_ttl: self.cache_ttl.into(),
            cache_capacity: self.cache_capacity,
            retention: self.retention.into(),
            sweep_interval: self.sweep_interval.into(),
            serve_grace: self.serve_grace.into(),
            socket_timeout: self.socket_timeout.into(),
            extract_timeout: self.extract_timeout.into(),
            retries: self.retries,
            download_rate_bps: self.parse_download_rate(),
            engine_starts_per_second: NonZeroU32::new(self.engine_starts),
            trust_forwarded: self.trust_forwarded,
            ..ServiceOptions::default()
        }
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Default log filter for this verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbosity_level() {
            VerbosityLevel::Quiet => "warn",
            VerbosityLevel::Normal => "info",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

/// Parse rate limit string to bytes per second
pub fn parse_rate_limit(rate: &str) -> Option<u64> {
    let rate = rate.trim().to_uppercase();
    if rate.is_empty() {
        return None;
    }

    // Remove /s suffix if present
    let rate = rate.trim_end_matches("/S");

    let number_end = rate
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);

    if number_end == 0 {
        return None;
    }

    let number: f64 = rate[..number_end].parse().ok()?;
    if number <= 0.0 {
        return None;
    }

    let multiplier: u64 = match rate[number_end..].trim() {
        "B" | "" => 1,
        "K" | "KB" => 1000,
        "KIB" => 1024,
        "M" | "MB" => 1000 * 1000,
        "MIB" => 1024 * 1024,
        "G" | "GB" => 1000 * 1000 * 1000,
        "GIB" => 1024 * 1024 * 1024,
        _ => return None,
    };

    Some((number * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["fetchtube"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_rate_limit() {
        assert_eq!(parse_rate_limit("1MB/s"), Some(1000 * 1000));
        assert_eq!(parse_rate_limit("1MiB/s"), Some(1024 * 1024));
        assert_eq!(parse_rate_limit("500KiB/s"), Some(500 * 1024));
        assert_eq!(parse_rate_limit("1.5MB/s"), Some(1500 * 1000));
        assert_eq!(parse_rate_limit(" 1mb/s "), Some(1000 * 1000));
        assert_eq!(parse_rate_limit("1024"), Some(1024));
        assert_eq!(parse_rate_limit("0"), None);
        assert_eq!(parse_rate_limit(""), None);
        assert_eq!(parse_rate_limit("-1MB"), None);
        assert_eq!(parse_rate_limit("1XB"), None);
        assert_eq!(parse_rate_limit("invalid"), None);
    }

    #[test]
    fn test_defaults_map_to_service_options() {
        let args = parse(&[]);
        assert_eq!(args.bind_addr().port(), args.port);
        assert_eq!(args.verbosity_level(), VerbosityLevel::Normal);
        assert_eq!(args.log_level(), "info");

        let options = args.to_options();
        let defaults = ServiceOptions::default();
        assert_eq!(options.rate_limit, defaults.rate_limit);
        assert_eq!(options.rate_window, defaults.rate_window);
        assert_eq!(options.cache_ttl, defaults.cache_ttl);
        assert_eq!(options.retention, defaults.retention);
        assert_eq!(options.serve_grace, defaults.serve_grace);
        assert_eq!(options.extract_timeout, defaults.extract_timeout);
        assert_eq!(options.download_rate_bps, Some(1024 * 1024));
        assert_eq!(options.engine_starts_per_second, NonZeroU32::new(2));
    }

    #[test]
    fn test_custom_values() {
        let args = parse(&[
            "--port",
            "8080",
            "--rate-limit",
            "10",
            "--cache-ttl",
            "10m",
            "--download-rate",
            "0",
            "--engine-starts",
            "0",
            "--trust-forwarded",
            "-v",
        ]);

        let options = args.to_options();
        assert_eq!(args.bind_addr().port(), 8080);
        assert_eq!(options.rate_limit, 10);
        assert_eq!(options.cache_ttl, Duration::from_secs(600));
        assert_eq!(options.download_rate_bps, None);
        assert_eq!(options.engine_starts_per_second, None);
        assert!(options.trust_forwarded);
        assert_eq!(args.log_level(), "debug");
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        let args = parse(&["-q", "-v"]);
        assert_eq!(args.verbosity_level(), VerbosityLevel::Quiet);
        assert_eq!(args.log_level(), "warn");
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        assert!(Args::try_parse_from(["fetchtube", "--retention", "soon"]).is_err());
    }
}
