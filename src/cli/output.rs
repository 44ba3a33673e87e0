//! Console output for the service binary

use crate::cli::args::VerbosityLevel;
use crate::core::ServiceOptions;
use crate::utils::format_duration;
use colored::Colorize;
use std::net::SocketAddr;

/// Output formatter for fetchtube
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "info:".cyan().bold(), message);
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "ok:".green().bold(), message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    /// Print the startup banner
    pub fn print_banner(&self, addr: SocketAddr, options: &ServiceOptions, engine: &str) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        for line in banner_lines(addr, options, engine) {
            println!("{}", line);
        }
        println!();
    }
}

/// Banner content, one entry per line
fn banner_lines(addr: SocketAddr, options: &ServiceOptions, engine: &str) -> Vec<String> {
    let cookies = match (&options.cookie_file, options.active_cookie_file()) {
        (_, Some(path)) => format!("{} ({})", "loaded".green(), path.display()),
        (Some(path), None) => format!("{} ({})", "not found".yellow(), path.display()),
        (None, None) => "disabled".dimmed().to_string(),
    };

    vec![
        format!("{} {}", "fetchtube".bold(), env!("CARGO_PKG_VERSION")),
        format!("  {:<12} http://{}", "listening", addr),
        format!("  {:<12} {}", "engine", engine),
        format!("  {:<12} {}", "downloads", options.downloads_dir.display()),
        format!("  {:<12} {}", "cookies", cookies),
        format!(
            "  {:<12} {} per {}",
            "rate limit",
            options.rate_limit,
            format_duration(options.rate_window)
        ),
        format!("  {:<12} {}", "retention", format_duration(options.retention)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_banner_mentions_settings() {
        colored::control::set_override(false);
        let options = ServiceOptions::default()
            .with_downloads_dir("/srv/downloads")
            .with_cookie_file(Some(PathBuf::from("/definitely/missing/cookies.txt")));
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        let lines = banner_lines(addr, &options, "yt-dlp");
        let text = lines.join("\n");
        assert!(text.contains("http://127.0.0.1:5000"));
        assert!(text.contains("/srv/downloads"));
        assert!(text.contains("not found"));
        assert!(text.contains("5 per 1m"));
    }

    #[test]
    fn test_output_formatter_creation() {
        let formatter = OutputFormatter::new(VerbosityLevel::Quiet);
        assert_eq!(formatter.verbosity, VerbosityLevel::Quiet);
    }
}
