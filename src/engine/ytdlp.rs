//! yt-dlp subprocess engine

use super::{EngineFailure, EngineRequest, ExtractionEngine, FetchOutcome, MediaMetadata};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const ACCEPT: &str = "Accept:text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "Accept-Language:en-US,en;q=0.9";

/// Longest stderr excerpt carried in a failure
const MAX_ERROR_LEN: usize = 300;

/// Engine backed by the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary: PathBuf,
}

impl YtDlpEngine {
    /// Create an engine running `binary`
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments shared by metadata and download invocations
    fn base_args(request: &EngineRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--no-warnings".into(),
            "--no-color".into(),
            "--no-playlist".into(),
            "--no-progress".into(),
            "--geo-bypass".into(),
            "--restrict-filenames".into(),
            "--socket-timeout".into(),
            request.socket_timeout.as_secs().max(1).to_string(),
            "--retries".into(),
            request.retries.to_string(),
            "--fragment-retries".into(),
            request.retries.to_string(),
            "--user-agent".into(),
            request.profile.user_agent.clone(),
            "--referer".into(),
            request.profile.referer.to_string(),
            "--add-header".into(),
            ACCEPT.into(),
            "--add-header".into(),
            ACCEPT_LANGUAGE.into(),
        ];

        if let Some(client) = request.profile.player_client {
            args.push("--extractor-args".into());
            args.push(format!("youtube:player_client={}", client));
        }

        if let Some(cookies) = &request.cookie_file {
            args.push("--cookies".into());
            args.push(cookies.to_string_lossy().into_owned());
        }

        args
    }

    /// Arguments for a metadata-only invocation
    pub fn probe_args(url: &str, request: &EngineRequest) -> Vec<String> {
        let mut args = Self::base_args(request);
        args.push("--dump-single-json".into());
        args.push("--skip-download".into());
        args.push("--".into());
        args.push(url.to_string());
        args
    }

    /// Arguments for a download invocation
    pub fn fetch_args(url: &str, request: &EngineRequest) -> Result<Vec<String>, EngineFailure> {
        let template = request
            .output_template
            .as_ref()
            .ok_or_else(|| EngineFailure::Output("no output template for download".into()))?;

        let mut args = Self::base_args(request);
        args.push("--continue".into());
        args.push("-o".into());
        args.push(template.to_string_lossy().into_owned());
        // Final path after merging/post-processing goes to stdout
        args.push("--print".into());
        args.push("after_move:filepath".into());
        args.push("--no-simulate".into());

        if let Some(format) = &request.format {
            args.push("-f".into());
            args.push(format.selector.to_string());

            if let Some(container) = format.merge_output {
                args.push("--merge-output-format".into());
                args.push(container.to_string());
            }

            if let Some(audio) = &format.audio {
                args.push("--extract-audio".into());
                args.push("--audio-format".into());
                args.push(audio.codec.to_string());
                args.push("--audio-quality".into());
                args.push(format!("{}K", audio.bitrate_kbps));
            }
        }

        if let Some(bps) = request.rate_limit_bps {
            args.push("--limit-rate".into());
            args.push(bps.to_string());
        }

        args.push("--".into());
        args.push(url.to_string());
        Ok(args)
    }

    /// Run the executable, killing it if it outlives `timeout`
    async fn run(&self, args: Vec<String>, timeout: Duration) -> Result<Vec<u8>, EngineFailure> {
        debug!("Running {} with {} args", self.binary.display(), args.len());

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!("{} exceeded {}s, killed", self.binary.display(), timeout.as_secs());
                return Err(EngineFailure::TimedOut(timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineFailure::Reported(error_summary(&stderr)));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl ExtractionEngine for YtDlpEngine {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn probe(
        &self,
        url: &str,
        request: &EngineRequest,
    ) -> Result<MediaMetadata, EngineFailure> {
        let stdout = self
            .run(Self::probe_args(url, request), request.invocation_timeout)
            .await?;
        serde_json::from_slice(&stdout).map_err(|e| EngineFailure::Output(e.to_string()))
    }

    async fn fetch(
        &self,
        url: &str,
        request: &EngineRequest,
    ) -> Result<FetchOutcome, EngineFailure> {
        let args = Self::fetch_args(url, request)?;
        let stdout = self.run(args, request.invocation_timeout).await?;
        Ok(FetchOutcome {
            reported_path: reported_path(&String::from_utf8_lossy(&stdout)),
        })
    }
}

/// Last non-empty stdout line, which `--print after_move:filepath` writes
fn reported_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(PathBuf::from)
}

/// Reduce engine stderr to the most relevant error line
fn error_summary(stderr: &str) -> String {
    let last_error_line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.to_lowercase().starts_with("error"));

    let message = match last_error_line {
        Some(line) => line
            .strip_prefix("ERROR: ")
            .or_else(|| line.strip_prefix("ERROR:"))
            .unwrap_or(line)
            .to_string(),
        None => stderr.trim().to_string(),
    };

    if message.is_empty() {
        return "engine exited without an error message".to_string();
    }

    if message.len() > MAX_ERROR_LEN {
        let mut cut = MAX_ERROR_LEN;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        return message[..cut].to_string();
    }
    message
}
