//! Multi-persona extraction with fallback
//!
//! Every operation walks the personas in priority order and invokes the
//! engine once per persona. The first success wins; failures are classified
//! by [`classify_failure`] to decide whether to continue.

use super::{
    format_selection, FormatSelection, MediaFormat, Persona, PreviewEntry, Quality,
    ServiceOptions,
};
use crate::download::{BackoffConfig, FileResolver, ResolutionStep};
use crate::engine::{
    classify_failure, EngineFailure, EngineRequest, ExtractionEngine, FailureClass, FetchOutcome,
    MediaMetadata,
};
use crate::error::ServiceError;
use crate::utils::{cache_key, format_bytes, output_stem};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::Rng;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Length of the random job token, in hex characters
const TOKEN_LEN: usize = 12;

/// Per-request record of a download
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub source_url: Url,
    pub format: MediaFormat,
    pub quality: Quality,
    /// Unique id embedded in the engine output name
    pub token: String,
    /// Personas tried, in order
    pub attempted_personas: Vec<Persona>,
    pub resolved_file_path: Option<PathBuf>,
}

impl DownloadJob {
    pub fn new(source_url: Url, format: MediaFormat, quality: Quality) -> Self {
        Self {
            source_url,
            format,
            quality,
            token: new_token(),
            attempted_personas: Vec::new(),
            resolved_file_path: None,
        }
    }
}

/// A downloaded file, located and given its final name
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub path: PathBuf,
    /// Final file name inside the downloads directory
    pub filename: String,
    pub title: String,
    pub size_bytes: u64,
    /// Persona whose attempt produced the file
    pub persona: Persona,
    /// Heuristic that found the file
    pub step: ResolutionStep,
    pub job: DownloadJob,
}

/// Successful result of the persona loop
struct Attempted<T> {
    value: T,
    persona: Persona,
    attempted: Vec<Persona>,
}

/// What one successful download attempt left behind
struct FetchedAttempt {
    metadata: MediaMetadata,
    expected_stem: String,
    outcome: FetchOutcome,
}

/// Runs engine invocations across personas
pub struct StrategyRunner {
    engine: Arc<dyn ExtractionEngine>,
    personas: Vec<Persona>,
    socket_timeout: Duration,
    invocation_timeout: Duration,
    retries: u32,
    rate_limit_bps: Option<u64>,
    cookie_file: Option<PathBuf>,
    backoff: BackoffConfig,
    pacer: Option<Arc<DefaultDirectRateLimiter>>,
    resolver: Arc<FileResolver>,
}

impl StrategyRunner {
    /// Create a runner from service options
    pub fn new(engine: Arc<dyn ExtractionEngine>, options: &ServiceOptions) -> Self {
        // One start of headroom above the steady rate
        let pacer = options.engine_starts_per_second.map(|rate| {
            let quota = Quota::per_second(rate).allow_burst(rate.saturating_add(1));
            Arc::new(RateLimiter::direct(quota))
        });

        Self {
            engine,
            personas: Persona::ALL.to_vec(),
            socket_timeout: options.socket_timeout,
            invocation_timeout: options.extract_timeout,
            retries: options.retries,
            rate_limit_bps: options.download_rate_bps,
            cookie_file: options.cookie_file.clone(),
            backoff: BackoffConfig::default(),
            pacer,
            resolver: Arc::new(FileResolver::new(
                options.downloads_dir.clone(),
                options.recent_window,
            )),
        }
    }

    /// Override the persona order
    pub fn with_personas(mut self, personas: Vec<Persona>) -> Self {
        self.personas = personas;
        self
    }

    /// Override the backoff between transient failures
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Disable process-wide pacing of engine starts
    pub fn without_pacing(mut self) -> Self {
        self.pacer = None;
        self
    }

    /// Name of the underlying engine
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Whether a cookie file is currently present
    pub fn has_cookies(&self) -> bool {
        self.active_cookie_file().is_some()
    }

    fn active_cookie_file(&self) -> Option<PathBuf> {
        self.cookie_file
            .as_ref()
            .filter(|path| path.is_file())
            .cloned()
    }

    fn request_for(&self, persona: Persona, format: Option<FormatSelection>) -> EngineRequest {
        EngineRequest {
            persona,
            profile: persona.profile(),
            format,
            output_template: None,
            socket_timeout: self.socket_timeout,
            invocation_timeout: self.invocation_timeout,
            retries: self.retries,
            rate_limit_bps: self.rate_limit_bps,
            cookie_file: self.active_cookie_file(),
        }
    }

    /// Try `attempt` with each persona until one succeeds
    async fn run<T, F, Fut>(&self, url: &Url, mut attempt: F) -> Result<Attempted<T>, ServiceError>
    where
        F: FnMut(Persona) -> Fut,
        Fut: Future<Output = Result<T, EngineFailure>>,
    {
        let mut attempted = Vec::with_capacity(self.personas.len());
        let mut last_error = None;
        let mut transient_failures = 0u32;

        for (index, &persona) in self.personas.iter().enumerate() {
            if let Some(pacer) = &self.pacer {
                pacer.until_ready().await;
            }

            attempted.push(persona);
            debug!("Trying persona {} for {}", persona, url);

            let failure = match attempt(persona).await {
                Ok(value) => {
                    info!("Persona {} succeeded for {}", persona, url);
                    return Ok(Attempted {
                        value,
                        persona,
                        attempted,
                    });
                }
                Err(failure) => failure,
            };

            let message = failure.to_string();
            let class = classify_failure(&failure);
            warn!("Persona {} failed ({:?}): {}", persona, class, message);

            let error = class.into_error(message);
            match class {
                FailureClass::Unavailable => return Err(error),
                FailureClass::Challenge => {}
                FailureClass::Transient => {
                    if index + 1 < self.personas.len() {
                        self.backoff.wait(transient_failures).await;
                    }
                    transient_failures += 1;
                }
            }
            last_error = Some(error);
        }

        let last = last_error
            .map(|error| error.to_string())
            .unwrap_or_else(|| "no personas configured".to_string());
        Err(ServiceError::ExtractionFailed(format!(
            "tried {}; last error: {}",
            attempted
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(", "),
            last
        )))
    }

    /// Fetch preview metadata for `url`
    pub async fn fetch_preview(&self, url: &Url) -> Result<PreviewEntry, ServiceError> {
        let target = url.as_str();
        let done = self
            .run(url, |persona| {
                let request = self.request_for(persona, None);
                async move { self.engine.probe(target, &request).await }
            })
            .await?;

        let metadata = done.value;
        Ok(PreviewEntry::new(
            cache_key(url),
            metadata.title_or_default().to_string(),
            metadata.duration_seconds(),
            metadata.thumbnail.clone().unwrap_or_default(),
            metadata.channel_or_default().to_string(),
            metadata.view_count.unwrap_or(0),
        ))
    }

    /// Download `url` and return the located, renamed file
    pub async fn download(
        &self,
        url: &Url,
        format: MediaFormat,
        quality: Quality,
    ) -> Result<ResolvedFile, ServiceError> {
        let mut job = DownloadJob::new(url.clone(), format, quality);
        let selection = format_selection(format, quality);
        let target = url.as_str();
        let token = job.token.clone();
        let dir = self.resolver.dir().to_path_buf();

        let done = self
            .run(url, |persona| {
                let mut request = self.request_for(persona, Some(selection));
                let token = token.clone();
                let dir = dir.clone();
                async move {
                    let metadata = self.engine.probe(target, &request).await?;
                    let expected_stem = output_stem(metadata.title_or_default(), &token);
                    request.output_template = Some(dir.join(format!("{}.%(ext)s", expected_stem)));

                    let outcome = self.engine.fetch(target, &request).await?;
                    Ok::<_, EngineFailure>(FetchedAttempt {
                        metadata,
                        expected_stem,
                        outcome,
                    })
                }
            })
            .await?;
        job.attempted_personas = done.attempted;

        let FetchedAttempt {
            metadata,
            expected_stem,
            outcome,
        } = done.value;
        let title = metadata.title_or_default().to_string();

        let resolver = Arc::clone(&self.resolver);
        let claim_title = title.clone();
        let (path, step) = tokio::task::spawn_blocking(move || {
            let (found, step) = resolver
                .locate(&expected_stem, &token, outcome.reported_path.as_deref())
                .ok_or_else(|| {
                    ServiceError::FileNotResolved(format!(
                        "engine reported success but no output for {} was found",
                        expected_stem
                    ))
                })?;
            debug!("Located {} via {:?}", found.display(), step);
            let claimed = resolver.claim_name(&found, &claim_title)?;
            Ok::<_, ServiceError>((claimed, step))
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("file resolution task failed: {}", e)))??;

        let size_bytes = tokio::fs::metadata(&path).await?.len();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ServiceError::FileNotResolved(path.display().to_string()))?;
        job.resolved_file_path = Some(path.clone());

        info!(
            "Downloaded {} ({}) with persona {}",
            filename,
            format_bytes(size_bytes),
            done.persona
        );

        Ok(ResolvedFile {
            path,
            filename,
            title,
            size_bytes,
            persona: done.persona,
            step,
            job,
        })
    }
}

/// Random lowercase hex job token
fn new_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
        .collect()
}
