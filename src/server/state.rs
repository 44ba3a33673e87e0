//! Shared service state injected into every handler

use crate::core::{
    MediaFormat, PreviewCache, PreviewEntry, Quality, RateLimiter, ResolvedFile, ServiceOptions,
    StrategyRunner,
};
use crate::download::RetentionSweeper;
use crate::engine::ExtractionEngine;
use crate::error::ServiceError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;
use url::Url;

/// Everything a request handler needs
pub struct AppState {
    pub options: Arc<ServiceOptions>,
    pub limiter: RateLimiter,
    pub cache: PreviewCache,
    pub runner: StrategyRunner,
    pub sweeper: Arc<RetentionSweeper>,
    pub shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl AppState {
    /// Build the state around `engine`
    pub fn new(options: ServiceOptions, engine: Arc<dyn ExtractionEngine>) -> Self {
        let runner = StrategyRunner::new(engine, &options);
        Self::with_runner(options, runner)
    }

    /// Build the state around an already configured runner
    pub fn with_runner(options: ServiceOptions, runner: StrategyRunner) -> Self {
        let shutdown = CancellationToken::new();
        let sweeper = Arc::new(RetentionSweeper::new(
            options.downloads_dir.clone(),
            options.retention,
            options.serve_grace,
            shutdown.child_token(),
        ));

        Self {
            limiter: RateLimiter::new(options.rate_limit, options.rate_window),
            cache: PreviewCache::new(options.cache_ttl, options.cache_capacity),
            runner,
            sweeper,
            shutdown,
            tasks: TaskTracker::new(),
            options: Arc::new(options),
        }
    }

    /// Admit a request from `identity` or report how long to wait
    pub fn admit(&self, identity: &str) -> Result<(), ServiceError> {
        if self.limiter.admit(identity) {
            return Ok(());
        }
        Err(ServiceError::RateLimited {
            retry_after: self.limiter.retry_after(identity),
        })
    }

    /// Preview metadata, served from cache when fresh
    pub async fn preview(&self, url: &Url) -> Result<PreviewEntry, ServiceError> {
        if let Some(entry) = self.cache.get(url).await {
            debug!("Preview cache hit for {}", url);
            return Ok(entry);
        }

        let entry = self.runner.fetch_preview(url).await?;
        self.cache.put(url, entry.clone()).await;
        Ok(entry)
    }

    /// Download `url` into the downloads directory
    pub async fn download(
        &self,
        url: &Url,
        format: MediaFormat,
        quality: Quality,
    ) -> Result<ResolvedFile, ServiceError> {
        tokio::fs::create_dir_all(&self.options.downloads_dir).await?;
        self.runner.download(url, format, quality).await
    }

    /// Whether the engine currently receives a cookie file
    pub fn has_cookies(&self) -> bool {
        self.runner.has_cookies()
    }

    /// Start the retention sweep and the cache/rate-table maintenance loop
    pub fn spawn_background(self: &Arc<Self>) {
        self.sweeper.spawn_periodic(self.options.sweep_interval);

        let state = Arc::clone(self);
        let period = self.options.cache_ttl.max(Duration::from_secs(1));
        self.tasks.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = state.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let expired = state.cache.sweep().await;
                        let idle = state.limiter.prune();
                        debug!("Maintenance: {} stale previews, {} idle callers dropped", expired, idle);
                    }
                }
            }
        });
    }

    /// Stop background tasks and wait for them
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        self.sweeper.shutdown().await;
    }
}
