//! Main entry point for the fetchtube service

use anyhow::Context;
use clap::Parser;
use fetchtube::cli::{Args, OutputFormatter};
use fetchtube::engine::YtDlpEngine;
use fetchtube::server::{self, AppState};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.log_level());
    debug!("Starting fetchtube with args: {:?}", args);

    let formatter = OutputFormatter::new(args.verbosity_level());
    let options = args.to_options();

    tokio::fs::create_dir_all(&options.downloads_dir)
        .await
        .with_context(|| format!("cannot create {}", options.downloads_dir.display()))?;

    let engine = Arc::new(YtDlpEngine::new(options.engine_binary.clone()));
    let state = Arc::new(AppState::new(options.clone(), engine));

    if args.purge_on_start {
        state
            .sweeper
            .purge()
            .with_context(|| format!("cannot purge {}", options.downloads_dir.display()))?;
        formatter.info("Downloads directory purged");
    } else {
        let report = state.sweeper.sweep_now();
        if report.removed > 0 {
            formatter.info(&format!("Removed {} expired file(s)", report.removed));
        }
    }

    if options.active_cookie_file().is_none() {
        formatter.warning("No cookie file found, some videos may require sign-in");
    }

    let addr = args.bind_addr();
    formatter.print_banner(addr, &options, state.runner.engine_name());

    state.spawn_background();
    info!("Service ready");

    if let Err(e) = server::serve(state, addr).await {
        formatter.error(&format!("Server failed: {}", e));
        return Err(e).with_context(|| format!("server on {} failed", addr));
    }

    formatter.success("Shut down cleanly");
    Ok(())
}

/// Initialize logging system
fn init_logging(default_level: &str) {
    // RUST_LOG wins over the verbosity flags
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .compact(),
        )
        .init();
}
