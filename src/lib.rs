//! # fetchtube - video preview and download service
//!
//! HTTP service that previews and downloads media by delegating extraction
//! to `yt-dlp`.
//!
//! ## Features
//!
//! - Multi-persona extraction with fallback (web, android, ios)
//! - Per-caller sliding-window rate limiting
//! - Short-lived preview cache
//! - Robust location of engine output and collision-free naming
//! - Retention sweeps and delayed removal of served files
//!
//! ## Example
//!
//! ```rust,no_run
//! use fetchtube::core::ServiceOptions;
//! use fetchtube::engine::YtDlpEngine;
//! use fetchtube::server::{serve, AppState};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ServiceOptions::default();
//!     let engine = Arc::new(YtDlpEngine::new(options.engine_binary.clone()));
//!     let state = Arc::new(AppState::new(options, engine));
//!
//!     state.spawn_background();
//!     serve(state, "0.0.0.0:5000".parse()?).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod download;
pub mod engine;
pub mod error;
pub mod server;
pub mod utils;

// Re-export main types
pub use core::{MediaFormat, Persona, PreviewEntry, Quality, ServiceOptions, StrategyRunner};
pub use engine::{ExtractionEngine, YtDlpEngine};
pub use error::ServiceError;
pub use server::AppState;

/// Result type alias for fetchtube operations
pub type Result<T> = std::result::Result<T, ServiceError>;
