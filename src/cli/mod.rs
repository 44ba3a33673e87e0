//! Command line interface for the service binary

pub mod args;
pub mod output;

pub use args::{Args, VerbosityLevel};
pub use output::OutputFormatter;
