//! Core service logic: options, personas, quality table, rate limiting,
//! preview caching and the strategy runner

pub mod options;
pub mod persona;
pub mod preview;
pub mod quality;
pub mod rate_limit;
pub mod runner;

pub use options::*;
pub use persona::*;
pub use preview::*;
pub use quality::*;
pub use rate_limit::*;
pub use runner::*;
