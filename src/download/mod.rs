//! Download artifacts: locating engine output, backoff and retention

pub mod resolver;
pub mod retention;
pub mod retry;

pub use resolver::*;
pub use retention::*;
pub use retry::*;
