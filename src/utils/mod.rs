//! Utility functions for fetchtube

pub mod filename;
pub mod format;
pub mod mime;
pub mod url;

pub use filename::*;
pub use format::*;
pub use mime::*;
pub use url::*;
