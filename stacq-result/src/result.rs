use crate::error::Error;

/// Result alias used across all stacq crates.
pub type Result<T> = std::result::Result<T, Error>;
