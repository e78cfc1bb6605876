pub mod config;
pub mod models;
pub mod source;
pub mod util;

use std::time::Duration;

use thiserror::Error;

/// Failure of a single call to GitHub or the tracker.
///
/// None of these abort a correlation: callers turn them into an absent
/// ticket, empty dependencies or an empty commit range.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Not found")]
    NotFound,
    #[error("Access denied")]
    AccessDenied,
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl FetchError {
    /// Whether the remote side answered that the resource is unavailable to us,
    /// as opposed to the request itself failing.
    pub fn is_missing(&self) -> bool { matches!(self, Self::NotFound | Self::AccessDenied) }
}
