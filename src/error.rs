use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failures the tracker distinguishes. Only `NoActivityFound`, `Superseded` and
/// first-page transport failures ever reach the caller; the rest are recovered
/// by stopping pagination.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("no activity found for this wallet address")]
    NoActivityFound,

    #[error("http {status}")]
    Http { status: StatusCode },

    #[error("page request timed out after {0:?}")]
    Timeout(Duration),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("fetch superseded by a newer request")]
    Superseded,

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl TrackerError {
    /// Whether the first page failing this way means "this wallet has nothing".
    pub fn is_not_found(&self) -> bool {
        matches!(self, TrackerError::NoActivityFound)
            || matches!(self, TrackerError::Http { status } if *status == StatusCode::NOT_FOUND)
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
