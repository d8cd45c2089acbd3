//! Relay error taxonomy
//!
//! Two kinds reach the client: bad input (400) and everything else (500).
//! `ProcessingError` keeps the underlying cause for logs and tests.

use hyper::StatusCode;
use std::time::Duration;

use crate::model::ModelError;

/// Failure of a `/generate-video` request
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The request broke a precondition; nothing was written to disk
    #[error("{0}")]
    ClientInput(String),

    #[error("Internal Server Error: {0}")]
    Processing(#[from] ProcessingError),
}

impl GenerateError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ClientInput(_) => StatusCode::BAD_REQUEST,
            Self::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failure after validation: staging, delegation or persistence
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed to save output video: {0}")]
    Persist(#[source] std::io::Error),

    #[error("video effects model did not finish within {}s", .0.as_secs())]
    Timeout(Duration),
}
