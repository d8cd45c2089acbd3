//! Video effects model abstraction
//!
//! The dotted-video effect itself runs in a hosted model. This module defines the
//! `VideoEffectsModel` trait the relay delegates to, so the hosted client can be swapped
//! for an in-process fake in tests.

#[cfg(test)]
pub mod fake;
pub mod replicate;

use async_trait::async_trait;
use hyper::body::Bytes;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::relay::EffectSettings;

/// One delegation call: a staged video plus the effect knobs
#[derive(Debug, Clone, Copy)]
pub struct EffectRequest<'a> {
    /// Staged copy of the upload on local disk
    pub input: &'a Path,
    /// File name the client declared, used to pick a MIME type
    pub filename: &'a str,
    pub settings: EffectSettings,
    /// Always `relay::INVERSE_THRESHOLD`
    pub inverse_threshold: bool,
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised by a video effects model
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("REPLICATE_API_TOKEN is not set")]
    MissingToken,

    #[error("invalid model reference '{0}', expected owner/name[:version]")]
    InvalidModelRef(String),

    #[error("failed to read staged video: {0}")]
    Io(#[from] std::io::Error),

    #[error("request to model API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("prediction {status}: {message}")]
    PredictionFailed { status: String, message: String },

    #[error("prediction finished without an output video")]
    MissingOutput,

    #[error("model call was cancelled")]
    Cancelled,
}

/// Opaque function from (video, parameters) to processed video bytes
#[async_trait]
pub trait VideoEffectsModel: Send + Sync {
    /// Run the effect over the staged video and return the processed bytes.
    ///
    /// Implementations must return `ModelError::Cancelled` promptly once `cancel` fires,
    /// releasing any remote work they started.
    async fn apply(&self, request: &EffectRequest<'_>, cancel: CancellationToken)
        -> Result<Bytes>;
}
