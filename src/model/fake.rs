//! In-process model for tests

use async_trait::async_trait;
use hyper::body::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{EffectRequest, ModelError, Result, VideoEffectsModel};
use crate::relay::EffectSettings;

/// What the model saw on one call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub filename: String,
    pub input: Vec<u8>,
    pub settings: EffectSettings,
    pub inverse_threshold: bool,
}

enum Behavior {
    Output(Vec<u8>),
    Fail,
    Hang,
    Unresponsive,
}

pub struct FakeModel {
    behavior: Behavior,
    calls: Mutex<Vec<RecordedCall>>,
    cancelled: AtomicBool,
}

impl FakeModel {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn succeeding(output: &[u8]) -> Self {
        Self::with(Behavior::Output(output.to_vec()))
    }

    pub fn failing() -> Self {
        Self::with(Behavior::Fail)
    }

    /// Never finishes on its own; returns once cancelled
    pub fn hanging() -> Self {
        Self::with(Behavior::Hang)
    }

    /// Ignores cancellation and never returns
    pub fn unresponsive() -> Self {
        Self::with(Behavior::Unresponsive)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn saw_cancel(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoEffectsModel for FakeModel {
    async fn apply(
        &self,
        request: &EffectRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<Bytes> {
        let input = tokio::fs::read(request.input).await?;
        self.calls.lock().unwrap().push(RecordedCall {
            filename: request.filename.to_string(),
            input,
            settings: request.settings,
            inverse_threshold: request.inverse_threshold,
        });

        match &self.behavior {
            Behavior::Output(bytes) => Ok(Bytes::from(bytes.clone())),
            Behavior::Fail => Err(ModelError::PredictionFailed {
                status: "failed".to_string(),
                message: "model exploded".to_string(),
            }),
            Behavior::Hang => {
                cancel.cancelled().await;
                self.cancelled.store(true, Ordering::SeqCst);
                Err(ModelError::Cancelled)
            }
            Behavior::Unresponsive => std::future::pending().await,
        }
    }
}
