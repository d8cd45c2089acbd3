//! Video relay
//!
//! Runs one `/generate-video` request after validation:
//! stage the upload, delegate to the effects model, persist the output.
//! The staged upload is removed on every exit path.

mod error;
mod output;
mod settings;
mod staging;

pub use error::{GenerateError, ProcessingError};
pub use settings::{EffectSettings, RawUpload, Upload, INVERSE_THRESHOLD};

use hyper::body::Bytes;
use output::ArtifactStore;
use staging::{StagedFile, StagingArea};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::StorageConfig;
use crate::logger;
use crate::model::{EffectRequest, VideoEffectsModel};

/// How long a timed-out model call may take to release its remote work
const WIND_DOWN: Duration = Duration::from_secs(15);

/// Result of a successful request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVideo {
    pub video_url: String,
    pub settings: EffectSettings,
}

pub struct VideoRelay {
    staging: StagingArea,
    artifacts: ArtifactStore,
    model: Arc<dyn VideoEffectsModel>,
    deadline: Option<Duration>,
    wind_down: Duration,
}

impl VideoRelay {
    /// Open the staging and output directories and wrap `model`
    pub async fn open(
        storage: &StorageConfig,
        model: Arc<dyn VideoEffectsModel>,
        deadline: Option<Duration>,
    ) -> io::Result<Self> {
        Ok(Self {
            staging: StagingArea::open(&storage.staging_dir).await?,
            artifacts: ArtifactStore::open(storage).await?,
            model,
            deadline,
            wind_down: WIND_DOWN,
        })
    }

    /// Both working directories are still present
    pub fn is_ready(&self) -> bool {
        self.staging.dir().is_dir() && self.artifacts.dir().is_dir()
    }

    pub async fn generate(
        &self,
        upload: &Upload,
        cancel: CancellationToken,
    ) -> Result<GeneratedVideo, ProcessingError> {
        let staged = self
            .staging
            .stage(&upload.filename, &upload.data)
            .await
            .map_err(ProcessingError::Staging)?;

        let result = self.process(&staged, upload, cancel).await;
        staged.release().await;
        result
    }

    async fn process(
        &self,
        staged: &StagedFile,
        upload: &Upload,
        cancel: CancellationToken,
    ) -> Result<GeneratedVideo, ProcessingError> {
        let output = self.delegate(staged, upload, cancel).await?;
        let artifact = self
            .artifacts
            .persist(&output)
            .await
            .map_err(ProcessingError::Persist)?;

        Ok(GeneratedVideo {
            video_url: artifact.url,
            settings: upload.settings,
        })
    }

    /// Call the model, bounded by the configured deadline if any
    async fn delegate(
        &self,
        staged: &StagedFile,
        upload: &Upload,
        cancel: CancellationToken,
    ) -> Result<Bytes, ProcessingError> {
        let request = EffectRequest {
            input: staged.path(),
            filename: &upload.filename,
            settings: upload.settings,
            inverse_threshold: INVERSE_THRESHOLD,
        };

        logger::log_delegation_started(&upload.settings);
        let started = Instant::now();
        let mut call = self.model.apply(&request, cancel.clone());

        let output = match self.deadline {
            None => call.await?,
            Some(limit) => tokio::select! {
                result = &mut call => result?,
                () = tokio::time::sleep(limit) => {
                    cancel.cancel();
                    if tokio::time::timeout(self.wind_down, call).await.is_err() {
                        logger::log_warning(&format!(
                            "[Relay] Model did not wind down within {}s after the deadline",
                            self.wind_down.as_secs()
                        ));
                    }
                    return Err(ProcessingError::Timeout(limit));
                }
            },
        };

        logger::log_delegation_finished(started.elapsed(), output.len());
        Ok(output)
    }
}
