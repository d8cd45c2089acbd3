// Application state module
// Shared by every connection: configuration, the relay and shutdown tokens

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::types::Config;
use crate::model::{replicate::ReplicateModel, VideoEffectsModel};
use crate::relay::VideoRelay;

/// Application state
pub struct AppState {
    pub config: Config,
    pub relay: VideoRelay,
    /// Cancelled when the process is asked to stop accepting connections
    pub shutdown: CancellationToken,
    /// Cancelled once the shutdown grace period ends; aborts in-flight model calls
    pub abort: CancellationToken,
}

impl AppState {
    /// Create `AppState` backed by the hosted Replicate model
    pub async fn new(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let model = ReplicateModel::from_config(&config.model)?;
        Ok(Self::with_model(config, Arc::new(model)).await?)
    }

    /// Create `AppState` around any model implementation
    ///
    /// Creates the staging and output directories if they are missing.
    pub async fn with_model(
        config: &Config,
        model: Arc<dyn VideoEffectsModel>,
    ) -> std::io::Result<Self> {
        let relay = VideoRelay::open(&config.storage, model, config.model.deadline()).await?;

        Ok(Self {
            config: config.clone(),
            relay,
            shutdown: CancellationToken::new(),
            abort: CancellationToken::new(),
        })
    }
}
