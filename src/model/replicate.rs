//! Replicate-hosted video effects model
//!
//! Runs a prediction through the Replicate HTTP API: upload the staged video to the
//! files endpoint, create a prediction, poll it until it settles, then download the
//! output video.

use async_trait::async_trait;
use hyper::body::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{EffectRequest, ModelError, Result, VideoEffectsModel};
use crate::config::ModelConfig;
use crate::http::mime;
use crate::logger;

/// Upper bound on the cancel request sent for an abandoned prediction
const CANCEL_TIMEOUT: Duration = Duration::from_secs(10);

/// Model reference in `owner/name[:version]` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub owner: String,
    pub name: String,
    pub version: Option<String>,
}

impl FromStr for ModelRef {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ModelError::InvalidModelRef(s.to_string());

        let (path, version) = match s.split_once(':') {
            Some((path, version)) => (path, Some(version)),
            None => (s, None),
        };
        let (owner, name) = path.split_once('/').ok_or_else(invalid)?;

        if owner.is_empty()
            || name.is_empty()
            || name.contains('/')
            || version.is_some_and(str::is_empty)
        {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            version: version.map(ToString::to_string),
        })
    }
}

#[derive(Deserialize)]
struct FileUpload {
    urls: FileUrls,
}

#[derive(Deserialize)]
struct FileUrls {
    get: String,
}

#[derive(Serialize)]
struct PredictionInput<'a> {
    video: &'a str,
    dot_size: u8,
    threshold: u8,
    inverse: bool,
    inverse_threshold: bool,
}

#[derive(Serialize)]
struct CreatePrediction<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: PredictionInput<'a>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Canceled | Self::Aborted
        )
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Aborted => "aborted",
            Self::Unknown => "unknown",
        }
    }
}

/// Client for a single Replicate model
pub struct ReplicateModel {
    client: Client,
    api_base: String,
    api_token: String,
    model: ModelRef,
    poll_interval: Duration,
    cancel_timeout: Duration,
}

impl ReplicateModel {
    pub fn new(
        api_base: &str,
        api_token: String,
        model: ModelRef,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_token,
            model,
            poll_interval,
            cancel_timeout: CANCEL_TIMEOUT,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_token = config.resolve_token().ok_or(ModelError::MissingToken)?;
        let model = config.model.parse()?;
        Ok(Self::new(
            &config.api_base,
            api_token,
            model,
            config.poll_interval(),
        ))
    }

    /// Upload the staged video and return the URL predictions can read it from
    async fn upload_file(&self, request: &EffectRequest<'_>) -> Result<String> {
        let data = tokio::fs::read(request.input).await?;
        let part = Part::bytes(data)
            .file_name(request.filename.to_string())
            .mime_str(mime::video_content_type(request.filename))?;

        let response = self
            .client
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&self.api_token)
            .multipart(Form::new().part("content", part))
            .send()
            .await?;

        let upload: FileUpload = parse_json(response).await?;
        Ok(upload.urls.get)
    }

    async fn create_prediction(
        &self,
        video_url: &str,
        request: &EffectRequest<'_>,
    ) -> Result<Prediction> {
        let url = match self.model.version {
            Some(_) => format!("{}/predictions", self.api_base),
            None => format!(
                "{}/models/{}/{}/predictions",
                self.api_base, self.model.owner, self.model.name
            ),
        };
        let body = CreatePrediction {
            version: self.model.version.as_deref(),
            input: PredictionInput {
                video: video_url,
                dot_size: request.settings.dot_size,
                threshold: request.settings.threshold,
                inverse: request.settings.inverse,
                inverse_threshold: request.inverse_threshold,
            },
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;
        parse_json(response).await
    }

    async fn get_prediction(&self, id: &str) -> Result<Prediction> {
        let response = self
            .client
            .get(format!("{}/predictions/{id}", self.api_base))
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Ask Replicate to stop a prediction nobody is waiting for anymore
    async fn cancel_prediction(&self, id: &str) {
        let result = self
            .client
            .post(format!("{}/predictions/{id}/cancel", self.api_base))
            .bearer_auth(&self.api_token)
            .timeout(self.cancel_timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                logger::log_info(&format!("[Replicate] Prediction {id} cancelled"));
            }
            Ok(response) => logger::log_warning(&format!(
                "[Replicate] Cancelling prediction {id} returned {}",
                response.status()
            )),
            Err(e) => logger::log_warning(&format!(
                "[Replicate] Failed to cancel prediction {id}: {e}"
            )),
        }
    }

    async fn wait_for_completion(
        &self,
        mut prediction: Prediction,
        cancel: &CancellationToken,
    ) -> Result<Prediction> {
        while !prediction.status.is_terminal() {
            logger::log_debug(&format!(
                "[Replicate] Prediction {} is {}",
                prediction.id,
                prediction.status.as_str()
            ));

            let polled = tokio::select! {
                () = cancel.cancelled() => None,
                result = async {
                    tokio::time::sleep(self.poll_interval).await;
                    self.get_prediction(&prediction.id).await
                } => Some(result),
            };

            match polled {
                Some(result) => prediction = result?,
                None => {
                    self.cancel_prediction(&prediction.id).await;
                    return Err(ModelError::Cancelled);
                }
            }
        }
        Ok(prediction)
    }

    async fn download(&self, url: &str) -> Result<Bytes> {
        let response = check_status(self.client.get(url).send().await?).await?;
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl VideoEffectsModel for ReplicateModel {
    async fn apply(
        &self,
        request: &EffectRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<Bytes> {
        let video_url = until_cancelled(&cancel, self.upload_file(request)).await?;
        // Not raced against `cancel`: once sent, the prediction exists remotely and
        // only its id lets us cancel it.
        let created = self.create_prediction(&video_url, request).await?;
        logger::log_info(&format!("[Replicate] Prediction {} created", created.id));
        if cancel.is_cancelled() {
            if !created.status.is_terminal() {
                self.cancel_prediction(&created.id).await;
            }
            return Err(ModelError::Cancelled);
        }

        let finished = self.wait_for_completion(created, &cancel).await?;
        if finished.status != PredictionStatus::Succeeded {
            return Err(ModelError::PredictionFailed {
                status: finished.status.as_str().to_string(),
                message: error_message(finished.error.as_ref()),
            });
        }

        let url = output_url(finished.output.as_ref()).ok_or(ModelError::MissingOutput)?;
        until_cancelled(&cancel, self.download(&url)).await
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        () = cancel.cancelled() => Err(ModelError::Cancelled),
        result = fut => result,
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ModelError::Api {
        status: status.as_u16(),
        body,
    })
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    Ok(check_status(response).await?.json::<T>().await?)
}

/// A single URL, or the first URL of a list
fn output_url(output: Option<&Value>) -> Option<String> {
    match output? {
        Value::String(url) => Some(url.clone()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str().map(ToString::to_string)),
        _ => None,
    }
}

fn error_message(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Null) | None => "no error reported".to_string(),
        Some(other) => other.to_string(),
    }
}
