//! `POST /generate-video`
//!
//! Parses the form, validates it and hands the upload to the relay. Every failure
//! becomes a plain-text 400 or 500; success is a JSON document.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::form;
use crate::config::AppState;
use crate::http;
use crate::logger;
use crate::relay::{EffectSettings, GenerateError, GeneratedVideo, Upload};

#[derive(Debug, Serialize)]
struct GenerateResponse {
    status: &'static str,
    video_url: String,
    settings: EffectSettings,
}

impl From<GeneratedVideo> for GenerateResponse {
    fn from(video: GeneratedVideo) -> Self {
        Self {
            status: "success",
            video_url: video.video_url,
            settings: video.settings,
        }
    }
}

pub async fn handle_generate(
    state: &AppState,
    content_type: Option<&str>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    match generate(state, content_type, body).await {
        Ok(video) => {
            http::build_json_response(StatusCode::OK, &GenerateResponse::from(video))
        }
        Err(err) => {
            match &err {
                GenerateError::ClientInput(reason) => {
                    logger::log_warning(&format!("[Generate] Rejected upload: {reason}"));
                }
                GenerateError::Processing(cause) => {
                    logger::log_generate_failed(&format!("{cause:?}"));
                }
            }
            http::build_text_response(err.status(), &err.to_string())
        }
    }
}

async fn generate(
    state: &AppState,
    content_type: Option<&str>,
    body: Bytes,
) -> Result<GeneratedVideo, GenerateError> {
    let raw = form::parse_upload(content_type, body).await?;
    let upload = Upload::try_from(raw)?;
    let video = state
        .relay
        .generate(&upload, state.abort.child_token())
        .await?;
    Ok(video)
}
