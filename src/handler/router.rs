//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, body limits,
//! route matching and the access log.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, REFERER, USER_AGENT};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, StatusCode, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::generate::handle_generate;
use crate::config::AppState;
use crate::http;
use crate::logger::{self, AccessLogEntry};

/// The relay's only processing endpoint
pub const GENERATE_PATH: &str = "/generate-video";

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let logging = &state.config.logging;
    logger::log_headers_count(parts.headers.len(), logging.show_headers);

    let entry = logging.access_log.then(|| access_entry(&parts, peer));

    let mut resp = route(&parts, body, &state).await;
    http::apply_common_headers(
        &mut resp,
        &state.config.http.server_name,
        state.config.http.enable_cors,
    );

    if let Some(mut entry) = entry {
        entry.status = resp.status().as_u16();
        entry.body_bytes = usize::try_from(resp.body().size_hint().lower()).unwrap_or(usize::MAX);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &logging.access_log_format);
    }

    Ok(resp)
}

async fn route<B>(parts: &Parts, body: B, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = parts.uri.path();

    if parts.method == Method::OPTIONS {
        return http::build_options_response(state.config.http.enable_cors);
    }

    // Health check endpoints
    let health = &state.config.routes.health;
    if health.enabled && (path == health.liveness_path || path == health.readiness_path) {
        if !matches!(parts.method, Method::GET | Method::HEAD) {
            return http::build_405_response(http::PROBE_METHODS);
        }
        let ready = path == health.liveness_path || state.relay.is_ready();
        return http::build_health_response(ready);
    }

    if path != GENERATE_PATH {
        return http::build_404_response();
    }
    if parts.method != Method::POST {
        logger::log_warning(&format!("Method not allowed: {} {path}", parts.method));
        return http::build_405_response(http::UPLOAD_METHODS);
    }

    let max_body_size = state.config.http.max_body_size;
    if let Some(resp) = check_body_size(parts, max_body_size) {
        return resp;
    }
    let body = match read_body(body, max_body_size).await {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    handle_generate(state, content_type, body).await
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(parts: &Parts, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = parts.headers.get(CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Collect the body, stopping at `max_body_size` even if the client lied about its length
async fn read_body<B>(body: B, max_body_size: u64) -> Result<Bytes, Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_warning(&format!("Request body exceeded {max_body_size} bytes"));
            Err(http::build_413_response())
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            Err(http::build_text_response(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ))
        }
    }
}

fn access_entry(parts: &Parts, peer: SocketAddr) -> AccessLogEntry {
    let header = |name: hyper::header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer.ip().to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = version_label(parts.version).to_string();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry.request_bytes = header(CONTENT_LENGTH).and_then(|v| v.parse().ok());
    entry
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
