//! HTTP response building module
//!
//! Builders for the status codes the relay answers with.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, SERVER};
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Methods accepted on the upload endpoint
pub const UPLOAD_METHODS: &str = "POST, OPTIONS";
/// Methods accepted on probe endpoints
pub const PROBE_METHODS: &str = "GET, HEAD, OPTIONS";

/// Plain-text response with the given status
pub fn build_text_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from(message.to_string())))
        })
}

/// JSON response; falls back to 500 if `value` fails to serialize
pub fn build_json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = match serde_json::to_vec(value) {
        Ok(body) => body,
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response body: {e}"));
            return build_text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Internal Server Error: {e}"),
            );
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response listing the methods `allow`ed on the path
pub fn build_405_response(allow: &'static str) -> Response<Full<Bytes>> {
    let mut resp = build_text_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed");
    resp.headers_mut()
        .insert("Allow", HeaderValue::from_static(allow));
    resp
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large")
}

/// Probe response: 200 "ok", or 503 when not ready
pub fn build_health_response(ready: bool) -> Response<Full<Bytes>> {
    if ready {
        build_text_response(StatusCode::OK, "ok")
    } else {
        build_text_response(StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", UPLOAD_METHODS);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", UPLOAD_METHODS)
            .header("Access-Control-Allow-Headers", "Content-Type")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Stamp the `Server` header, plus the CORS origin on non-preflight responses
pub fn apply_common_headers(
    resp: &mut Response<Full<Bytes>>,
    server_name: &str,
    enable_cors: bool,
) {
    let headers = resp.headers_mut();
    match HeaderValue::from_str(server_name) {
        Ok(value) => {
            headers.insert(SERVER, value);
        }
        Err(e) => crate::logger::log_warning(&format!("Invalid server_name '{server_name}': {e}")),
    }
    if enable_cors && !headers.contains_key("Access-Control-Allow-Origin") {
        headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    }
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
