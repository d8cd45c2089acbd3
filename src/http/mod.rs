//! HTTP protocol layer module
//!
//! Response builders and MIME lookup, kept apart from the relay logic.

pub mod mime;
pub mod response;

// Re-export commonly used types
pub use response::{
    apply_common_headers, build_404_response, build_405_response, build_413_response,
    build_health_response, build_json_response, build_options_response, build_text_response,
    PROBE_METHODS, UPLOAD_METHODS,
};
