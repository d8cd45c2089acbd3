//! Request handler module
//!
//! Routes requests and turns the `/generate-video` form into a relay call.

mod form;
mod generate;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
