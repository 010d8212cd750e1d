//! HTTP protocol layer module
//!
//! Response builders, caching headers and MIME detection shared by the
//! static file handlers and the task API.

pub mod cache;
pub mod mime;
pub mod response;

pub use response::{
    apply_common_headers, build_304_response, build_404_response, build_405_response,
    build_413_response, build_health_response, build_options_response,
};
