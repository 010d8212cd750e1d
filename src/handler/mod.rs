//! Request handler module
//!
//! Routes requests to the task API, the upload directory and the frontend.

pub mod router;
pub mod static_files;

pub use router::handle_request;
