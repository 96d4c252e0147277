//! Utility functions for common operations.
//!
//! - **URL validation**: feed URLs the service can reach, and an https-only service host
//! - **Filesystem**: atomic replacement of cache files

mod fs;
mod url_validator;

pub use fs::atomic_write;
pub use url_validator::{validate_service_host, validate_url, UrlValidationError};
