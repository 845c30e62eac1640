//! Shared utilities.

mod url;

pub use url::{validate_base_url, BaseUrlError};
