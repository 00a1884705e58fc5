//! Utility functions and helpers.

pub mod http;

pub use http::{HttpTransport, create_async_client, create_download_client, redact_url};
