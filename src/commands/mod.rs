//! Host-facing commands over the shared [`CoreState`].
//!
//! Each command takes the state the host keeps in an `Arc`, returns
//! `Result<T, String>` and converts errors to operator-readable text.

pub mod documents;
pub mod records;
pub mod scan;

use crate::config;

/// Health check command: verifies the backend is running.
pub fn health_check() -> String {
    tracing::debug!("Health check called");
    "ok".to_string()
}

/// Application name and version for the host's about line.
pub fn app_info() -> (String, String) {
    (config::APP_NAME.to_string(), config::APP_VERSION.to_string())
}
