use thiserror::Error;

use crate::models::ImageDataError;

/// Failures at the external HTTP boundaries (scanner bridge, registry,
/// save service, records listing).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Server { status: u16, body: String },

    /// The service answered but reported `success: false`.
    #[error("{0}")]
    Rejected(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid image data: {0}")]
    InvalidImage(#[from] ImageDataError),
}

impl ServiceError {
    /// Message for the operator; server bodies are trimmed to a single line.
    pub fn operator_message(&self) -> String {
        match self {
            Self::Rejected(message) => message.clone(),
            Self::Server { status, body } => {
                let line = body.lines().next().unwrap_or_default().trim();
                if line.is_empty() {
                    format!("Server returned {status}")
                } else {
                    format!("Server returned {status}: {line}")
                }
            }
            other => other.to_string(),
        }
    }
}
