pub mod error;
pub mod records;
pub mod registry;
pub mod save;
pub mod scanner;

pub use error::*;
pub use records::*;
pub use registry::*;
pub use save::*;
pub use scanner::*;

use std::time::Duration;

/// Shared HTTP client with the configured request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Turn a non-success status into [`ServiceError::Server`] carrying the body.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ServiceError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

/// Decode a JSON body, reporting shape mismatches as [`ServiceError::Malformed`].
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ServiceError> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| ServiceError::Malformed(e.to_string()))
}
