//! Save service client (`POST /save`).

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ensure_success, read_json, ServiceError};

/// Body of `POST /save`. Image fields are data URLs of the baked buffers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavePayload {
    pub doc_name: String,
    pub npsn: String,
    pub sn_bapp: String,
    pub hasil_cek: String,
    pub image_front: String,
    pub image_back: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nama_sekolah: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Persistence abstraction (allows mocking for tests)
#[async_trait]
pub trait SaveService: Send + Sync {
    async fn save(&self, payload: &SavePayload) -> Result<SaveResponse, ServiceError>;
}

pub struct HttpSaveService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSaveService {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SaveService for HttpSaveService {
    async fn save(&self, payload: &SavePayload) -> Result<SaveResponse, ServiceError> {
        let url = format!("{}/save", self.base_url);
        tracing::debug!(url = %url, doc_name = %payload.doc_name, "Submitting document to save service");

        let resp = self.client.post(&url).json(payload).send().await?;
        let resp = ensure_success(resp).await?;
        read_json(resp).await
    }
}

/// Mock save service for unit testing.
pub struct MockSaveService {
    response: SaveResponse,
    failure: Option<String>,
    delay: Option<Duration>,
    payloads: Mutex<Vec<SavePayload>>,
}

impl MockSaveService {
    /// Service that accepts everything.
    pub fn accepting() -> Self {
        Self::responding(true, "Saved")
    }

    pub fn responding(success: bool, message: &str) -> Self {
        Self {
            response: SaveResponse {
                success,
                message: message.to_string(),
            },
            failure: None,
            delay: None,
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Transport-level failure on every call.
    pub fn failing(message: &str) -> Self {
        let mut service = Self::accepting();
        service.failure = Some(message.to_string());
        service
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn payloads(&self) -> Vec<SavePayload> {
        self.payloads
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl SaveService for MockSaveService {
    async fn save(&self, payload: &SavePayload) -> Result<SaveResponse, ServiceError> {
        match self.payloads.lock() {
            Ok(mut p) => p.push(payload.clone()),
            Err(poisoned) => poisoned.into_inner().push(payload.clone()),
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.failure {
            Some(message) => Err(ServiceError::Server {
                status: 500,
                body: message.clone(),
            }),
            None => Ok(self.response.clone()),
        }
    }
}
