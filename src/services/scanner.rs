//! Scanner bridge client: profile listing and batch scans.
//!
//! In mock mode no scanner is contacted: profiles are a fixed list and the
//! batch comes from the save service's `/mock-scan` endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_success, read_json, ServiceError};
use crate::models::{deserialize_optional_image, ImageBuffer};

pub const MOCK_PROFILES: [&str; 2] = ["Mock Profile 1", "Mock Profile 2"];

/// One document as delivered by the bridge. `front` lands in slot A and
/// `back` in slot B (the identification surface).
#[derive(Debug, Clone, Deserialize)]
pub struct RawScanPair {
    #[serde(default, deserialize_with = "deserialize_optional_image")]
    pub front: Option<ImageBuffer>,
    #[serde(default, deserialize_with = "deserialize_optional_image")]
    pub back: Option<ImageBuffer>,
}

#[derive(Deserialize)]
struct ProfilesResponse {
    success: bool,
    #[serde(default)]
    profiles: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ScanResponse {
    success: bool,
    #[serde(default)]
    data: Option<Vec<RawScanPair>>,
    #[serde(default)]
    message: Option<String>,
}

fn rejection(message: Option<String>) -> ServiceError {
    ServiceError::Rejected(
        message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Unknown error".to_string()),
    )
}

/// Scanner bridge abstraction (allows mocking for tests)
#[async_trait]
pub trait ScannerBridge: Send + Sync {
    async fn list_profiles(&self) -> Result<Vec<String>, ServiceError>;

    /// Scan every sheet in the feeder using `profile`, in feed order.
    async fn scan(&self, profile: &str) -> Result<Vec<RawScanPair>, ServiceError>;
}

pub struct HttpScannerBridge {
    client: reqwest::Client,
    scanner_url: String,
    save_url: String,
    use_mock: bool,
}

impl HttpScannerBridge {
    pub fn new(client: reqwest::Client, scanner_url: &str, save_url: &str, use_mock: bool) -> Self {
        Self {
            client,
            scanner_url: scanner_url.trim_end_matches('/').to_string(),
            save_url: save_url.trim_end_matches('/').to_string(),
            use_mock,
        }
    }
}

#[async_trait]
impl ScannerBridge for HttpScannerBridge {
    async fn list_profiles(&self) -> Result<Vec<String>, ServiceError> {
        if self.use_mock {
            return Ok(MOCK_PROFILES.iter().map(|p| p.to_string()).collect());
        }

        let url = format!("{}/profiles", self.scanner_url);
        let resp = self.client.get(&url).send().await?;
        let resp = ensure_success(resp).await?;
        let parsed: ProfilesResponse = read_json(resp).await?;
        if !parsed.success {
            return Err(rejection(parsed.message));
        }

        tracing::debug!(count = parsed.profiles.len(), "Scanner profiles loaded");
        Ok(parsed.profiles)
    }

    async fn scan(&self, profile: &str) -> Result<Vec<RawScanPair>, ServiceError> {
        let request = if self.use_mock {
            self.client.get(format!("{}/mock-scan", self.save_url))
        } else {
            self.client
                .get(format!("{}/scan", self.scanner_url))
                .query(&[("profile", profile)])
        };

        tracing::info!(profile, mock = self.use_mock, "Requesting scan");
        let resp = ensure_success(request.send().await?).await?;
        let parsed: ScanResponse = read_json(resp).await?;
        if !parsed.success {
            return Err(rejection(parsed.message));
        }

        Ok(parsed.data.unwrap_or_default())
    }
}

/// Mock scanner bridge for unit testing.
#[derive(Default)]
pub struct MockScannerBridge {
    profiles: Vec<String>,
    pairs: Vec<RawScanPair>,
    failure: Option<String>,
}

impl MockScannerBridge {
    pub fn new(pairs: Vec<RawScanPair>) -> Self {
        Self {
            profiles: MOCK_PROFILES.iter().map(|p| p.to_string()).collect(),
            pairs,
            failure: None,
        }
    }

    /// Bridge whose scans are refused with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl ScannerBridge for MockScannerBridge {
    async fn list_profiles(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.profiles.clone())
    }

    async fn scan(&self, _profile: &str) -> Result<Vec<RawScanPair>, ServiceError> {
        match &self.failure {
            Some(message) => Err(ServiceError::Rejected(message.clone())),
            None => Ok(self.pairs.clone()),
        }
    }
}
