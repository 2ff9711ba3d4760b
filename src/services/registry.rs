//! Approval registry client (`/is-approved`).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_success, read_json, ServiceError};
use crate::models::{LookupKey, RegistryRecord};

/// Registry lookup abstraction (allows mocking for tests)
#[async_trait]
pub trait ApprovalRegistry: Send + Sync {
    /// All records registered under `identifier` for the chosen key.
    /// An empty vector means the registry knows nothing about it.
    async fn lookup(&self, identifier: &str, key: LookupKey) -> Result<Vec<RegistryRecord>, ServiceError>;
}

/// `{ data: [...] }`; a missing or null `data` reads as no records.
#[derive(Deserialize)]
struct ApprovalResponse {
    #[serde(default)]
    data: Option<Vec<RegistryRecord>>,
}

pub struct HttpApprovalRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApprovalRegistry {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ApprovalRegistry for HttpApprovalRegistry {
    async fn lookup(&self, identifier: &str, key: LookupKey) -> Result<Vec<RegistryRecord>, ServiceError> {
        let url = format!("{}/is-approved", self.base_url);
        tracing::debug!(url = %url, key = %key, identifier, "Querying approval registry");

        let resp = self
            .client
            .get(&url)
            .query(&[(key.query_param(), identifier)])
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let parsed: ApprovalResponse = read_json(resp).await?;

        let records = parsed.data.unwrap_or_default();
        tracing::debug!(count = records.len(), "Registry lookup complete");
        Ok(records)
    }
}

/// Mock registry for unit testing without the approval service.
#[derive(Default)]
pub struct MockApprovalRegistry {
    records: HashMap<(LookupKey, String), Vec<RegistryRecord>>,
    failure: Option<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<(LookupKey, String)>>,
}

impl MockApprovalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that is unreachable for every lookup.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_records(mut self, key: LookupKey, identifier: &str, records: Vec<RegistryRecord>) -> Self {
        self.records.insert((key, identifier.to_string()), records);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every lookup received, in order.
    pub fn requests(&self) -> Vec<(LookupKey, String)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl ApprovalRegistry for MockApprovalRegistry {
    async fn lookup(&self, identifier: &str, key: LookupKey) -> Result<Vec<RegistryRecord>, ServiceError> {
        match self.requests.lock() {
            Ok(mut r) => r.push((key, identifier.to_string())),
            Err(poisoned) => poisoned.into_inner().push((key, identifier.to_string())),
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.failure {
            return Err(ServiceError::Server {
                status: 503,
                body: message.clone(),
            });
        }

        Ok(self
            .records
            .get(&(key, identifier.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
