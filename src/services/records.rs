//! Read side of the save service: archived records and the progress dashboard.

use serde::Deserialize;

use super::{ensure_success, read_json, ServiceError};
use crate::models::{DashboardReport, DashboardStat, StoredRecord};

#[derive(Deserialize)]
struct ListResponse<T> {
    success: bool,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> ListResponse<T> {
    fn into_data(self) -> Result<Vec<T>, ServiceError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ServiceError::Rejected(
                self.message.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }
}

pub struct RecordsClient {
    client: reqwest::Client,
    base_url: String,
}

impl RecordsClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Archived records, optionally filtered by school id (NPSN).
    pub async fn list_records(&self, npsn: Option<&str>) -> Result<Vec<StoredRecord>, ServiceError> {
        let mut request = self.client.get(format!("{}/records", self.base_url));
        if let Some(npsn) = npsn.map(str::trim).filter(|n| !n.is_empty()) {
            request = request.query(&[("npsn", npsn)]);
        }

        let resp = ensure_success(request.send().await?).await?;
        let parsed: ListResponse<StoredRecord> = read_json(resp).await?;
        let records = parsed.into_data()?;
        tracing::debug!(count = records.len(), "Records loaded");
        Ok(records)
    }

    /// Per-term progress, sorted with a trailing total row.
    pub async fn stats(&self) -> Result<DashboardReport, ServiceError> {
        let resp = ensure_success(self.client.get(format!("{}/stats", self.base_url)).send().await?).await?;
        let parsed: ListResponse<DashboardStat> = read_json(resp).await?;
        Ok(DashboardReport::from_stats(parsed.into_data()?))
    }

    /// Viewable URL of a stored document given its server-side path.
    pub fn scan_file_url(&self, path: &str) -> Result<String, ServiceError> {
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or_default().trim();
        if file_name.is_empty() {
            return Err(ServiceError::Malformed(format!("no file name in path '{path}'")));
        }
        Ok(format!("{}/scans/{}", self.base_url, file_name))
    }
}
