//! Read side: archived records and the dashboard.

use std::sync::Arc;

use crate::core_state::CoreState;
use crate::models::{DashboardReport, StoredRecord};

/// Archived records, optionally filtered by school id.
pub async fn list_records(state: &Arc<CoreState>, npsn: Option<String>) -> Result<Vec<StoredRecord>, String> {
    state.records().list_records(npsn.as_deref()).await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to fetch records");
        e.operator_message()
    })
}

pub async fn dashboard(state: &Arc<CoreState>) -> Result<DashboardReport, String> {
    state.records().stats().await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to fetch dashboard stats");
        e.operator_message()
    })
}

/// Viewable URL for a stored record's file.
pub fn scan_file_url(state: &Arc<CoreState>, record: &StoredRecord) -> Result<String, String> {
    state.records().scan_file_url(&record.path).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    use super::*;
    use crate::config::ServiceConfig;
    use crate::pipeline::extraction::MockOcrEngine;
    use crate::services::test_support::spawn_server;
    use crate::services::{MockApprovalRegistry, MockSaveService, MockScannerBridge, RecordsClient};

    async fn records_handler(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let npsn = params.get("npsn").cloned().unwrap_or_else(|| "20100001".into());
        Json(json!({
            "success": true,
            "data": [{
                "ID": 7,
                "doc_name": "X1",
                "npsn": npsn,
                "sn_bapp": "X1",
                "hasil_cek": "sesuai",
                "path": "C:\\archive\\scans\\X1.pdf",
                "created_at": "2024-05-01 10:00:00"
            }]
        }))
    }

    async fn stats_handler() -> Json<Value> {
        Json(json!({
            "success": true,
            "data": [
                {"termin": "Termin 10", "total_schools": 4, "scanned": 1, "logs_accepted": 1},
                {"termin": "Termin 2", "total_schools": 6, "scanned": 6, "logs_accepted": 5}
            ]
        }))
    }

    async fn state_for(base_url: &str) -> Arc<CoreState> {
        Arc::new(CoreState::with_services(
            ServiceConfig::default(),
            Arc::new(MockOcrEngine::new("")),
            Arc::new(MockApprovalRegistry::new()),
            Arc::new(MockSaveService::accepting()),
            Arc::new(MockScannerBridge::new(Vec::new())),
            RecordsClient::new(reqwest::Client::new(), base_url),
        ))
    }

    #[tokio::test]
    async fn records_and_file_url() {
        let app = Router::new().route("/records", get(records_handler));
        let base = spawn_server(app).await;
        let state = state_for(&base).await;

        let records = list_records(&state, Some("20100002".into())).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].npsn, "20100002");

        let url = scan_file_url(&state, &records[0]).unwrap();
        assert_eq!(url, format!("{base}/scans/X1.pdf"));
    }

    #[tokio::test]
    async fn dashboard_sorts_and_totals() {
        let app = Router::new().route("/stats", get(stats_handler));
        let base = spawn_server(app).await;
        let state = state_for(&base).await;

        let report = dashboard(&state).await.unwrap();
        let labels: Vec<_> = report.rows.iter().map(|r| r.termin.as_str()).collect();
        assert_eq!(labels, vec!["Termin 2", "Termin 10", "Total"]);
        let total = report.total().unwrap();
        assert_eq!(total.total_schools, 10);
        assert_eq!(total.not_scanned, 3);
    }

    #[tokio::test]
    async fn unreachable_service_reports_error() {
        let state = state_for("http://127.0.0.1:9").await;
        assert!(dashboard(&state).await.is_err());
    }
}
