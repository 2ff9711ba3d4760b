//! Scan session commands: scanner profiles, scan + batch OCR, status line.

use std::sync::Arc;

use crate::core_state::{CoreState, SessionStatus};
use crate::models::{DocumentPair, StatusKind};
use crate::pipeline::batch::{BatchSummary, ProgressFn};
use crate::services::ServiceError;

const SCAN_IN_PROGRESS: &str = "A scan is already in progress";

/// Profiles offered by the scanner bridge.
pub async fn list_profiles(state: &Arc<CoreState>) -> Result<Vec<String>, String> {
    state.scanner().list_profiles().await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to list scanner profiles");
        e.operator_message()
    })
}

/// Scan with `profile`, install the batch and run OCR over it.
///
/// The previous batch is dropped before the scanner is contacted. A scanner
/// failure leaves the batch empty and the status line in `error`. Refused
/// while an earlier scan is still running its batch.
pub async fn start_scan(
    state: &Arc<CoreState>,
    profile: &str,
    progress: Option<ProgressFn<'_>>,
) -> Result<BatchSummary, String> {
    let Some(_session) = state.begin_scan() else {
        tracing::warn!(profile, "Scan refused, previous scan still running");
        return Err(SCAN_IN_PROGRESS.to_string());
    };

    state.store().clear();
    state.set_status(StatusKind::Processing, "Connecting to scanner...");
    tracing::info!(profile, "Scan requested");

    let raw = match state.scanner().scan(profile).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(profile, error = %e, "Scan failed");
            let message = scan_failure_message(&e);
            state.set_status(StatusKind::Error, message.clone());
            return Err(message);
        }
    };

    let pairs: Vec<DocumentPair> = raw
        .into_iter()
        .map(|pair| DocumentPair::new(pair.front, pair.back))
        .collect();
    let count = pairs.len();
    state.set_status(
        StatusKind::Processing,
        format!("Scan complete: {count} documents found. Running OCR..."),
    );

    let summary = state.runner().run(pairs, progress).await;

    state.set_status(
        StatusKind::Success,
        format!("OCR finished: {} documents processed", summary.processed),
    );
    Ok(summary)
}

pub fn session_status(state: &Arc<CoreState>) -> SessionStatus {
    state.status()
}

fn scan_failure_message(error: &ServiceError) -> String {
    match error {
        ServiceError::Http(_) => "Scanner bridge unreachable: make sure the bridge application is running".to_string(),
        other => format!("Scan failed: {}", other.operator_message()),
    }
}
