//! Shared application state behind the host-facing commands.
//!
//! `CoreState` owns the batch store, the document pipeline and the external
//! service clients. The host wraps it in `Arc` at startup and hands it to
//! every command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::models::StatusKind;
use crate::pipeline::batch::{BatchRunner, BatchStore, DocumentPipeline, PipelineSettings};
use crate::pipeline::extraction::{OcrEngine, TesseractCli};
use crate::services::{
    http_client, ApprovalRegistry, HttpApprovalRegistry, HttpSaveService, HttpScannerBridge, RecordsClient,
    SaveService, ScannerBridge, ServiceError,
};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClient(#[from] ServiceError),
}

// ═══════════════════════════════════════════════════════════
// Session status line
// ═══════════════════════════════════════════════════════════

/// Operator-facing status of the current scan session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub kind: StatusKind,
    pub message: String,
}

impl SessionStatus {
    pub fn idle() -> Self {
        Self {
            kind: StatusKind::Idle,
            message: String::new(),
        }
    }

    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::idle()
    }
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: ServiceConfig,
    pipeline: Arc<DocumentPipeline>,
    runner: BatchRunner,
    scanner: Arc<dyn ScannerBridge>,
    records: RecordsClient,
    status: RwLock<SessionStatus>,
    /// Set while a scan and its batch OCR run.
    scan_running: AtomicBool,
}

/// Held for the duration of one scan session; releases the flag on drop.
pub struct ScanGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl CoreState {
    /// Wire the HTTP-backed services and the Tesseract engine from `config`.
    pub fn from_config(config: ServiceConfig) -> Result<Self, CoreError> {
        let client = http_client(config.request_timeout())?;

        let ocr: Arc<dyn OcrEngine> = Arc::new(TesseractCli::new());
        let registry: Arc<dyn ApprovalRegistry> =
            Arc::new(HttpApprovalRegistry::new(client.clone(), &config.approval_url));
        let saver: Arc<dyn SaveService> = Arc::new(HttpSaveService::new(client.clone(), &config.save_url));
        let scanner: Arc<dyn ScannerBridge> = Arc::new(HttpScannerBridge::new(
            client.clone(),
            &config.scanner_url,
            &config.save_url,
            config.use_mock_scan,
        ));
        let records = RecordsClient::new(client, &config.save_url);

        tracing::info!(
            scanner_url = %config.scanner_url,
            approval_url = %config.approval_url,
            save_url = %config.save_url,
            mock_scan = config.use_mock_scan,
            "Services configured"
        );

        Ok(Self::with_services(config, ocr, registry, saver, scanner, records))
    }

    /// Assemble from explicit service implementations (mocks in tests).
    pub fn with_services(
        config: ServiceConfig,
        ocr: Arc<dyn OcrEngine>,
        registry: Arc<dyn ApprovalRegistry>,
        saver: Arc<dyn SaveService>,
        scanner: Arc<dyn ScannerBridge>,
        records: RecordsClient,
    ) -> Self {
        let pipeline = Arc::new(DocumentPipeline::new(
            Arc::new(BatchStore::new()),
            ocr,
            registry,
            saver,
            PipelineSettings::from(&config),
        ));
        Self {
            runner: BatchRunner::new(pipeline.clone()),
            pipeline,
            scanner,
            records,
            status: RwLock::new(SessionStatus::idle()),
            scan_running: AtomicBool::new(false),
            config,
        }
    }

    pub fn pipeline(&self) -> &DocumentPipeline {
        &self.pipeline
    }

    pub fn store(&self) -> &BatchStore {
        self.pipeline.store()
    }

    pub fn runner(&self) -> &BatchRunner {
        &self.runner
    }

    pub fn scanner(&self) -> &dyn ScannerBridge {
        &*self.scanner
    }

    pub fn records(&self) -> &RecordsClient {
        &self.records
    }

    // ── Scan session ────────────────────────────────────────

    /// Claim the scan session. `None` while another scan is still running.
    pub fn begin_scan(&self) -> Option<ScanGuard<'_>> {
        self.scan_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ScanGuard {
                flag: &self.scan_running,
            })
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_running.load(Ordering::SeqCst)
    }

    // ── Session status ──────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_status(&self, kind: StatusKind, message: impl Into<String>) {
        let status = SessionStatus::new(kind, message);
        tracing::debug!(kind = %status.kind, message = %status.message, "Session status");
        *self
            .status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }

    pub fn reset_status(&self) {
        *self
            .status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = SessionStatus::idle();
    }
}
