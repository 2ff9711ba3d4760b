use serde::Serialize;

use crate::models::{DocumentId, MatchState, OcrState};

// ═══════════════════════════════════════════
// Progress Events
// ═══════════════════════════════════════════

/// Progress events reported by the batch runner to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum BatchProgress {
    Started {
        document_count: usize,
    },
    DocumentStarted {
        index: usize,
        total: usize,
        document_id: DocumentId,
    },
    DocumentFinished {
        index: usize,
        total: usize,
        document_id: DocumentId,
        ocr_state: OcrState,
        match_state: MatchState,
    },
    Completed {
        processed: usize,
        identified: usize,
        duration_ms: u64,
    },
}

// ═══════════════════════════════════════════
// Batch Result
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    /// Documents whose OCR ran to completion.
    pub processed: usize,
    /// Documents where an identifier was extracted.
    pub identified: usize,
    /// Documents left `matched` by automatic resolution.
    pub matched: usize,
    /// Documents removed from the batch before their turn.
    pub skipped: usize,
    pub duration_ms: u64,
}

impl BatchSummary {
    pub fn empty() -> Self {
        Self::default()
    }
}
