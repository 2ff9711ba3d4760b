use std::sync::Arc;
use std::time::Instant;

use super::controller::DocumentPipeline;
use super::error::PipelineError;
use super::state::{self, PipelineEvent};
use super::types::{BatchProgress, BatchSummary};
use crate::models::{DocumentPair, MatchState, OcrState};

/// Host callback for batch progress.
pub type ProgressFn<'a> = &'a (dyn Fn(BatchProgress) + Send + Sync);

/// Installs a freshly scanned batch and walks it through OCR and
/// resolution, one document at a time.
pub struct BatchRunner {
    pipeline: Arc<DocumentPipeline>,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<DocumentPipeline>) -> Self {
        Self { pipeline }
    }

    /// Replace the current batch with `pairs` and process every document.
    ///
    /// All documents are shown as `processing` from the moment they are
    /// installed. Documents are visited in scan order; one removed by the
    /// operator before its turn is skipped. Per-document failures end in
    /// that document's terminal state and never abort the batch.
    pub async fn run(&self, pairs: Vec<DocumentPair>, progress: Option<ProgressFn<'_>>) -> BatchSummary {
        let start = Instant::now();

        let queued: Vec<DocumentPair> = pairs
            .into_iter()
            .enumerate()
            .map(|(index, mut pair)| {
                // OcrQueued has no precondition.
                let _ = state::apply(&mut pair, index + 1, PipelineEvent::OcrQueued);
                pair
            })
            .collect();
        let ids: Vec<_> = queued.iter().map(|p| p.id).collect();
        self.pipeline.store().replace(queued);

        if ids.is_empty() {
            return BatchSummary::empty();
        }

        let total = ids.len();
        tracing::info!(document_count = total, "Batch OCR started");
        if let Some(progress) = progress {
            progress(BatchProgress::Started { document_count: total });
        }

        let mut summary = BatchSummary {
            total,
            ..BatchSummary::empty()
        };

        for (index, id) in ids.into_iter().enumerate() {
            if self.pipeline.store().snapshot().get(id).is_none() {
                summary.skipped += 1;
                continue;
            }

            if let Some(progress) = progress {
                progress(BatchProgress::DocumentStarted {
                    index,
                    total,
                    document_id: id,
                });
            }

            match self.pipeline.process_claimed(id).await {
                Ok(outcome) => {
                    summary.processed += 1;
                    if outcome.identifier.is_some() {
                        summary.identified += 1;
                    }
                    if outcome.match_state == Some(MatchState::Matched) {
                        summary.matched += 1;
                    }
                }
                Err(PipelineError::DocumentNotFound(_)) => {
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    summary.processed += 1;
                    tracing::warn!(document_id = %id, error = %e, "Document processing ended early");
                }
            }

            if let Some(progress) = progress {
                let (ocr_state, match_state) = self
                    .pipeline
                    .store()
                    .snapshot()
                    .get(id)
                    .map(|p| (p.ocr_state, p.match_state))
                    .unwrap_or((OcrState::Error, MatchState::Idle));
                progress(BatchProgress::DocumentFinished {
                    index,
                    total,
                    document_id: id,
                    ocr_state,
                    match_state,
                });
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            processed = summary.processed,
            identified = summary.identified,
            matched = summary.matched,
            skipped = summary.skipped,
            duration_ms = summary.duration_ms,
            "Batch OCR finished"
        );

        if let Some(progress) = progress {
            progress(BatchProgress::Completed {
                processed: summary.processed,
                identified: summary.identified,
                duration_ms: summary.duration_ms,
            });
        }

        summary
    }
}
