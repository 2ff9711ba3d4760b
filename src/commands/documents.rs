//! Operator actions on single documents of the current batch.

use std::sync::Arc;

use crate::core_state::CoreState;
use crate::models::{DocumentId, MatchState, RegistryRecord, Rotation, Slot, SlotRef, StatusKind};
use crate::pipeline::batch::{BatchSnapshot, OcrOutcome, PipelineError, SaveReceipt};
use crate::pipeline::imaging::SwapOutcome;

/// Current batch snapshot for rendering.
pub fn get_batch(state: &Arc<CoreState>) -> Arc<BatchSnapshot> {
    state.store().snapshot()
}

/// Re-run OCR and resolution for one document.
pub async fn retry_ocr(state: &Arc<CoreState>, id: DocumentId) -> Result<OcrOutcome, String> {
    let position = state.store().snapshot().index_of(id).map(|i| i + 1);
    if let Some(position) = position {
        state.set_status(
            StatusKind::Processing,
            format!("Retrying OCR for document #{position}..."),
        );
    }

    let outcome = state.pipeline().retry(id).await.map_err(|e| e.to_string())?;
    match &outcome.identifier {
        Some(identifier) => state.set_status(
            StatusKind::Success,
            format!("OCR retry succeeded: detected {identifier}"),
        ),
        None => state.set_status(
            StatusKind::Error,
            "OCR retry finished, but no document number was found",
        ),
    }
    Ok(outcome)
}

/// Search the registry again, by school id when `npsn` is given.
pub async fn manual_search(
    state: &Arc<CoreState>,
    id: DocumentId,
    npsn: Option<String>,
) -> Result<Option<MatchState>, String> {
    state
        .pipeline()
        .manual_search(id, npsn.as_deref())
        .await
        .map_err(|e| e.to_string())
}

pub fn select_candidate(state: &Arc<CoreState>, id: DocumentId, record: RegistryRecord) -> Result<(), String> {
    state.pipeline().select_candidate(id, record).map_err(|e| e.to_string())
}

pub fn rename_document(state: &Arc<CoreState>, id: DocumentId, name: String) -> Result<(), String> {
    state.pipeline().rename_document(id, &name).map_err(|e| e.to_string())
}

/// Rotate a slot 90° clockwise now. `false` when the result was dropped
/// because the slot changed meanwhile.
pub async fn rotate_slot(state: &Arc<CoreState>, id: DocumentId, slot: Slot) -> Result<bool, String> {
    state.pipeline().rotate(id, slot).await.map_err(|e| e.to_string())
}

/// Add 90° to a slot's pending rotation, applied at save time.
pub fn queue_rotation(state: &Arc<CoreState>, id: DocumentId, slot: Slot) -> Result<Rotation, String> {
    state.pipeline().queue_rotation(id, slot).map_err(|e| e.to_string())
}

pub fn swap_slots(state: &Arc<CoreState>, source: SlotRef, target: SlotRef) -> Result<SwapOutcome, String> {
    match state.pipeline().swap(source, target) {
        SwapOutcome::MissingDocument => Err("Document not found in the current batch".to_string()),
        outcome => Ok(outcome),
    }
}

/// Save an approved document. Policy refusals and service failures come
/// back as the operator message.
pub async fn save_document(state: &Arc<CoreState>, id: DocumentId) -> Result<SaveReceipt, String> {
    state.pipeline().save(id).await.map_err(|e| {
        if e.rejection().is_some() {
            tracing::debug!(document_id = %id, reason = %e, "Save refused by approval gate");
        }
        e.to_string()
    })
}

pub fn remove_document(state: &Arc<CoreState>, id: DocumentId) -> Result<(), String> {
    if state.pipeline().remove(id) {
        Ok(())
    } else {
        Err(PipelineError::DocumentNotFound(id).to_string())
    }
}

/// Drop the whole batch and reset the status line.
pub fn clear_batch(state: &Arc<CoreState>) {
    state.store().clear();
    state.reset_status();
    tracing::info!("Batch cleared");
}
