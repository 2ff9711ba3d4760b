//! Per-document pipeline: OCR, identifier extraction, registry resolution,
//! operator overrides, rotation and the gated save.
//!
//! Every action addresses its document by id and writes through the
//! [`BatchStore`]; results for a document removed mid-flight are dropped.
//! Component failures (engine errors, unreachable services) end in a
//! terminal state on the pair and never leave it `processing`/`loading`.

use std::sync::Arc;

use serde::Serialize;

use super::error::PipelineError;
use super::save_gate::{self, BakedImages};
use super::state::{self, PipelineEvent};
use super::store::BatchStore;
use crate::config::ServiceConfig;
use crate::models::{
    DocumentId, DocumentPair, ImageBuffer, LookupKey, MatchState, RegistryRecord, Rotation, Slot,
    SlotRef, OCR_FAILURE_TEXT,
};
use crate::pipeline::approval;
use crate::pipeline::extraction::{extract_identifier, ExtractionError, OcrEngine};
use crate::pipeline::imaging::{self, SwapOutcome};
use crate::services::{ApprovalRegistry, SaveService};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Language hint passed to the OCR engine.
    pub ocr_language: String,
    /// Quality of re-encoded (rotated) images.
    pub jpeg_quality: u8,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ocr_language: "ind".to_string(),
            jpeg_quality: 90,
        }
    }
}

impl From<&ServiceConfig> for PipelineSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            ocr_language: config.ocr_language.clone(),
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// Outcome of an accepted save.
#[derive(Debug, Clone, Serialize)]
pub struct SaveReceipt {
    pub document_id: DocumentId,
    pub doc_name: String,
    pub message: String,
}

/// Outcome of one OCR pass over a document.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutcome {
    pub identifier: Option<String>,
    /// Match state after the follow-up lookup, if one ran.
    pub match_state: Option<MatchState>,
}

pub struct DocumentPipeline {
    store: Arc<BatchStore>,
    ocr: Arc<dyn OcrEngine>,
    registry: Arc<dyn ApprovalRegistry>,
    saver: Arc<dyn SaveService>,
    settings: PipelineSettings,
}

impl DocumentPipeline {
    pub fn new(
        store: Arc<BatchStore>,
        ocr: Arc<dyn OcrEngine>,
        registry: Arc<dyn ApprovalRegistry>,
        saver: Arc<dyn SaveService>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            ocr,
            registry,
            saver,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<BatchStore> {
        &self.store
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Apply one state-machine event to a document and publish it.
    fn transition(&self, id: DocumentId, event: PipelineEvent) -> Result<(), PipelineError> {
        self.store
            .try_update(id, |pair, index| state::apply(pair, index + 1, event))
            .ok_or(PipelineError::DocumentNotFound(id))?
            .map_err(PipelineError::from)
    }

    fn snapshot_of(&self, id: DocumentId) -> Result<DocumentPair, PipelineError> {
        self.store
            .snapshot()
            .get(id)
            .cloned()
            .ok_or(PipelineError::DocumentNotFound(id))
    }

    // ═══════════════════════════════════════════
    // OCR → extraction → resolution
    // ═══════════════════════════════════════════

    /// OCR the identification slot, then resolve the extracted identifier.
    /// Refused while this document's OCR is already running.
    pub async fn run_ocr(&self, id: DocumentId) -> Result<OcrOutcome, PipelineError> {
        self.transition(id, PipelineEvent::OcrStarted)?;
        self.process_claimed(id).await
    }

    /// Re-run OCR and resolution for one document, whatever its state.
    pub async fn retry(&self, id: DocumentId) -> Result<OcrOutcome, PipelineError> {
        tracing::debug!(document_id = %id, "Retrying OCR");
        self.run_ocr(id).await
    }

    /// Body of [`Self::run_ocr`] for a document already marked `processing`
    /// (the batch runner queues all documents up front).
    pub async fn process_claimed(&self, id: DocumentId) -> Result<OcrOutcome, PipelineError> {
        let image = self.snapshot_of(id)?.identification_image().cloned();
        let (text, identifier) = self.recognize(id, image).await;

        match self.transition(
            id,
            PipelineEvent::OcrCompleted {
                text,
                identifier: identifier.clone(),
            },
        ) {
            Ok(()) => {}
            Err(PipelineError::DocumentNotFound(_)) => {
                tracing::warn!(document_id = %id, "Document removed during OCR, result discarded");
                return Err(PipelineError::DocumentNotFound(id));
            }
            Err(e) => return Err(e),
        }

        let Some(found) = identifier else {
            tracing::debug!(document_id = %id, "No identifier found");
            return Ok(OcrOutcome {
                identifier: None,
                match_state: None,
            });
        };

        tracing::debug!(document_id = %id, identifier = %found, "Identifier extracted");
        let match_state = match self.resolve(id, Some(&found), LookupKey::DocumentSerial).await {
            Ok(state) => Some(state),
            Err(e) if e.is_busy() => {
                // An operator search is already running for this document.
                tracing::debug!(document_id = %id, "Lookup already running, not re-issued");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(OcrOutcome {
            identifier: Some(found),
            match_state,
        })
    }

    /// Engine failures and a missing image both read as "no identifier",
    /// with the failure sentinel as recognized text.
    async fn recognize(&self, id: DocumentId, image: Option<ImageBuffer>) -> (String, Option<String>) {
        let Some(image) = image else {
            tracing::warn!(document_id = %id, "No image in identification slot");
            return (OCR_FAILURE_TEXT.to_string(), None);
        };

        match self.ocr.recognize(&image, &self.settings.ocr_language).await {
            Ok(text) => {
                let identifier = extract_identifier(&text);
                (text, identifier)
            }
            Err(e) => {
                tracing::warn!(document_id = %id, engine = self.ocr.name(), error = %e, "OCR engine failed");
                (OCR_FAILURE_TEXT.to_string(), None)
            }
        }
    }

    /// Look the document up in the registry and record the classification.
    ///
    /// `key` overrides the document's current label. A blank identifier
    /// leaves the document as it is and returns its current match state.
    pub async fn resolve(
        &self,
        id: DocumentId,
        key: Option<&str>,
        lookup: LookupKey,
    ) -> Result<MatchState, PipelineError> {
        let pair = self.snapshot_of(id)?;
        let identifier = match key {
            Some(k) => k.trim().to_string(),
            None => pair.identifier().unwrap_or_default().to_string(),
        };
        if identifier.is_empty() {
            return Ok(pair.match_state);
        }

        self.transition(id, PipelineEvent::LookupStarted)?;
        let resolution = approval::resolve(&*self.registry, &identifier, lookup).await;
        let state = resolution.state;

        match self.transition(id, PipelineEvent::LookupCompleted(resolution)) {
            Ok(()) => Ok(state),
            Err(PipelineError::DocumentNotFound(_)) => {
                tracing::warn!(document_id = %id, "Document removed during lookup, result discarded");
                Err(PipelineError::DocumentNotFound(id))
            }
            Err(e) => {
                tracing::debug!(document_id = %id, error = %e, "Lookup result superseded");
                Err(e)
            }
        }
    }

    /// Operator re-search: by school id when `npsn` is given, otherwise by
    /// the current label as document serial. `None` when there is nothing
    /// to search with.
    pub async fn manual_search(
        &self,
        id: DocumentId,
        npsn: Option<&str>,
    ) -> Result<Option<MatchState>, PipelineError> {
        if let Some(npsn) = npsn.map(str::trim).filter(|n| !n.is_empty()) {
            return self.resolve(id, Some(npsn), LookupKey::SchoolId).await.map(Some);
        }

        if self.snapshot_of(id)?.identifier().is_none() {
            return Ok(None);
        }
        self.resolve(id, None, LookupKey::DocumentSerial).await.map(Some)
    }

    // ═══════════════════════════════════════════
    // Operator edits
    // ═══════════════════════════════════════════

    /// Pick a record (from the ambiguous list or a manual search).
    pub fn select_candidate(&self, id: DocumentId, record: RegistryRecord) -> Result<(), PipelineError> {
        self.transition(id, PipelineEvent::CandidateSelected(record))
    }

    /// Change the label; the current match is invalidated.
    pub fn rename_document(&self, id: DocumentId, name: &str) -> Result<(), PipelineError> {
        self.transition(id, PipelineEvent::Renamed(name.trim().to_string()))
    }

    pub fn remove(&self, id: DocumentId) -> bool {
        let removed = self.store.remove(id);
        if removed {
            tracing::debug!(document_id = %id, "Document removed from batch");
        }
        removed
    }

    pub fn swap(&self, source: SlotRef, target: SlotRef) -> SwapOutcome {
        let mut outcome = SwapOutcome::NoOp;
        self.store.modify(|documents| {
            outcome = imaging::swap(documents, source, target);
            outcome == SwapOutcome::Swapped
        });
        outcome
    }

    /// Add a quarter turn to a slot's pending rotation without touching pixels.
    pub fn queue_rotation(&self, id: DocumentId, slot: Slot) -> Result<Rotation, PipelineError> {
        self.store
            .try_update(id, |pair, index| {
                state::apply(pair, index + 1, PipelineEvent::RotationQueued { slot })?;
                Ok::<_, state::TransitionError>(pair.rotation(slot))
            })
            .ok_or(PipelineError::DocumentNotFound(id))?
            .map_err(PipelineError::from)
    }

    /// Turn a slot a further 90° clockwise and bake it into the pixels.
    ///
    /// Any pending rotation is baked along with the turn and reset to 0.
    /// Returns `false` when the slot's image was replaced while rotating,
    /// in which case the rotated output is dropped.
    pub async fn rotate(&self, id: DocumentId, slot: Slot) -> Result<bool, PipelineError> {
        let (original, pending) = self
            .store
            .try_update(id, |pair, index| {
                state::apply(pair, index + 1, PipelineEvent::RotationStarted { slot })?;
                let image = pair.image(slot).cloned().ok_or(state::TransitionError::EmptySlot(slot))?;
                Ok::<_, state::TransitionError>((image, pair.rotation(slot)))
            })
            .ok_or(PipelineError::DocumentNotFound(id))??;

        let result = imaging::rotate_async(original.clone(), pending.turned(), self.settings.jpeg_quality).await;

        let written = self.store.update(id, |pair, index| {
            let _ = state::apply(pair, index + 1, PipelineEvent::RotationFinished);
            match &result {
                Ok(rotated) if pair.image(slot).is_some_and(|current| current.same_buffer(&original)) => {
                    pair.set_image(slot, Some(rotated.clone()));
                    pair.set_rotation(slot, Rotation::Deg0);
                    true
                }
                _ => false,
            }
        });

        let Some(written) = written else {
            tracing::warn!(document_id = %id, "Document removed during rotation, result discarded");
            return Err(PipelineError::DocumentNotFound(id));
        };
        result?;
        if !written {
            tracing::warn!(document_id = %id, slot = %slot, "Slot changed during rotation, result discarded");
        }
        Ok(written)
    }

    // ═══════════════════════════════════════════
    // Save
    // ═══════════════════════════════════════════

    /// Save an approved document.
    ///
    /// Rejected without any state change unless the document is `matched`
    /// to an approved record. Pending rotations are baked first; on failure
    /// `is_saving` is rolled back and the document stays retryable.
    pub async fn save(&self, id: DocumentId) -> Result<SaveReceipt, PipelineError> {
        let (record, doc_name, originals) = self
            .store
            .try_update(id, |pair, index| {
                state::apply(pair, index + 1, PipelineEvent::SaveStarted)?;
                let record = save_gate::check(pair)?.clone();
                let originals = [Slot::A, Slot::B].map(|slot| (slot, pair.image(slot).cloned(), pair.rotation(slot)));
                Ok::<_, state::TransitionError>((record, pair.label_or_placeholder(index + 1), originals))
            })
            .ok_or(PipelineError::DocumentNotFound(id))??;

        let baked = match self.bake(&originals).await {
            Ok(baked) => baked,
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "Rotation bake failed, save aborted");
                let _ = self.transition(id, PipelineEvent::SaveFailed);
                return Err(e.into());
            }
        };
        self.write_back_baked(id, &originals, &baked);

        let payload = save_gate::build_payload(doc_name.clone(), &record, &baked);
        let result = self.saver.save(&payload).await;

        let success = matches!(&result, Ok(r) if r.success);
        let completion = match &result {
            Ok(_) => PipelineEvent::SaveCompleted { success },
            Err(_) => PipelineEvent::SaveFailed,
        };
        if let Err(e) = self.transition(id, completion) {
            tracing::warn!(document_id = %id, error = %e, "Save finished for a document no longer in the batch");
        }

        match result {
            Ok(response) if response.success => {
                tracing::info!(document_id = %id, doc_name = %doc_name, "Document saved");
                Ok(SaveReceipt {
                    document_id: id,
                    doc_name,
                    message: response.message,
                })
            }
            Ok(response) => {
                tracing::warn!(document_id = %id, message = %response.message, "Save service refused document");
                Err(PipelineError::SaveFailed(response.message))
            }
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "Save service call failed");
                Err(e.into())
            }
        }
    }

    async fn bake(
        &self,
        originals: &[(Slot, Option<ImageBuffer>, Rotation); 2],
    ) -> Result<BakedImages, ExtractionError> {
        let mut baked = BakedImages::default();
        for (slot, image, rotation) in originals {
            let Some(image) = image else { continue };
            let output = imaging::rotate_async(image.clone(), *rotation, self.settings.jpeg_quality).await?;
            match slot {
                Slot::A => baked.side_a = Some(output),
                Slot::B => baked.side_b = Some(output),
            }
        }
        Ok(baked)
    }

    /// Store baked buffers so the pair shows what was transmitted, unless a
    /// slot changed (swap, rotate) while baking.
    fn write_back_baked(
        &self,
        id: DocumentId,
        originals: &[(Slot, Option<ImageBuffer>, Rotation); 2],
        baked: &BakedImages,
    ) {
        if originals.iter().all(|(_, _, rotation)| rotation.is_identity()) {
            return;
        }
        self.store.update(id, |pair, _| {
            for (slot, original, rotation) in originals {
                let (Some(original), Some(output)) = (original, baked.get(*slot)) else {
                    continue;
                };
                let unchanged = pair.image(*slot).is_some_and(|current| current.same_buffer(original))
                    && pair.rotation(*slot) == *rotation;
                if unchanged && !rotation.is_identity() {
                    pair.set_image(*slot, Some(output.clone()));
                    pair.set_rotation(*slot, Rotation::Deg0);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

    use super::*;
    use crate::models::OcrState;
    use crate::pipeline::batch::save_gate::SaveRejection;
    use crate::pipeline::batch::state::TransitionError;
    use crate::pipeline::extraction::MockOcrEngine;
    use crate::pipeline::imaging::dimensions;
    use crate::services::{MockApprovalRegistry, MockSaveService};

    fn png(width: u32, height: u32, shade: u8) -> ImageBuffer {
        let img = RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        ImageBuffer::new(cursor.into_inner())
    }

    fn record(serial: &str, result: &str) -> RegistryRecord {
        RegistryRecord {
            match_result: result.to_string(),
            school_id: "20100001".into(),
            document_serial: serial.to_string(),
            school_name: Some("SDN 1".into()),
            issued_code: None,
        }
    }

    struct Harness {
        pipeline: DocumentPipeline,
        ocr: Arc<MockOcrEngine>,
        registry: Arc<MockApprovalRegistry>,
        saver: Arc<MockSaveService>,
    }

    fn harness(ocr: MockOcrEngine, registry: MockApprovalRegistry, saver: MockSaveService) -> Harness {
        let ocr = Arc::new(ocr);
        let registry = Arc::new(registry);
        let saver = Arc::new(saver);
        let pipeline = DocumentPipeline::new(
            Arc::new(BatchStore::new()),
            ocr.clone(),
            registry.clone(),
            saver.clone(),
            PipelineSettings::default(),
        );
        Harness {
            pipeline,
            ocr,
            registry,
            saver,
        }
    }

    fn default_registry() -> MockApprovalRegistry {
        MockApprovalRegistry::new()
            .with_records(LookupKey::DocumentSerial, "X1", vec![record("X1", "sesuai")])
            .with_records(LookupKey::DocumentSerial, "R1", vec![record("R1", "tidak sesuai")])
            .with_records(
                LookupKey::SchoolId,
                "20100001",
                vec![record("X1", "sesuai"), record("X2", "sesuai")],
            )
    }

    /// Install one document with distinct 40x20 (A) and 30x10 (B) images.
    fn install(h: &Harness) -> DocumentId {
        let pair = DocumentPair::new(Some(png(40, 20, 10)), Some(png(30, 10, 200)));
        let id = pair.id;
        h.pipeline.store().replace(vec![pair]);
        id
    }

    fn get(h: &Harness, id: DocumentId) -> DocumentPair {
        h.pipeline.store().snapshot().get(id).cloned().unwrap()
    }

    #[tokio::test]
    async fn identified_document_is_matched() {
        let h = harness(MockOcrEngine::new("BERITA ACARA\nNomor: X1"), default_registry(), MockSaveService::accepting());
        let id = install(&h);

        let outcome = h.pipeline.run_ocr(id).await.unwrap();
        assert_eq!(outcome.identifier.as_deref(), Some("X1"));
        assert_eq!(outcome.match_state, Some(MatchState::Matched));

        let pair = get(&h, id);
        assert_eq!(pair.ocr_state, OcrState::Success);
        assert_eq!(pair.display_name, "X1");
        assert_eq!(pair.selected_record, Some(record("X1", "sesuai")));
        assert_eq!(h.ocr.languages(), vec!["ind".to_string()]);
    }

    #[tokio::test]
    async fn ocr_reads_identification_slot() {
        let slot_b = png(30, 10, 200);
        let ocr = MockOcrEngine::new("no label").with_text_for(slot_b.as_bytes(), "Nomor: X1");
        let h = harness(ocr, default_registry(), MockSaveService::accepting());
        let pair = DocumentPair::new(Some(png(40, 20, 10)), Some(slot_b));
        let id = pair.id;
        h.pipeline.store().replace(vec![pair]);

        let outcome = h.pipeline.run_ocr(id).await.unwrap();
        assert_eq!(outcome.identifier.as_deref(), Some("X1"));
    }

    #[tokio::test]
    async fn missing_identifier_gets_placeholder() {
        let h = harness(MockOcrEngine::new("illegible"), default_registry(), MockSaveService::accepting());
        let other = DocumentPair::new(None, None);
        let id = install(&h);
        h.pipeline.store().modify(|docs| {
            docs.insert(0, other);
            true
        });

        let outcome = h.pipeline.run_ocr(id).await.unwrap();
        assert!(outcome.identifier.is_none());

        let pair = get(&h, id);
        assert_eq!(pair.ocr_state, OcrState::Error);
        assert_eq!(pair.match_state, MatchState::Idle);
        assert_eq!(pair.display_name, "Document #2");
        assert_eq!(pair.recognized_text.as_deref(), Some("illegible"));
        assert!(h.registry.requests().is_empty());
    }

    #[tokio::test]
    async fn engine_failure_uses_sentinel_text() {
        let h = harness(MockOcrEngine::failing("tesseract crashed"), default_registry(), MockSaveService::accepting());
        let id = install(&h);

        h.pipeline.run_ocr(id).await.unwrap();
        let pair = get(&h, id);
        assert_eq!(pair.ocr_state, OcrState::Error);
        assert_eq!(pair.recognized_text.as_deref(), Some(OCR_FAILURE_TEXT));
        assert_eq!(pair.display_name, "Document #1");
    }

    #[tokio::test]
    async fn unreachable_registry_ends_in_error_state() {
        let h = harness(MockOcrEngine::new("Nomor: X1"), MockApprovalRegistry::failing("down"), MockSaveService::accepting());
        let id = install(&h);

        let outcome = h.pipeline.run_ocr(id).await.unwrap();
        assert_eq!(outcome.match_state, Some(MatchState::Error));
        let pair = get(&h, id);
        assert_eq!(pair.match_state, MatchState::Error);
        assert!(pair.candidates.is_empty());
    }

    #[tokio::test]
    async fn retry_while_processing_is_refused() {
        let ocr = MockOcrEngine::new("Nomor: X1").with_delay(Duration::from_millis(100));
        let h = Arc::new(harness(ocr, default_registry(), MockSaveService::accepting()));
        let id = install(&h);

        let first = {
            let h = h.clone();
            tokio::spawn(async move { h.pipeline.run_ocr(id).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = h.pipeline.retry(id).await.unwrap_err();
        assert!(err.is_busy(), "got {err:?}");

        first.await.unwrap().unwrap();
        assert_eq!(h.ocr.calls(), 1);
        assert_eq!(get(&h, id).match_state, MatchState::Matched);

        // Once finished, retry runs again.
        h.pipeline.retry(id).await.unwrap();
        assert_eq!(h.ocr.calls(), 2);
    }

    #[tokio::test]
    async fn removed_document_discards_late_result() {
        let ocr = MockOcrEngine::new("Nomor: X1").with_delay(Duration::from_millis(50));
        let h = Arc::new(harness(ocr, default_registry(), MockSaveService::accepting()));
        let id = install(&h);

        let task = {
            let h = h.clone();
            tokio::spawn(async move { h.pipeline.run_ocr(id).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.pipeline.remove(id));

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, PipelineError::DocumentNotFound(_)));
        assert!(h.pipeline.store().snapshot().is_empty());
        assert!(h.registry.requests().is_empty());
    }

    #[tokio::test]
    async fn ambiguous_then_selection() {
        let h = harness(MockOcrEngine::new(""), default_registry(), MockSaveService::accepting());
        let id = install(&h);

        let state = h.pipeline.manual_search(id, Some(" 20100001 ")).await.unwrap();
        assert_eq!(state, Some(MatchState::Ambiguous));
        let pair = get(&h, id);
        assert_eq!(pair.candidates.len(), 2);
        assert!(pair.selected_record.is_none());
        assert_eq!(h.registry.requests(), vec![(LookupKey::SchoolId, "20100001".to_string())]);

        h.pipeline.select_candidate(id, pair.candidates[1].clone()).unwrap();
        let pair = get(&h, id);
        assert_eq!(pair.match_state, MatchState::Matched);
        assert_eq!(pair.selected_record.unwrap().document_serial, "X2");
    }

    #[tokio::test]
    async fn manual_search_without_key_uses_label() {
        let h = harness(MockOcrEngine::new(""), default_registry(), MockSaveService::accepting());
        let id = install(&h);

        assert_eq!(h.pipeline.manual_search(id, None).await.unwrap(), None);
        assert!(h.registry.requests().is_empty());

        h.pipeline.rename_document(id, " X1 ").unwrap();
        let state = h.pipeline.manual_search(id, Some("  ")).await.unwrap();
        assert_eq!(state, Some(MatchState::Matched));
        assert_eq!(h.registry.requests(), vec![(LookupKey::DocumentSerial, "X1".to_string())]);
    }

    #[tokio::test]
    async fn rename_clears_match() {
        let h = harness(MockOcrEngine::new("Nomor: X1"), default_registry(), MockSaveService::accepting());
        let id = install(&h);
        h.pipeline.run_ocr(id).await.unwrap();

        h.pipeline.rename_document(id, "X9").unwrap();
        let pair = get(&h, id);
        assert_eq!(pair.match_state, MatchState::Idle);
        assert!(pair.candidates.is_empty());
        assert!(pair.selected_record.is_none());
    }

    #[tokio::test]
    async fn save_rejected_without_approval() {
        let h = harness(MockOcrEngine::new("Nomor: R1"), default_registry(), MockSaveService::accepting());
        let id = install(&h);

        let err = h.pipeline.save(id).await.unwrap_err();
        assert_eq!(err.rejection(), Some(&SaveRejection::NotVerified));

        h.pipeline.run_ocr(id).await.unwrap();
        assert_eq!(get(&h, id).match_state, MatchState::Matched);
        let err = h.pipeline.save(id).await.unwrap_err();
        assert!(matches!(err.rejection(), Some(SaveRejection::NotApproved { .. })));

        let pair = get(&h, id);
        assert!(!pair.is_saving && !pair.is_saved);
        assert!(h.saver.payloads().is_empty());
    }

    #[tokio::test]
    async fn save_sends_slot_b_as_front() {
        let h = harness(MockOcrEngine::new("Nomor: X1"), default_registry(), MockSaveService::accepting());
        let id = install(&h);
        h.pipeline.run_ocr(id).await.unwrap();
        let before = get(&h, id);

        let receipt = h.pipeline.save(id).await.unwrap();
        assert_eq!(receipt.doc_name, "X1");

        let payloads = h.saver.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].image_front, before.side_b.as_ref().unwrap().to_data_url());
        assert_eq!(payloads[0].image_back, before.side_a.as_ref().unwrap().to_data_url());
        assert_eq!(payloads[0].nama_sekolah.as_deref(), Some("SDN 1"));

        let pair = get(&h, id);
        assert!(pair.is_saved && !pair.is_saving);
        let err = h.pipeline.save(id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Transition(TransitionError::AlreadySaved)));
    }

    #[tokio::test]
    async fn save_bakes_pending_rotation() {
        let h = harness(MockOcrEngine::new(""), default_registry(), MockSaveService::accepting());
        let id = install(&h);
        h.pipeline.select_candidate(id, record("X1", "sesuai")).unwrap();
        assert_eq!(h.pipeline.queue_rotation(id, Slot::A).unwrap(), Rotation::Deg90);

        h.pipeline.save(id).await.unwrap();

        let payload = &h.saver.payloads()[0];
        let back = ImageBuffer::from_data_url(&payload.image_back).unwrap();
        assert_eq!(dimensions(&back).unwrap(), (20, 40));
        let front = ImageBuffer::from_data_url(&payload.image_front).unwrap();
        assert_eq!(dimensions(&front).unwrap(), (30, 10));

        let pair = get(&h, id);
        assert_eq!(pair.rotation_a, Rotation::Deg0);
        assert_eq!(dimensions(pair.side_a.as_ref().unwrap()).unwrap(), (20, 40));
        assert_eq!(payload.doc_name, "Document #1");
    }

    #[tokio::test]
    async fn save_failure_rolls_back_flags() {
        let h = harness(MockOcrEngine::new("Nomor: X1"), default_registry(), MockSaveService::failing("disk full"));
        let id = install(&h);
        h.pipeline.run_ocr(id).await.unwrap();

        let err = h.pipeline.save(id).await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
        let pair = get(&h, id);
        assert!(!pair.is_saving && !pair.is_saved);
    }

    #[tokio::test]
    async fn refused_save_keeps_document_retryable() {
        let h = harness(
            MockOcrEngine::new("Nomor: X1"),
            default_registry(),
            MockSaveService::responding(false, "Already archived"),
        );
        let id = install(&h);
        h.pipeline.run_ocr(id).await.unwrap();

        let err = h.pipeline.save(id).await.unwrap_err();
        assert!(matches!(err, PipelineError::SaveFailed(ref m) if m == "Already archived"));
        let pair = get(&h, id);
        assert!(!pair.is_saving && !pair.is_saved);
    }

    #[tokio::test]
    async fn rotate_bakes_and_resets_pending() {
        let h = harness(MockOcrEngine::new(""), default_registry(), MockSaveService::accepting());
        let id = install(&h);
        h.pipeline.queue_rotation(id, Slot::A).unwrap();

        assert!(h.pipeline.rotate(id, Slot::A).await.unwrap());
        let pair = get(&h, id);
        assert_eq!(pair.rotation_a, Rotation::Deg0);
        assert!(!pair.is_rotating);
        // pending 90 + interactive 90 = 180: dimensions unchanged
        assert_eq!(dimensions(pair.side_a.as_ref().unwrap()).unwrap(), (40, 20));

        h.pipeline.rotate(id, Slot::B).await.unwrap();
        assert_eq!(dimensions(get(&h, id).side_b.as_ref().unwrap()).unwrap(), (10, 30));
    }

    #[tokio::test]
    async fn four_rotations_restore_dimensions() {
        let h = harness(MockOcrEngine::new(""), default_registry(), MockSaveService::accepting());
        let id = install(&h);
        for _ in 0..4 {
            h.pipeline.rotate(id, Slot::A).await.unwrap();
        }
        assert_eq!(dimensions(get(&h, id).side_a.as_ref().unwrap()).unwrap(), (40, 20));
    }

    #[tokio::test]
    async fn rotate_empty_slot_is_refused() {
        let h = harness(MockOcrEngine::new(""), default_registry(), MockSaveService::accepting());
        let pair = DocumentPair::new(Some(png(4, 4, 0)), None);
        let id = pair.id;
        h.pipeline.store().replace(vec![pair]);

        let err = h.pipeline.rotate(id, Slot::B).await.unwrap_err();
        assert!(matches!(err, PipelineError::Transition(TransitionError::EmptySlot(Slot::B))));
        assert!(!get(&h, id).is_rotating);
    }

    #[tokio::test]
    async fn undecodable_rotation_clears_guard() {
        let h = harness(MockOcrEngine::new(""), default_registry(), MockSaveService::accepting());
        let pair = DocumentPair::new(Some(ImageBuffer::new(vec![1, 2, 3])), None);
        let id = pair.id;
        h.pipeline.store().replace(vec![pair]);

        let err = h.pipeline.rotate(id, Slot::A).await.unwrap_err();
        assert!(matches!(err, PipelineError::Image(_)));
        let pair = get(&h, id);
        assert!(!pair.is_rotating);
        assert_eq!(pair.side_a.as_ref().unwrap().as_bytes(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn swap_through_pipeline_publishes_once() {
        let h = harness(MockOcrEngine::new(""), default_registry(), MockSaveService::accepting());
        let id = install(&h);
        let revision = h.pipeline.store().snapshot().revision;

        let same = SlotRef::new(id, Slot::A);
        assert_eq!(h.pipeline.swap(same, same), SwapOutcome::NoOp);
        assert_eq!(h.pipeline.store().snapshot().revision, revision);

        let outcome = h.pipeline.swap(SlotRef::new(id, Slot::A), SlotRef::new(id, Slot::B));
        assert_eq!(outcome, SwapOutcome::Swapped);
        assert_eq!(h.pipeline.store().snapshot().revision, revision + 1);
        assert_eq!(dimensions(get(&h, id).side_b.as_ref().unwrap()).unwrap(), (40, 20));
    }
}
