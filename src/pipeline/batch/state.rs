//! Per-document state machine.
//!
//! Every change to a pair's OCR, match, save or rotation flags goes through
//! [`apply`], one event at a time. Invariants kept here:
//! - `match_state == matched` exactly when `selected_record` is set;
//! - more than one candidate only while `ambiguous`;
//! - a started OCR, lookup, save or rotation is always ended by its
//!   completion event, success or failure.

use thiserror::Error;

use super::save_gate::{self, SaveRejection};
use crate::models::{placeholder_name, DocumentPair, MatchState, OcrState, RegistryRecord, Slot};
use crate::pipeline::approval::Resolution;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Batch start: mark as processing without a re-entrancy check.
    OcrQueued,
    /// Single-document OCR; refused while one is already running.
    OcrStarted,
    OcrCompleted {
        text: String,
        identifier: Option<String>,
    },
    LookupStarted,
    LookupCompleted(Resolution),
    CandidateSelected(RegistryRecord),
    Renamed(String),
    SaveStarted,
    SaveCompleted {
        success: bool,
    },
    SaveFailed,
    RotationStarted {
        slot: Slot,
    },
    RotationFinished,
    RotationQueued {
        slot: Slot,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("OCR is already running for this document")]
    OcrInProgress,

    #[error("A registry lookup is already running for this document")]
    LookupInProgress,

    #[error("Lookup result no longer applies to this document")]
    StaleLookup,

    #[error("This document is already being saved")]
    SaveInProgress,

    #[error("This document has already been saved")]
    AlreadySaved,

    #[error("This document is already being rotated")]
    RotationInProgress,

    #[error("No image in slot {0}")]
    EmptySlot(Slot),

    #[error(transparent)]
    Rejected(#[from] SaveRejection),
}

impl TransitionError {
    /// Refused because another action on the same document is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::OcrInProgress | Self::LookupInProgress | Self::SaveInProgress | Self::RotationInProgress
        )
    }
}

/// Apply one event to `pair`. `position` is the pair's 1-based place in the
/// batch at the time of the write, used for placeholder labels.
///
/// On `Err` the pair is left untouched.
pub fn apply(pair: &mut DocumentPair, position: usize, event: PipelineEvent) -> Result<(), TransitionError> {
    match event {
        PipelineEvent::OcrQueued => {
            pair.ocr_state = OcrState::Processing;
        }
        PipelineEvent::OcrStarted => {
            if pair.ocr_state == OcrState::Processing {
                return Err(TransitionError::OcrInProgress);
            }
            pair.ocr_state = OcrState::Processing;
        }
        PipelineEvent::OcrCompleted { text, identifier } => {
            pair.recognized_text = Some(text);
            match identifier {
                Some(identifier) => {
                    pair.display_name = identifier;
                    pair.ocr_state = OcrState::Success;
                }
                None => {
                    pair.display_name = placeholder_name(position);
                    pair.ocr_state = OcrState::Error;
                    clear_match(pair);
                }
            }
        }
        PipelineEvent::LookupStarted => {
            if pair.match_state == MatchState::Loading {
                return Err(TransitionError::LookupInProgress);
            }
            clear_match(pair);
            pair.match_state = MatchState::Loading;
        }
        PipelineEvent::LookupCompleted(resolution) => {
            // A rename or selection while loading supersedes this result.
            if pair.match_state != MatchState::Loading {
                return Err(TransitionError::StaleLookup);
            }
            pair.match_state = resolution.state;
            pair.candidates = resolution.candidates;
            pair.selected_record = resolution.selected;
            if pair.match_state == MatchState::Matched && pair.selected_record.is_none() {
                pair.match_state = MatchState::NotMatched;
            }
        }
        PipelineEvent::CandidateSelected(record) => {
            pair.candidates = vec![record.clone()];
            pair.selected_record = Some(record);
            pair.match_state = MatchState::Matched;
        }
        PipelineEvent::Renamed(name) => {
            pair.display_name = name;
            clear_match(pair);
        }
        PipelineEvent::SaveStarted => {
            if pair.is_saving {
                return Err(TransitionError::SaveInProgress);
            }
            if pair.is_saved {
                return Err(TransitionError::AlreadySaved);
            }
            save_gate::check(pair)?;
            pair.is_saving = true;
        }
        PipelineEvent::SaveCompleted { success } => {
            pair.is_saving = false;
            if success {
                pair.is_saved = true;
            }
        }
        PipelineEvent::SaveFailed => {
            pair.is_saving = false;
        }
        PipelineEvent::RotationStarted { slot } => {
            if pair.is_rotating {
                return Err(TransitionError::RotationInProgress);
            }
            if pair.image(slot).is_none() {
                return Err(TransitionError::EmptySlot(slot));
            }
            pair.is_rotating = true;
        }
        PipelineEvent::RotationFinished => {
            pair.is_rotating = false;
        }
        PipelineEvent::RotationQueued { slot } => {
            if pair.is_rotating {
                return Err(TransitionError::RotationInProgress);
            }
            if pair.image(slot).is_none() {
                return Err(TransitionError::EmptySlot(slot));
            }
            pair.set_rotation(slot, pair.rotation(slot).turned());
        }
    }
    Ok(())
}

fn clear_match(pair: &mut DocumentPair) {
    pair.match_state = MatchState::Idle;
    pair.candidates.clear();
    pair.selected_record = None;
}
