//! Error type for document pipeline actions.

use thiserror::Error;

use super::save_gate::SaveRejection;
use super::state::TransitionError;
use crate::models::DocumentId;
use crate::pipeline::extraction::ExtractionError;
use crate::services::ServiceError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Image processing failed: {0}")]
    Image(#[from] ExtractionError),

    #[error("{}", .0.operator_message())]
    Service(#[from] ServiceError),

    /// Save service answered `success: false`.
    #[error("Save failed: {0}")]
    SaveFailed(String),
}

impl PipelineError {
    /// The policy refusal behind this error, if any.
    pub fn rejection(&self) -> Option<&SaveRejection> {
        match self {
            Self::Transition(TransitionError::Rejected(r)) => Some(r),
            _ => None,
        }
    }

    /// Refused because another action on the same document is running.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Transition(t) if t.is_busy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_exposed() {
        let err: PipelineError = TransitionError::Rejected(SaveRejection::NotVerified).into();
        assert_eq!(err.rejection(), Some(&SaveRejection::NotVerified));
        assert!(!err.is_busy());
        assert_eq!(err.to_string(), SaveRejection::NotVerified.to_string());
    }

    #[test]
    fn busy_is_detected() {
        let err: PipelineError = TransitionError::OcrInProgress.into();
        assert!(err.is_busy());
        assert!(err.rejection().is_none());
    }

    #[test]
    fn service_errors_use_operator_message() {
        let err: PipelineError = ServiceError::Server {
            status: 503,
            body: "maintenance\nretry later".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Server returned 503: maintenance");
    }
}
