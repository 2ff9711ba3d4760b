use crate::models::{LookupKey, MatchState, RegistryRecord};
use crate::services::{ApprovalRegistry, ServiceError};

/// Classified outcome of one registry lookup, ready to be written onto a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub state: MatchState,
    pub candidates: Vec<RegistryRecord>,
    pub selected: Option<RegistryRecord>,
    /// Operator-facing reason when `state` is `error`.
    pub error: Option<String>,
}

impl Resolution {
    /// No lookup was made (nothing to look up).
    pub fn idle() -> Self {
        Self {
            state: MatchState::Idle,
            candidates: Vec::new(),
            selected: None,
            error: None,
        }
    }
}

/// Map a registry answer onto match states.
///
/// Failure is `error`; zero records `not-matched`; one record is `matched`
/// and pre-selected; more than one is `ambiguous` with nothing selected.
pub fn classify(result: Result<Vec<RegistryRecord>, ServiceError>) -> Resolution {
    match result {
        Err(e) => Resolution {
            state: MatchState::Error,
            candidates: Vec::new(),
            selected: None,
            error: Some(e.operator_message()),
        },
        Ok(records) => match records.len() {
            0 => Resolution {
                state: MatchState::NotMatched,
                ..Resolution::idle()
            },
            1 => Resolution {
                state: MatchState::Matched,
                selected: records.first().cloned(),
                candidates: records,
                error: None,
            },
            _ => Resolution {
                state: MatchState::Ambiguous,
                candidates: records,
                selected: None,
                error: None,
            },
        },
    }
}

/// Issue one lookup and classify it. A blank identifier issues no request.
pub async fn resolve(registry: &dyn ApprovalRegistry, identifier: &str, key: LookupKey) -> Resolution {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Resolution::idle();
    }

    let result = registry.lookup(identifier, key).await;
    if let Err(ref e) = result {
        tracing::warn!(identifier, key = %key, error = %e, "Registry lookup failed");
    }

    let resolution = classify(result);
    tracing::debug!(
        identifier,
        key = %key,
        state = %resolution.state,
        count = resolution.candidates.len(),
        "Registry lookup classified"
    );
    resolution
}
