use serde::{Deserialize, Serialize};

/// Unrecognized wire value for one of the string-backed enums below.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(OcrState {
    Idle => "idle",
    Processing => "processing",
    Success => "success",
    Error => "error",
});

str_enum!(MatchState {
    Idle => "idle",
    Loading => "loading",
    Matched => "matched",
    NotMatched => "not-matched",
    Ambiguous => "ambiguous",
    Error => "error",
});

str_enum!(Slot {
    A => "a",
    B => "b",
});

str_enum!(LookupKey {
    DocumentSerial => "no_bapp",
    SchoolId => "npsn",
});

str_enum!(StatusKind {
    Idle => "idle",
    Processing => "processing",
    Success => "success",
    Error => "error",
});

impl Default for OcrState {
    fn default() -> Self {
        Self::Idle
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::Idle
    }
}

impl OcrState {
    /// `success` and `error` end an OCR attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl MatchState {
    /// Whether a lookup is in flight.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl LookupKey {
    /// Query parameter understood by the registry's `/is-approved` endpoint.
    pub fn query_param(&self) -> &'static str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_state_wire_names() {
        assert_eq!(MatchState::NotMatched.as_str(), "not-matched");
        assert_eq!(
            serde_json::to_string(&MatchState::NotMatched).unwrap(),
            "\"not-matched\""
        );
        assert_eq!("ambiguous".parse::<MatchState>().unwrap(), MatchState::Ambiguous);
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = "pending".parse::<OcrState>().unwrap_err();
        assert_eq!(err.field, "OcrState");
        assert_eq!(err.value, "pending");
    }

    #[test]
    fn lookup_key_params() {
        assert_eq!(LookupKey::DocumentSerial.query_param(), "no_bapp");
        assert_eq!(LookupKey::SchoolId.query_param(), "npsn");
    }

    #[test]
    fn terminal_and_transient_states() {
        assert!(OcrState::Success.is_terminal());
        assert!(OcrState::Error.is_terminal());
        assert!(!OcrState::Processing.is_terminal());
        assert!(MatchState::Loading.is_transient());
        assert!(!MatchState::Ambiguous.is_transient());
    }
}
