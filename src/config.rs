use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "BAPP Desk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,bapp_desk_lib=debug"
}

const DEFAULT_SCANNER_URL: &str = "http://localhost:8080";
const DEFAULT_APPROVAL_URL: &str = "http://localhost:3001";
const DEFAULT_SAVE_URL: &str = "http://localhost:3000";
const DEFAULT_OCR_LANGUAGE: &str = "ind";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Endpoints and tuning for the external collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Scanner bridge base URL (profiles + scan).
    pub scanner_url: String,
    /// Approval registry base URL (`/is-approved`).
    pub approval_url: String,
    /// Save service base URL (`/save`, `/records`, `/stats`, `/mock-scan`).
    pub save_url: String,
    /// Fetch scans from the save service's mock endpoint instead of the bridge.
    pub use_mock_scan: bool,
    /// Language hint passed to the OCR engine.
    pub ocr_language: String,
    /// Upper bound for every outbound HTTP call.
    pub request_timeout_secs: u64,
    /// Quality used when a rotation is baked into a JPEG.
    pub jpeg_quality: u8,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            scanner_url: DEFAULT_SCANNER_URL.to_string(),
            approval_url: DEFAULT_APPROVAL_URL.to_string(),
            save_url: DEFAULT_SAVE_URL.to_string(),
            use_mock_scan: false,
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ServiceConfig {
    /// Build from `BAPP_*` environment variables, defaulting anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, settings file, tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let url = |key: &str, fallback: String| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or(fallback)
        };

        Self {
            scanner_url: url("BAPP_SCANNER_URL", defaults.scanner_url),
            approval_url: url("BAPP_APPROVAL_URL", defaults.approval_url),
            save_url: url("BAPP_SAVE_URL", defaults.save_url),
            use_mock_scan: lookup("BAPP_USE_MOCK").is_some_and(|v| v.trim() == "true"),
            ocr_language: lookup("BAPP_OCR_LANG")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.ocr_language),
            request_timeout_secs: parse_or(
                "BAPP_HTTP_TIMEOUT_SECS",
                lookup("BAPP_HTTP_TIMEOUT_SECS"),
                defaults.request_timeout_secs,
            ),
            jpeg_quality: parse_or(
                "BAPP_JPEG_QUALITY",
                lookup("BAPP_JPEG_QUALITY"),
                defaults.jpeg_quality,
            )
            .clamp(1, 100),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(
    key: &str,
    raw: Option<String>,
    fallback: T,
) -> T {
    match raw {
        None => fallback,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, fallback = %fallback, "Invalid config value, using default");
            fallback
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = ServiceConfig::from_lookup(|_| None);
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.ocr_language, "ind");
        assert_eq!(config.jpeg_quality, 90);
    }

    #[test]
    fn urls_are_trimmed_of_trailing_slash() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("BAPP_SCANNER_URL", "http://scanner.local:9000/"),
            ("BAPP_SAVE_URL", " http://save.local// "),
        ]));
        assert_eq!(config.scanner_url, "http://scanner.local:9000");
        assert_eq!(config.save_url, "http://save.local");
        assert_eq!(config.approval_url, DEFAULT_APPROVAL_URL);
    }

    #[test]
    fn mock_flag_requires_literal_true() {
        let on = ServiceConfig::from_lookup(lookup_from(&[("BAPP_USE_MOCK", "true")]));
        let off = ServiceConfig::from_lookup(lookup_from(&[("BAPP_USE_MOCK", "yes")]));
        assert!(on.use_mock_scan);
        assert!(!off.use_mock_scan);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("BAPP_HTTP_TIMEOUT_SECS", "soon"),
            ("BAPP_JPEG_QUALITY", "300"),
        ]));
        assert_eq!(config.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.jpeg_quality, DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn jpeg_quality_is_clamped() {
        let config = ServiceConfig::from_lookup(lookup_from(&[("BAPP_JPEG_QUALITY", "0")]));
        assert_eq!(config.jpeg_quality, 1);
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
