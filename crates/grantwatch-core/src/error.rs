//! Structured errors for the outer surfaces (CLI, facade helpers)
//!
//! The capability core itself never fails: predicates absorb OS errors and
//! report "not granted". These errors only describe what a caller asked for
//! and did not get.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::kind::CapabilityKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    PermissionDenied,
    Timeout,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// One or more required capabilities are not granted.
    pub fn missing(kinds: &[CapabilityKind]) -> Self {
        let names: Vec<&str> = kinds.iter().map(|k| k.title()).collect();
        Self::new(
            ErrorCode::PermissionDenied,
            format!("Missing required permissions: {}", names.join(", ")),
        )
        .with_suggestions(
            kinds
                .iter()
                .map(|k| format!("Enable in System Settings > Privacy & Security > {}", k.pane_name()))
                .collect(),
        )
        .with_context(serde_json::json!({ "missing": kinds }))
    }

    pub fn timeout(kind: CapabilityKind, timeout: Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!(
                "Timeout after {}ms waiting for {} permission",
                timeout.as_millis(),
                kind.title()
            ),
        )
        .with_context(serde_json::json!({ "kind": kind, "timeout_ms": timeout.as_millis() as u64 }))
    }

    pub fn abandoned(kind: CapabilityKind) -> Self {
        Self::new(
            ErrorCode::Unknown,
            format!("Monitoring of {} stopped before it was granted", kind.title()),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::new(ErrorCode::Unknown, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lists_every_kind() {
        let e = Error::missing(&[CapabilityKind::Accessibility, CapabilityKind::PostEvents]);
        assert_eq!(e.code, ErrorCode::PermissionDenied);
        assert!(e.message.contains("Accessibility"));
        assert!(e.message.contains("Post Events"));
        assert_eq!(e.suggestions.len(), 2);
    }

    #[test]
    fn code_serializes_screaming() {
        let e = Error::timeout(CapabilityKind::ScreenRecording, Duration::from_millis(1500));
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["code"], "TIMEOUT");
        assert_eq!(json["context"]["timeout_ms"], 1500);
        assert_eq!(json["context"]["kind"], "screen_recording");
    }

    #[test]
    fn anyhow_maps_to_unknown() {
        let e = Error::from(anyhow::anyhow!("no accessibility capability configured"));
        assert_eq!(e.code, ErrorCode::Unknown);
        assert_eq!(e.to_string(), "[Unknown] no accessibility capability configured");
        let json = serde_json::to_value(&e).unwrap();
        assert!(json.get("suggestions").is_none());
        assert!(json.get("context").is_none());
    }
}
