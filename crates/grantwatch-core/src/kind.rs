//! Capability identities and the aggregate readiness value

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of OS-gated permissions the app depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Accessibility,
    InputMonitoring,
    PostEvents,
    ScreenRecording,
}

impl CapabilityKind {
    /// Coordinator order.
    pub const ALL: [CapabilityKind; 4] = [
        CapabilityKind::Accessibility,
        CapabilityKind::PostEvents,
        CapabilityKind::InputMonitoring,
        CapabilityKind::ScreenRecording,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Accessibility => "Accessibility",
            Self::InputMonitoring => "Input Monitoring",
            Self::PostEvents => "Post Events",
            Self::ScreenRecording => "Screen Recording",
        }
    }

    /// Name of the System Settings pane that lists this permission.
    /// Posting events is granted from the Accessibility list.
    pub fn pane_name(&self) -> &'static str {
        match self {
            Self::Accessibility | Self::PostEvents => "Accessibility",
            Self::InputMonitoring => "Input Monitoring",
            Self::ScreenRecording => "Screen Recording",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accessibility => "accessibility",
            Self::InputMonitoring => "input_monitoring",
            Self::PostEvents => "post_events",
            Self::ScreenRecording => "screen_recording",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "accessibility" | "ax" => Ok(Self::Accessibility),
            "input_monitoring" | "listen" | "listen_event" => Ok(Self::InputMonitoring),
            "post_events" | "post" | "post_event" => Ok(Self::PostEvents),
            "screen_recording" | "screen" | "screen_capture" => Ok(Self::ScreenRecording),
            _ => Err(format!(
                "unknown permission '{}' (expected accessibility, input_monitoring, post_events or screen_recording)",
                s
            )),
        }
    }
}

/// Readiness of the whole set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateState {
    /// At least one required capability is not granted.
    Missing,
    /// Every required capability is granted, some optional one is not.
    HasRequired,
    /// Everything is granted.
    HasAll,
}

impl AggregateState {
    /// Folds `(is_required, granted)` pairs into a readiness value.
    pub fn fold<I>(flags: I) -> Self
    where
        I: IntoIterator<Item = (bool, bool)>,
    {
        let mut all = true;
        let mut required = true;
        for (is_required, granted) in flags {
            if !granted {
                all = false;
                if is_required {
                    required = false;
                }
            }
        }
        if all {
            Self::HasAll
        } else if required {
            Self::HasRequired
        } else {
            Self::Missing
        }
    }

    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

impl fmt::Display for AggregateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Missing => "missing",
            Self::HasRequired => "has_required",
            Self::HasAll => "has_all",
        };
        f.write_str(s)
    }
}
