//! The four built-in capabilities, wired to the current platform

use crate::capability::CapabilitySpec;
use crate::kind::CapabilityKind;
use crate::platform::current as os;

const SETTINGS_PRIVACY: &str = "x-apple.systempreferences:com.apple.preference.security";

fn privacy_pane(anchor: &str) -> String {
    format!("{}?{}", SETTINGS_PRIVACY, anchor)
}

pub fn accessibility() -> CapabilitySpec {
    CapabilitySpec::new(
        CapabilityKind::Accessibility,
        os::accessibility_check,
        os::accessibility_request,
    )
    .details([
        "Get real-time information about the menu bar.",
        "Arrange menu bar items.",
    ])
    .required(true)
    .settings_url(privacy_pane("Privacy_Accessibility"))
}

pub fn input_monitoring() -> CapabilitySpec {
    CapabilitySpec::new(
        CapabilityKind::InputMonitoring,
        os::input_monitoring_check,
        os::input_monitoring_request,
    )
    .details([
        "Detect command-dragging menu bar items.",
        "Enable global menu bar interaction handling.",
    ])
    .required(true)
    .settings_url(privacy_pane("Privacy_ListenEvent"))
}

/// Granted from the Accessibility list, hence the shared deep link.
pub fn post_events() -> CapabilitySpec {
    CapabilitySpec::new(
        CapabilityKind::PostEvents,
        os::post_events_check,
        os::post_events_request,
    )
    .details([
        "Move menu bar items.",
        "Trigger menu bar actions programmatically.",
    ])
    .required(true)
    .settings_url(privacy_pane("Privacy_Accessibility"))
}

pub fn screen_recording() -> CapabilitySpec {
    CapabilitySpec::new(
        CapabilityKind::ScreenRecording,
        os::screen_recording_check,
        os::screen_recording_request,
    )
    .details([
        "Change the menu bar's appearance.",
        "Display images of individual menu bar items.",
    ])
    .required(false)
    .settings_url(privacy_pane("Privacy_ScreenCapture"))
}

/// All four, in coordinator order.
pub fn all() -> [CapabilitySpec; 4] {
    [accessibility(), post_events(), input_monitoring(), screen_recording()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_matches_kind_all() {
        let kinds: Vec<CapabilityKind> = all().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, CapabilityKind::ALL.to_vec());
    }

    #[test]
    fn only_screen_recording_is_optional() {
        for spec in all() {
            assert_eq!(spec.required, spec.kind != CapabilityKind::ScreenRecording);
        }
    }

    #[test]
    fn metadata_is_complete() {
        for spec in all() {
            assert_eq!(spec.title, spec.kind.title());
            assert_eq!(spec.details.len(), 2);
            assert!(spec.settings_url.unwrap().starts_with(SETTINGS_PRIVACY));
        }
    }

    #[test]
    fn post_events_shares_accessibility_pane() {
        assert_eq!(post_events().settings_url, accessibility().settings_url);
        assert!(input_monitoring().settings_url.unwrap().ends_with("Privacy_ListenEvent"));
        assert!(screen_recording().settings_url.unwrap().ends_with("Privacy_ScreenCapture"));
    }
}
