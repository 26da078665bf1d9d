// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub provider for desktop/CI builds where the native SDK is unavailable.
//
// Every command completes with `PlatformUnavailable`; real implementations
// live in the `ios` and `android` modules.

use std::sync::Arc;

use telematics_core::config::TrackingSettings;
use telematics_core::error::{Result, TelematicsError};
use telematics_core::types::{
    AccidentDetectionSensitivity, ApiLanguage, AutoStartParams, EventTopic,
    PermissionWizardOptions, SpeedViolationParams, TagRecord,
};

use crate::traits::*;

/// No-op provider returned on non-mobile platforms.
pub struct StubProvider;

fn unavailable<T>(what: &str, done: Completion<T>) {
    tracing::warn!(command = what, "called on stub provider");
    done.fail(TelematicsError::PlatformUnavailable)
}

impl CapabilityProvider for StubProvider {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl SdkLifecycle for StubProvider {
    fn initialize(&self, _settings: &TrackingSettings, done: Completion<()>) {
        unavailable("initialize", done)
    }

    fn is_initialized(&self, done: Completion<bool>) {
        // Nothing to initialise, and nothing ever will be.
        done.value(false)
    }

    fn set_enable_sdk(&self, _enable: bool, done: Completion<()>) {
        unavailable("set_enable_sdk", done)
    }

    fn is_sdk_enabled(&self, done: Completion<bool>) {
        done.value(false)
    }

    fn logout(&self, done: Completion<()>) {
        unavailable("logout", done)
    }
}

impl DeviceIdentity for StubProvider {
    fn device_id(&self, done: Completion<String>) {
        unavailable("device_id", done)
    }

    fn set_device_id(&self, _device_id: &str, done: Completion<()>) {
        unavailable("set_device_id", done)
    }
}

impl Permissions for StubProvider {
    fn all_permissions_and_sensors_granted(&self, done: Completion<bool>) {
        done.value(false)
    }

    fn show_permission_wizard(&self, _options: PermissionWizardOptions, done: Completion<bool>) {
        unavailable("show_permission_wizard", done)
    }
}

impl TrackingControl for StubProvider {
    fn is_tracking(&self, done: Completion<bool>) {
        done.value(false)
    }

    fn start_tracking(&self, done: Completion<()>) {
        unavailable("start_tracking", done)
    }

    fn start_persistent_tracking(&self, done: Completion<()>) {
        unavailable("start_persistent_tracking", done)
    }

    fn stop_tracking(&self, done: Completion<()>) {
        unavailable("stop_tracking", done)
    }
}

impl TripUpload for StubProvider {
    fn upload_unsent_trips(&self, done: Completion<()>) {
        unavailable("upload_unsent_trips", done)
    }

    fn unsent_trip_count(&self, done: Completion<u32>) {
        done.value(0)
    }

    fn send_custom_heartbeat(&self, _reason: &str, done: Completion<()>) {
        unavailable("send_custom_heartbeat", done)
    }
}

impl AccidentDetection for StubProvider {
    fn set_accident_detection_sensitivity(
        &self,
        _sensitivity: AccidentDetectionSensitivity,
        done: Completion<()>,
    ) {
        unavailable("set_accident_detection_sensitivity", done)
    }

    fn is_rtld_enabled(&self, done: Completion<bool>) {
        done.value(false)
    }

    fn set_accidents_enabled(&self, _enable: bool, done: Completion<()>) {
        unavailable("set_accidents_enabled", done)
    }

    fn accidents_enabled(&self, done: Completion<bool>) {
        done.value(false)
    }
}

impl SpeedMonitoring for StubProvider {
    fn register_speed_violations(&self, _params: SpeedViolationParams, done: Completion<()>) {
        unavailable("register_speed_violations", done)
    }
}

impl FutureTrackTags for StubProvider {
    fn set_tag_delegate(&self, _delegate: Arc<dyn TagDelegate>) {}

    fn add_future_track_tag(&self, _tag: &TagRecord) -> Result<()> {
        Err(TelematicsError::PlatformUnavailable)
    }

    fn remove_future_track_tag(&self, _tag: &str, _source: Option<&str>) -> Result<()> {
        Err(TelematicsError::PlatformUnavailable)
    }

    fn remove_all_future_track_tags(&self) -> Result<()> {
        Err(TelematicsError::PlatformUnavailable)
    }

    fn get_future_track_tags(&self) -> Result<()> {
        Err(TelematicsError::PlatformUnavailable)
    }
}

impl IosExtensions for StubProvider {
    fn is_aggressive_heartbeat(&self, done: Completion<bool>) {
        unavailable("is_aggressive_heartbeat", done)
    }

    fn set_aggressive_heartbeats(&self, _enable: bool, done: Completion<()>) {
        unavailable("set_aggressive_heartbeats", done)
    }

    fn set_disable_tracking(&self, _disable: bool, done: Completion<()>) {
        unavailable("set_disable_tracking", done)
    }

    fn is_disable_tracking(&self, done: Completion<bool>) {
        unavailable("is_disable_tracking", done)
    }

    fn is_wrong_accuracy_state(&self, done: Completion<bool>) {
        unavailable("is_wrong_accuracy_state", done)
    }

    fn request_location_always_permission(&self, done: Completion<bool>) {
        unavailable("request_location_always_permission", done)
    }

    fn request_motion_permission(&self, done: Completion<bool>) {
        unavailable("request_motion_permission", done)
    }

    fn api_language(&self, done: Completion<ApiLanguage>) {
        unavailable("api_language", done)
    }

    fn set_api_language(&self, _language: ApiLanguage, done: Completion<()>) {
        unavailable("set_api_language", done)
    }
}

impl AndroidExtensions for StubProvider {
    fn set_auto_start_enabled(&self, _params: AutoStartParams, done: Completion<()>) {
        unavailable("set_auto_start_enabled", done)
    }

    fn is_auto_start_enabled(&self, done: Completion<bool>) {
        unavailable("is_auto_start_enabled", done)
    }
}

impl EventSources for StubProvider {
    fn register_delegate(&self, topic: EventTopic, _sink: Arc<dyn EventSink>) -> Result<()> {
        // Accept the registration; the stub simply never emits.
        tracing::debug!(%topic, "stub provider: delegate registered (never fires)");
        Ok(())
    }

    fn unregister_delegate(&self, _topic: EventTopic) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn commands_fail_with_platform_unavailable() {
        let (tx, rx) = mpsc::channel();
        StubProvider.start_tracking(Completion::new(move |r| {
            tx.send(matches!(
                r,
                NativeReply::Failed(TelematicsError::PlatformUnavailable)
            ))
            .unwrap()
        }));
        assert!(rx.recv().unwrap());
    }

    #[test]
    fn tag_requests_are_refused_synchronously() {
        assert!(StubProvider.get_future_track_tags().is_err());
    }
}
