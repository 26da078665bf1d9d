// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the native telematics SDK.
//
// The native SDK is callback driven.  Plain commands hand the provider a
// `Completion` to fire once the SDK answers; tag operations answer through a
// `TagDelegate` registered up front; pushed events go to an `EventSink` that is
// registered per topic.  Providers may invoke any of these from any thread.

use std::sync::Arc;

use telematics_core::config::TrackingSettings;
use telematics_core::error::{Result, TelematicsError};
use telematics_core::types::{
    AccidentDetectionSensitivity, ApiLanguage, AutoStartParams, EventTopic,
    PermissionWizardOptions, SpeedViolationParams, TagRecord, TagSlot, TagStatus,
    TelematicsEvent,
};

// ---------------------------------------------------------------------------
// Completion plumbing
// ---------------------------------------------------------------------------

/// The shapes in which native SDK calls report back.
#[derive(Debug)]
pub enum NativeReply<T> {
    /// Plain value (or unit acknowledgement).
    Value(T),
    /// Value-plus-error pair; an error wins when both are present.
    Checked {
        value: Option<T>,
        error: Option<String>,
    },
    /// The glue failed before or while talking to the SDK.
    Failed(TelematicsError),
}

/// One-shot callback handed to the provider for a single command.
///
/// Consumed on use, so a provider cannot answer the same call twice.
pub struct Completion<T> {
    callback: Box<dyn FnOnce(NativeReply<T>) + Send + 'static>,
}

impl<T> Completion<T> {
    pub fn new(callback: impl FnOnce(NativeReply<T>) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    pub fn reply(self, reply: NativeReply<T>) {
        (self.callback)(reply)
    }

    pub fn value(self, value: T) {
        self.reply(NativeReply::Value(value))
    }

    pub fn fail(self, error: TelematicsError) {
        self.reply(NativeReply::Failed(error))
    }

    /// Forward a synchronous native result.
    pub fn settle(self, result: Result<T>) {
        match result {
            Ok(v) => self.value(v),
            Err(e) => self.fail(e),
        }
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Receives answers to future-track-tag operations.
///
/// `tag` is `None` when the SDK generation does not echo the record back.
pub trait TagDelegate: Send + Sync {
    fn on_tag_added(&self, status: TagStatus, tag: Option<TagRecord>, timestamp: i64);
    fn on_tag_removed(&self, status: TagStatus, tag: Option<TagRecord>, timestamp: i64);
    fn on_all_tags_removed(&self, status: TagStatus, timestamp: i64);
    fn on_tags_listed(&self, status: TagStatus, tags: Vec<TagRecord>, timestamp: i64);
    /// The SDK reported an error object rather than a status code.
    fn on_tag_error(&self, slot: TagSlot, message: String);
}

/// Receives events pushed by the SDK for a registered topic.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TelematicsEvent);
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Unified provider that groups all native capabilities.
///
/// Platform-specific groups (`IosExtensions`, `AndroidExtensions`) are still
/// implemented everywhere; the bridge's gate keeps them from being reached on
/// the wrong platform.
pub trait CapabilityProvider:
    SdkLifecycle
    + DeviceIdentity
    + Permissions
    + TrackingControl
    + TripUpload
    + AccidentDetection
    + SpeedMonitoring
    + FutureTrackTags
    + IosExtensions
    + AndroidExtensions
    + EventSources
    + Send
    + Sync
{
    /// Human-readable provider name (e.g. "iOS SDK", "simulator").
    fn platform_name(&self) -> &str;
}

/// SDK initialisation and global on/off switch.
pub trait SdkLifecycle {
    /// Initialise the SDK. Must be a no-op if it is already initialised.
    fn initialize(&self, settings: &TrackingSettings, done: Completion<()>);
    fn is_initialized(&self, done: Completion<bool>);
    fn set_enable_sdk(&self, enable: bool, done: Completion<()>);
    fn is_sdk_enabled(&self, done: Completion<bool>);
    /// Disable the SDK and forget the device token.
    fn logout(&self, done: Completion<()>);
}

/// Virtual device token used by the backend.
pub trait DeviceIdentity {
    fn device_id(&self, done: Completion<String>);
    fn set_device_id(&self, device_id: &str, done: Completion<()>);
}

/// Permission state and the native permission wizard.
pub trait Permissions {
    fn all_permissions_and_sensors_granted(&self, done: Completion<bool>);
    /// Present the wizard. Completes with whether everything ended up granted.
    fn show_permission_wizard(&self, options: PermissionWizardOptions, done: Completion<bool>);
}

/// Manual trip tracking.
pub trait TrackingControl {
    fn is_tracking(&self, done: Completion<bool>);
    fn start_tracking(&self, done: Completion<()>);
    fn start_persistent_tracking(&self, done: Completion<()>);
    fn stop_tracking(&self, done: Completion<()>);
}

/// Stored-trip upload and heartbeats.
pub trait TripUpload {
    fn upload_unsent_trips(&self, done: Completion<()>);
    fn unsent_trip_count(&self, done: Completion<u32>);
    fn send_custom_heartbeat(&self, reason: &str, done: Completion<()>);
}

/// Accident detection and real-time data logging.
pub trait AccidentDetection {
    fn set_accident_detection_sensitivity(
        &self,
        sensitivity: AccidentDetectionSensitivity,
        done: Completion<()>,
    );
    fn is_rtld_enabled(&self, done: Completion<bool>);
    fn set_accidents_enabled(&self, enable: bool, done: Completion<()>);
    fn accidents_enabled(&self, done: Completion<bool>);
}

/// Speed limit monitoring. Violations are pushed on `EventTopic::SpeedViolation`.
pub trait SpeedMonitoring {
    fn register_speed_violations(&self, params: SpeedViolationParams, done: Completion<()>);
}

/// Future-track tags. Answers arrive on the registered `TagDelegate`.
///
/// An `Err` return means the SDK refused the request outright and no
/// delegate callback will follow.
pub trait FutureTrackTags {
    /// Install the delegate; replaces any previous one.
    fn set_tag_delegate(&self, delegate: Arc<dyn TagDelegate>);
    fn add_future_track_tag(&self, tag: &TagRecord) -> Result<()>;
    /// Remove by `(tag, source?)`; no source removes every record with the tag.
    fn remove_future_track_tag(&self, tag: &str, source: Option<&str>) -> Result<()>;
    fn remove_all_future_track_tags(&self) -> Result<()>;
    fn get_future_track_tags(&self) -> Result<()>;
}

/// Capabilities only the iOS SDK offers.
pub trait IosExtensions {
    fn is_aggressive_heartbeat(&self, done: Completion<bool>);
    fn set_aggressive_heartbeats(&self, enable: bool, done: Completion<()>);
    fn set_disable_tracking(&self, disable: bool, done: Completion<()>);
    fn is_disable_tracking(&self, done: Completion<bool>);
    fn is_wrong_accuracy_state(&self, done: Completion<bool>);
    fn request_location_always_permission(&self, done: Completion<bool>);
    fn request_motion_permission(&self, done: Completion<bool>);
    fn api_language(&self, done: Completion<ApiLanguage>);
    fn set_api_language(&self, language: ApiLanguage, done: Completion<()>);
}

/// Capabilities only the Android SDK offers.
pub trait AndroidExtensions {
    fn set_auto_start_enabled(&self, params: AutoStartParams, done: Completion<()>);
    fn is_auto_start_enabled(&self, done: Completion<bool>);
}

/// Per-topic delegate registration.
pub trait EventSources {
    /// Start pushing `topic` events into `sink`. Replaces an existing sink.
    fn register_delegate(&self, topic: EventTopic, sink: Arc<dyn EventSink>) -> Result<()>;
    /// Stop pushing `topic` events. Unregistering an inactive topic is a no-op.
    fn unregister_delegate(&self, topic: EventTopic) -> Result<()>;
}
