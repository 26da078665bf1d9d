// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS telematics provider via objc2.
//
// Requires linking against the vendor framework that exports `RPEntry`,
// `RPTracker`, `RPTag`, and `RPPermissionsWizard`.  Classes are resolved at
// runtime, so a missing framework surfaces as `TelematicsError::Bridge`
// instead of a link failure.
//
// All pushed callbacks land on a single `TelematicsSdkDelegate` object which
// forwards into `router::global()`.  Tag operations take completion blocks,
// built with `block2`, that route through the same place.
//
// Unsafe code here falls into two categories:
//
// 1. **ObjC message sends** (msg_send!, define_class! #[unsafe(...)]):
//    selectors and argument types mirror the vendor headers.
// 2. **Raw object pointers** handed to completion blocks: only dereferenced
//    while the block runs, when the SDK guarantees they are live.

#![cfg(target_os = "ios")]

use std::ffi::CStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use block2::RcBlock;
use objc2::encode::{Encode, Encoding};
use objc2::rc::Retained;
use objc2::runtime::{AnyClass, AnyObject, Bool, NSObject, NSObjectProtocol};
use objc2::{AllocAnyThread, MainThreadMarker, define_class, msg_send};
use objc2_foundation::{NSArray, NSString};

use telematics_core::config::TrackingSettings;
use telematics_core::error::{Result, TelematicsError};
use telematics_core::types::{
    AccidentDetectionSensitivity, ApiLanguage, AutoStartParams, EventTopic,
    LocationChangedEvent, LowPowerModeEvent, PermissionWizardOptions, Platform,
    SpeedViolationEvent, SpeedViolationParams, TagRecord, TagSlot, TagStatus, TelematicsEvent,
};

use crate::router;
use crate::traits::*;

// ---------------------------------------------------------------------------
// Runtime lookups
// ---------------------------------------------------------------------------

fn class(name: &CStr) -> Result<&'static AnyClass> {
    AnyClass::get(name)
        .ok_or_else(|| TelematicsError::Bridge(format!("class {name:?} is not linked")))
}

/// `[RPEntry instance]`.
fn entry() -> Result<Retained<AnyObject>> {
    let cls = class(c"RPEntry")?;
    // SAFETY: `instance` is the documented singleton accessor.
    let instance: Option<Retained<AnyObject>> = unsafe { msg_send![cls, instance] };
    instance.ok_or_else(|| TelematicsError::Bridge("RPEntry instance is nil".into()))
}

/// `[RPTracker instance]`.
fn tracker() -> Result<Retained<AnyObject>> {
    let cls = class(c"RPTracker")?;
    // SAFETY: `instance` is the documented singleton accessor.
    let instance: Option<Retained<AnyObject>> = unsafe { msg_send![cls, instance] };
    instance.ok_or_else(|| TelematicsError::Bridge("RPTracker instance is nil".into()))
}

/// `[[RPEntry instance] api]`, the tag endpoint.
fn tags_api() -> Result<Retained<AnyObject>> {
    let entry = entry()?;
    // SAFETY: `api` is a readonly object property on RPEntry.
    let api: Option<Retained<AnyObject>> = unsafe { msg_send![&entry, api] };
    api.ok_or_else(|| TelematicsError::Bridge("RPEntry.api is nil".into()))
}

/// Assert that we are on the main thread and return the marker.
fn require_main_thread() -> Result<MainThreadMarker> {
    MainThreadMarker::new()
        .ok_or_else(|| TelematicsError::Bridge("must be called from the main thread".into()))
}

fn android_only<T>(command: &str, done: Completion<T>) {
    tracing::warn!(command, "Android-only capability called on iOS provider");
    done.fail(TelematicsError::UnsupportedPlatform {
        capability: command.into(),
        required: Platform::Android,
    })
}

fn language_code(language: ApiLanguage) -> isize {
    match language {
        ApiLanguage::None => 0,
        ApiLanguage::English => 1,
        ApiLanguage::Russian => 2,
        ApiLanguage::Portuguese => 3,
        ApiLanguage::Spanish => 4,
    }
}

fn language_from_code(code: isize) -> Result<ApiLanguage> {
    match code {
        0 => Ok(ApiLanguage::None),
        1 => Ok(ApiLanguage::English),
        2 => Ok(ApiLanguage::Russian),
        3 => Ok(ApiLanguage::Portuguese),
        4 => Ok(ApiLanguage::Spanish),
        other => Err(TelematicsError::Provider(format!("unknown API language code {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Value conversion
// ---------------------------------------------------------------------------

/// `CLLocationCoordinate2D`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct Coordinate {
    latitude: f64,
    longitude: f64,
}

// SAFETY: layout matches the C struct (two doubles).
unsafe impl Encode for Coordinate {
    const ENCODING: Encoding =
        Encoding::Struct("CLLocationCoordinate2D", &[f64::ENCODING, f64::ENCODING]);
}

/// Read an `RPTag` into a record. `None` when the pointer or tag is nil.
///
/// SAFETY: `ptr` must be nil or point to a live `RPTag`.
unsafe fn tag_from_ptr(ptr: *mut AnyObject) -> Option<TagRecord> {
    let obj = unsafe { ptr.as_ref() }?;
    // SAFETY: `tag` and `source` are NSString properties on RPTag.
    let tag: Option<Retained<NSString>> = unsafe { msg_send![obj, tag] };
    let source: Option<Retained<NSString>> = unsafe { msg_send![obj, source] };
    tag.map(|t| TagRecord::new(t.to_string(), source.map(|s| s.to_string())))
}

fn new_rp_tag(record: &TagRecord) -> Result<Retained<AnyObject>> {
    let cls = class(c"RPTag")?;
    // SAFETY: RPTag is a plain NSObject subclass with a designated `init`.
    let tag: Option<Retained<AnyObject>> = unsafe { msg_send![cls, new] };
    let tag = tag.ok_or_else(|| TelematicsError::Bridge("RPTag alloc failed".into()))?;
    let ns_tag = NSString::from_str(&record.tag);
    // SAFETY: `tag` / `source` are readwrite NSString properties.
    unsafe {
        let _: () = msg_send![&tag, setTag: &*ns_tag];
        if let Some(source) = &record.source {
            let ns_source = NSString::from_str(source);
            let _: () = msg_send![&tag, setSource: &*ns_source];
        }
    }
    Ok(tag)
}

// ---------------------------------------------------------------------------
// SDK delegate
// ---------------------------------------------------------------------------

// SAFETY: define_class! #[unsafe(super(NSObject))] declares the delegate as an
// ObjC class inheriting from NSObject. It holds no ivars, so it may be created
// and messaged from any thread.
define_class! {
    #[unsafe(super(NSObject))]
    #[name = "TelematicsSdkDelegate"]
    struct SdkDelegate;

    unsafe impl NSObjectProtocol for SdkDelegate {}

    impl SdkDelegate {
        #[unsafe(method(lowPowerMode:))]
        fn low_power_mode(&self, enabled: Bool) {
            router::global().deliver_event(TelematicsEvent::LowPowerMode(LowPowerModeEvent {
                enabled: enabled.as_bool(),
            }));
        }

        #[unsafe(method(onLocationChanged:))]
        fn location_changed(&self, location: &AnyObject) {
            // SAFETY: the SDK passes a CLLocation; `coordinate` returns the
            // struct by value.
            let coordinate: Coordinate = unsafe { msg_send![location, coordinate] };
            router::global().deliver_event(TelematicsEvent::LocationChanged(
                LocationChangedEvent {
                    latitude: coordinate.latitude,
                    longitude: coordinate.longitude,
                },
            ));
        }

        #[unsafe(method(trackingStateChanged:))]
        fn tracking_state_changed(&self, tracking: Bool) {
            router::global()
                .deliver_event(TelematicsEvent::TrackingStateChanged(tracking.as_bool()));
        }

        #[unsafe(method(wrongAccuracyAuthorization))]
        fn wrong_accuracy_authorization(&self) {
            router::global().deliver_event(TelematicsEvent::WrongAccuracyAuthorization);
        }

        #[unsafe(method(rtldColectedData))]
        fn rtld_collected(&self) {
            router::global().deliver_event(TelematicsEvent::RtldCollected);
        }

        #[unsafe(method(speedLimitNotification:speed:latitude:longitude:date:))]
        fn speed_limit_notification(
            &self,
            speed_limit: f64,
            speed: f64,
            latitude: f64,
            longitude: f64,
            date: &AnyObject,
        ) {
            // SAFETY: `date` is an NSDate.
            let seconds: f64 = unsafe { msg_send![date, timeIntervalSince1970] };
            router::global().deliver_event(TelematicsEvent::SpeedViolation(SpeedViolationEvent {
                date: seconds as i64,
                latitude,
                longitude,
                speed,
                speed_limit,
            }));
        }
    }
}

impl SdkDelegate {
    fn new() -> Retained<Self> {
        let this = Self::alloc().set_ivars(());
        // SAFETY: Standard NSObject init via super.
        unsafe { msg_send![super(this), init] }
    }

    /// The process-wide delegate. SDK delegate properties are weak, so the
    /// object is retained for the life of the process.
    fn shared() -> &'static SdkDelegate {
        static SHARED: OnceLock<usize> = OnceLock::new();
        let ptr = *SHARED.get_or_init(|| Retained::into_raw(SdkDelegate::new()) as usize);
        // SAFETY: the pointer came from `Retained::into_raw` and is never released.
        unsafe { &*(ptr as *const SdkDelegate) }
    }
}

/// RPEntry property setter that owns the delegate slot for `topic`.
fn delegate_setter(topic: EventTopic) -> &'static str {
    match topic {
        EventTopic::LowPowerMode => "lowPowerModeDelegate",
        EventTopic::LocationChanged => "locationDelegate",
        EventTopic::TrackingStateChanged => "trackingStateDelegate",
        EventTopic::WrongAccuracyAuthorization => "accuracyAuthorizationDelegate",
        EventTopic::RtldCollected => "rtldDelegate",
        EventTopic::SpeedViolation => "speedLimitDelegate",
    }
}

fn set_entry_delegate(topic: EventTopic, delegate: Option<&SdkDelegate>) -> Result<()> {
    let entry = entry()?;
    // SAFETY: each selector is an `id` delegate property on RPEntry; nil clears it.
    unsafe {
        match topic {
            EventTopic::LowPowerMode => {
                let _: () = msg_send![&entry, setLowPowerModeDelegate: delegate];
            }
            EventTopic::LocationChanged => {
                let _: () = msg_send![&entry, setLocationDelegate: delegate];
            }
            EventTopic::TrackingStateChanged => {
                let _: () = msg_send![&entry, setTrackingStateDelegate: delegate];
            }
            EventTopic::WrongAccuracyAuthorization => {
                let _: () = msg_send![&entry, setAccuracyAuthorizationDelegate: delegate];
            }
            EventTopic::RtldCollected => {
                let _: () = msg_send![&entry, setRtldDelegate: delegate];
            }
            EventTopic::SpeedViolation => {
                let _: () = msg_send![&entry, setSpeedLimitDelegate: delegate];
            }
        }
    }
    tracing::debug!(
        %topic,
        property = delegate_setter(topic),
        attached = delegate.is_some(),
        "iOS: delegate property updated"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// IosProvider
// ---------------------------------------------------------------------------

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Concrete iOS telematics provider.
///
/// Only the permission wizard requires the main thread; everything else may
/// be called from any thread.
pub struct IosProvider;

impl IosProvider {
    /// Create a new iOS provider instance.
    pub fn new() -> Self {
        Self
    }

    fn entry_bool(what: &str, f: impl FnOnce(&AnyObject) -> bool) -> Result<bool> {
        let entry = entry()?;
        let value = f(&entry);
        tracing::trace!(what, value, "iOS: query");
        Ok(value)
    }

    fn entry_call(f: impl FnOnce(&AnyObject)) -> Result<()> {
        let entry = entry()?;
        f(&entry);
        Ok(())
    }
}

impl Default for IosProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityProvider for IosProvider {
    fn platform_name(&self) -> &str {
        "iOS"
    }
}

impl SdkLifecycle for IosProvider {
    fn initialize(&self, settings: &TrackingSettings, done: Completion<()>) {
        if INITIALIZED.load(Ordering::Acquire) {
            tracing::debug!("iOS: SDK already initialised");
            return done.value(());
        }
        let result = class(c"RPEntry").map(|cls| {
            // SAFETY: `enableHF:` is a class method taking BOOL.
            unsafe {
                let _: () = msg_send![cls, enableHF: Bool::new(settings.high_frequency)];
            }
            // The SDK needs a live delegate before it starts emitting.
            SdkDelegate::shared();
            INITIALIZED.store(true, Ordering::Release);
            tracing::info!("iOS: SDK initialised");
        });
        done.settle(result)
    }

    fn is_initialized(&self, done: Completion<bool>) {
        done.value(INITIALIZED.load(Ordering::Acquire))
    }

    fn set_enable_sdk(&self, enable: bool, done: Completion<()>) {
        done.settle(Self::entry_call(|entry| {
            // SAFETY: `setEnableSdk:` takes BOOL.
            unsafe {
                let _: () = msg_send![entry, setEnableSdk: Bool::new(enable)];
            }
        }))
    }

    fn is_sdk_enabled(&self, done: Completion<bool>) {
        done.settle(class(c"RPEntry").map(|cls| {
            // SAFETY: `isSDKEnabled` is a BOOL class method.
            let enabled: Bool = unsafe { msg_send![cls, isSDKEnabled] };
            enabled.as_bool()
        }))
    }

    fn logout(&self, done: Completion<()>) {
        done.settle(Self::entry_call(|entry| {
            // SAFETY: `logout` takes no arguments.
            unsafe {
                let _: () = msg_send![entry, logout];
            }
        }))
    }
}

impl DeviceIdentity for IosProvider {
    fn device_id(&self, done: Completion<String>) {
        done.settle(entry().map(|entry| {
            // SAFETY: `virtualDeviceToken` is a nullable NSString property.
            let token: Option<Retained<NSString>> = unsafe { msg_send![&entry, virtualDeviceToken] };
            token.map(|t| t.to_string()).unwrap_or_default()
        }))
    }

    fn set_device_id(&self, device_id: &str, done: Completion<()>) {
        let token = NSString::from_str(device_id);
        done.settle(Self::entry_call(|entry| {
            // SAFETY: readwrite NSString property.
            unsafe {
                let _: () = msg_send![entry, setVirtualDeviceToken: &*token];
            }
        }))
    }
}

impl Permissions for IosProvider {
    fn all_permissions_and_sensors_granted(&self, done: Completion<bool>) {
        done.settle(class(c"RPEntry").map(|cls| {
            // SAFETY: BOOL class method.
            let granted: Bool = unsafe { msg_send![cls, isAllRequiredPermissionsGranted] };
            granted.as_bool()
        }))
    }

    fn show_permission_wizard(&self, _options: PermissionWizardOptions, done: Completion<bool>) {
        let entry_cls = match class(c"RPEntry") {
            Ok(cls) => cls,
            Err(e) => return done.fail(e),
        };
        // SAFETY: BOOL class method.
        let granted: Bool = unsafe { msg_send![entry_cls, isAllRequiredPermissionsGranted] };
        if granted.as_bool() {
            return done.value(true);
        }

        if let Err(e) = require_main_thread() {
            return done.fail(e);
        }
        let wizard_cls = match class(c"RPPermissionsWizard") {
            Ok(cls) => cls,
            Err(e) => return done.fail(e),
        };

        router::global().park_wizard(done);
        let finish = RcBlock::new(move |_finished: Bool| {
            // The wizard's own flag only says it closed; re-check the grants.
            // SAFETY: BOOL class method.
            let granted: Bool = unsafe { msg_send![entry_cls, isAllRequiredPermissionsGranted] };
            router::global().finish_wizard(granted.as_bool());
        });
        // SAFETY: `returnInstance` is the singleton accessor and
        // `launchWithFinish:` copies the block.
        unsafe {
            let wizard: Option<Retained<AnyObject>> = msg_send![wizard_cls, returnInstance];
            match wizard {
                Some(wizard) => {
                    let _: () = msg_send![&wizard, launchWithFinish: &*finish];
                    tracing::info!("iOS: permission wizard launched");
                }
                None => {
                    tracing::error!("iOS: RPPermissionsWizard returned no instance");
                    router::global().fail_wizard(TelematicsError::Provider(
                        "permission wizard failed to launch: no wizard instance".into(),
                    ));
                }
            }
        }
    }
}

impl TrackingControl for IosProvider {
    fn is_tracking(&self, done: Completion<bool>) {
        done.settle(tracker().map(|t| {
            // SAFETY: BOOL property.
            let active: Bool = unsafe { msg_send![&t, isActive] };
            active.as_bool()
        }))
    }

    fn start_tracking(&self, done: Completion<()>) {
        done.settle(tracker().map(|t| {
            // SAFETY: no-argument selector.
            unsafe {
                let _: () = msg_send![&t, startTracking];
            }
        }))
    }

    fn start_persistent_tracking(&self, done: Completion<()>) {
        done.settle(tracker().map(|t| {
            // SAFETY: no-argument selector.
            unsafe {
                let _: () = msg_send![&t, startPersistentTracking];
            }
        }))
    }

    fn stop_tracking(&self, done: Completion<()>) {
        done.settle(tracker().map(|t| {
            // SAFETY: no-argument selector.
            unsafe {
                let _: () = msg_send![&t, stopTracking];
            }
        }))
    }
}

impl TripUpload for IosProvider {
    fn upload_unsent_trips(&self, done: Completion<()>) {
        done.settle(Self::entry_call(|entry| {
            // SAFETY: no-argument selector.
            unsafe {
                let _: () = msg_send![entry, uploadUnsentTrips];
            }
        }))
    }

    fn unsent_trip_count(&self, done: Completion<u32>) {
        done.settle(entry().map(|entry| {
            // SAFETY: NSInteger return.
            let count: isize = unsafe { msg_send![&entry, getUnsentTripCount] };
            u32::try_from(count).unwrap_or(0)
        }))
    }

    fn send_custom_heartbeat(&self, reason: &str, done: Completion<()>) {
        let reason = NSString::from_str(reason);
        done.settle(Self::entry_call(|entry| {
            // SAFETY: takes one NSString.
            unsafe {
                let _: () = msg_send![entry, sendCustomHeartbeat: &*reason];
            }
        }))
    }
}

impl AccidentDetection for IosProvider {
    fn set_accident_detection_sensitivity(
        &self,
        sensitivity: AccidentDetectionSensitivity,
        done: Completion<()>,
    ) {
        let value = sensitivity.ordinal() as isize;
        done.settle(Self::entry_call(|entry| {
            // SAFETY: takes an NSInteger enum value.
            unsafe {
                let _: () = msg_send![entry, setAccidentDetectionSensitivity: value];
            }
        }))
    }

    fn is_rtld_enabled(&self, done: Completion<bool>) {
        done.settle(Self::entry_bool("isRTLDEnabled", |entry| {
            // SAFETY: BOOL property.
            let on: Bool = unsafe { msg_send![entry, isRTLDEnabled] };
            on.as_bool()
        }))
    }

    fn set_accidents_enabled(&self, enable: bool, done: Completion<()>) {
        done.settle(Self::entry_call(|entry| {
            // SAFETY: takes BOOL.
            unsafe {
                let _: () = msg_send![entry, enableAccidents: Bool::new(enable)];
            }
        }))
    }

    fn accidents_enabled(&self, done: Completion<bool>) {
        done.settle(Self::entry_bool("isEnabledAccidents", |entry| {
            // SAFETY: BOOL property.
            let on: Bool = unsafe { msg_send![entry, isEnabledAccidents] };
            on.as_bool()
        }))
    }
}

impl SpeedMonitoring for IosProvider {
    fn register_speed_violations(&self, params: SpeedViolationParams, done: Completion<()>) {
        let result = entry().and_then(|entry| {
            set_entry_delegate(EventTopic::SpeedViolation, Some(SdkDelegate::shared()))?;
            // SAFETY: double km/h limit and NSTimeInterval seconds.
            unsafe {
                let _: () = msg_send![
                    &entry,
                    setSpeedLimit: params.speed_limit_km_h,
                    timeout: params.speed_limit_timeout as f64
                ];
            }
            Ok(())
        });
        done.settle(result)
    }
}

/// Completion block for add/remove operations: `(status, tag, timestamp)`.
fn tag_block(slot: TagSlot) -> RcBlock<dyn Fn(isize, *mut AnyObject, isize)> {
    RcBlock::new(move |status: isize, tag: *mut AnyObject, timestamp: isize| {
        // SAFETY: the SDK passes nil or a live RPTag for the block's duration.
        let record = unsafe { tag_from_ptr(tag) };
        let status = TagStatus::from_native(status as i32);
        match slot {
            TagSlot::Add => router::global().tag_added(status, record, timestamp as i64),
            _ => router::global().tag_removed(status, record, timestamp as i64),
        }
    })
}

fn ensure_initialized() -> Result<()> {
    if INITIALIZED.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(TelematicsError::Provider("Tracking api is not initialized".into()))
    }
}

impl FutureTrackTags for IosProvider {
    fn set_tag_delegate(&self, delegate: Arc<dyn TagDelegate>) {
        router::global().set_tag_delegate(delegate);
    }

    fn add_future_track_tag(&self, tag: &TagRecord) -> Result<()> {
        ensure_initialized()?;
        let api = tags_api()?;
        let rp_tag = new_rp_tag(tag)?;
        let block = tag_block(TagSlot::Add);
        // SAFETY: `addFutureTrackTag:completion:` copies the block.
        unsafe {
            let _: () = msg_send![&api, addFutureTrackTag: &*rp_tag, completion: &*block];
        }
        Ok(())
    }

    fn remove_future_track_tag(&self, tag: &str, source: Option<&str>) -> Result<()> {
        ensure_initialized()?;
        let api = tags_api()?;
        let rp_tag = new_rp_tag(&TagRecord::new(tag, source.map(str::to_owned)))?;
        let block = tag_block(TagSlot::Remove);
        // SAFETY: `removeFutureTrackTag:completion:` copies the block.
        unsafe {
            let _: () = msg_send![&api, removeFutureTrackTag: &*rp_tag, completion: &*block];
        }
        Ok(())
    }

    fn remove_all_future_track_tags(&self) -> Result<()> {
        ensure_initialized()?;
        let api = tags_api()?;
        let block = RcBlock::new(|status: isize, timestamp: isize| {
            router::global().all_tags_removed(TagStatus::from_native(status as i32), timestamp as i64);
        });
        // SAFETY: the block is copied by the callee.
        unsafe {
            let _: () = msg_send![&api, removeAllFutureTrackTagsWithCompletion: &*block];
        }
        Ok(())
    }

    fn get_future_track_tags(&self) -> Result<()> {
        ensure_initialized()?;
        let api = tags_api()?;
        let block = RcBlock::new(|status: isize, tags: *mut AnyObject, timestamp: isize| {
            let mut records = Vec::new();
            // SAFETY: `tags` is nil or an NSArray of RPTag alive for the block.
            if let Some(list) = unsafe { (tags as *const NSArray<AnyObject>).as_ref() } {
                for i in 0..list.count() {
                    let item = list.objectAtIndex(i);
                    if let Some(record) = unsafe { tag_from_ptr(Retained::as_ptr(&item).cast_mut()) } {
                        records.push(record);
                    }
                }
            }
            router::global().tags_listed(
                TagStatus::from_native(status as i32),
                records,
                timestamp as i64,
            );
        });
        // SAFETY: the offset argument is an NSInteger; the block is copied.
        unsafe {
            let _: () = msg_send![&api, getFutureTrackTag: 0isize, completion: &*block];
        }
        Ok(())
    }
}

impl IosExtensions for IosProvider {
    fn is_aggressive_heartbeat(&self, done: Completion<bool>) {
        done.settle(Self::entry_bool("aggressiveHeartbeat", |entry| {
            // SAFETY: BOOL property.
            let on: Bool = unsafe { msg_send![entry, aggressiveHeartbeat] };
            on.as_bool()
        }))
    }

    fn set_aggressive_heartbeats(&self, enable: bool, done: Completion<()>) {
        done.settle(Self::entry_call(|entry| {
            // SAFETY: BOOL setter.
            unsafe {
                let _: () = msg_send![entry, setAggressiveHeartbeats: Bool::new(enable)];
            }
        }))
    }

    fn set_disable_tracking(&self, disable: bool, done: Completion<()>) {
        done.settle(Self::entry_call(|entry| {
            // SAFETY: BOOL setter.
            unsafe {
                let _: () = msg_send![entry, setDisableTracking: Bool::new(disable)];
            }
        }))
    }

    fn is_disable_tracking(&self, done: Completion<bool>) {
        done.settle(Self::entry_bool("disableTracking", |entry| {
            // SAFETY: BOOL property.
            let on: Bool = unsafe { msg_send![entry, disableTracking] };
            on.as_bool()
        }))
    }

    fn is_wrong_accuracy_state(&self, done: Completion<bool>) {
        done.settle(Self::entry_bool("wrongAccuracyState", |entry| {
            // SAFETY: BOOL property.
            let on: Bool = unsafe { msg_send![entry, wrongAccuracyState] };
            on.as_bool()
        }))
    }

    fn request_location_always_permission(&self, done: Completion<bool>) {
        let cls = match class(c"RPEntry") {
            Ok(cls) => cls,
            Err(e) => return done.fail(e),
        };
        let done = std::sync::Mutex::new(Some(done));
        let block = RcBlock::new(move |granted: Bool| {
            if let Some(done) = done.lock().ok().and_then(|mut d| d.take()) {
                done.value(granted.as_bool());
            }
        });
        // SAFETY: class method taking a `void (^)(BOOL)` block, copied by the callee.
        unsafe {
            let _: () = msg_send![cls, requestLocationAlwaysPermissionWithCompletion: &*block];
        }
    }

    fn request_motion_permission(&self, done: Completion<bool>) {
        let cls = match class(c"RPEntry") {
            Ok(cls) => cls,
            Err(e) => return done.fail(e),
        };
        let done = std::sync::Mutex::new(Some(done));
        let block = RcBlock::new(move |granted: Bool| {
            if let Some(done) = done.lock().ok().and_then(|mut d| d.take()) {
                done.value(granted.as_bool());
            }
        });
        // SAFETY: class method taking a `void (^)(BOOL)` block, copied by the callee.
        unsafe {
            let _: () = msg_send![cls, requestMotionPermissionWithCompletion: &*block];
        }
    }

    fn api_language(&self, done: Completion<ApiLanguage>) {
        done.settle(entry().and_then(|entry| {
            // SAFETY: NSInteger enum property.
            let code: isize = unsafe { msg_send![&entry, apiLanguage] };
            language_from_code(code)
        }))
    }

    fn set_api_language(&self, language: ApiLanguage, done: Completion<()>) {
        let code = language_code(language);
        done.settle(Self::entry_call(|entry| {
            // SAFETY: NSInteger enum setter.
            unsafe {
                let _: () = msg_send![entry, setApiLanguage: code];
            }
        }))
    }
}

impl AndroidExtensions for IosProvider {
    fn set_auto_start_enabled(&self, _params: AutoStartParams, done: Completion<()>) {
        android_only("setAndroidAutoStartEnabled", done)
    }

    fn is_auto_start_enabled(&self, done: Completion<bool>) {
        android_only("isAndroidAutoStartEnabled", done)
    }
}

impl EventSources for IosProvider {
    fn register_delegate(&self, topic: EventTopic, sink: Arc<dyn EventSink>) -> Result<()> {
        router::global().set_sink(topic, sink);
        if let Err(e) = set_entry_delegate(topic, Some(SdkDelegate::shared())) {
            router::global().clear_sink(topic);
            return Err(e);
        }
        Ok(())
    }

    fn unregister_delegate(&self, topic: EventTopic) -> Result<()> {
        router::global().clear_sink(topic);
        set_entry_delegate(topic, None)
    }
}
