// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory simulation of the native telematics SDK.
//
// Keeps SDK state in memory and answers every call from a worker thread, so
// completions and delegate callbacks arrive off the caller's thread exactly as
// they do from the real SDK.  Call counters and reply knobs let tests assert
// on what the bridge actually sent to the provider.

use std::collections::HashMap;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use telematics_core::config::TrackingSettings;
use telematics_core::error::{Result, TelematicsError};
use telematics_core::types::{
    AccidentDetectionSensitivity, ApiLanguage, AutoStartParams, EventTopic, LocationChangedEvent,
    LowPowerModeEvent, PermissionWizardOptions, Platform, SpeedViolationEvent,
    SpeedViolationParams, TagRecord, TagSlot, TagStatus, TelematicsEvent, TrackingMode,
};

use crate::traits::*;

/// How the simulated SDK answers tag operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagReplyMode {
    /// One delegate callback per request.
    Once,
    /// The delegate is called twice for the same request.
    Twice,
    /// The request is accepted but never answered.
    Never,
    /// The delegate receives an error object instead of a status.
    Error,
}

/// Mutable SDK state.
#[derive(Debug)]
struct SimState {
    initialized: bool,
    settings: Option<TrackingSettings>,
    enabled: bool,
    device_id: String,
    tracking: TrackingMode,
    permissions_granted: bool,
    wizard_grants: bool,
    wizard_launch_fails: bool,
    unsent_trips: u32,
    heartbeats: Vec<String>,
    sensitivity: AccidentDetectionSensitivity,
    rtld_enabled: bool,
    accidents_enabled: bool,
    speed_limits: Option<SpeedViolationParams>,
    tags: Vec<TagRecord>,
    aggressive_heartbeat: bool,
    disable_tracking: bool,
    wrong_accuracy: bool,
    api_language: ApiLanguage,
    auto_start: AutoStartParams,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            initialized: false,
            settings: None,
            enabled: false,
            device_id: String::new(),
            tracking: TrackingMode::Idle,
            permissions_granted: true,
            wizard_grants: true,
            wizard_launch_fails: false,
            unsent_trips: 0,
            heartbeats: Vec::new(),
            sensitivity: AccidentDetectionSensitivity::Normal,
            rtld_enabled: false,
            accidents_enabled: false,
            speed_limits: None,
            tags: Vec::new(),
            aggressive_heartbeat: false,
            disable_tracking: false,
            wrong_accuracy: false,
            api_language: ApiLanguage::English,
            auto_start: AutoStartParams {
                enable: false,
                permanent: false,
            },
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Simulated capability provider.
pub struct SimulatedProvider {
    platform: Platform,
    state: Mutex<SimState>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, String>>,
    sinks: Mutex<HashMap<EventTopic, Arc<dyn EventSink>>>,
    registrations: Mutex<HashMap<EventTopic, usize>>,
    tag_delegate: Mutex<Option<Arc<dyn TagDelegate>>>,
    tag_mode: Mutex<TagReplyMode>,
    tag_status: Mutex<TagStatus>,
    echo_tags: Mutex<bool>,
    worker: Mutex<Sender<Job>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not wedge the simulator for the others.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatedProvider {
    /// Create a simulator reporting itself as running on `platform`.
    pub fn new(platform: Platform) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        std::thread::Builder::new()
            .name("sdk-simulator".into())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    job();
                }
                debug!("simulator worker exiting");
            })
            .map_err(|e| warn!(error = %e, "simulator worker unavailable, replying inline"))
            .ok();

        Self {
            platform,
            state: Mutex::new(SimState::default()),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            sinks: Mutex::new(HashMap::new()),
            registrations: Mutex::new(HashMap::new()),
            tag_delegate: Mutex::new(None),
            tag_mode: Mutex::new(TagReplyMode::Once),
            tag_status: Mutex::new(TagStatus::Success),
            echo_tags: Mutex::new(true),
            worker: Mutex::new(tx),
        }
    }

    // -- Knobs ---------------------------------------------------------------

    pub fn set_tag_reply_mode(&self, mode: TagReplyMode) {
        *lock(&self.tag_mode) = mode;
    }

    /// Status reported for subsequent tag operations (the state still changes).
    pub fn set_tag_status(&self, status: TagStatus) {
        *lock(&self.tag_status) = status;
    }

    /// Older SDK generations do not echo the tag back to the delegate.
    pub fn set_echo_tags(&self, echo: bool) {
        *lock(&self.echo_tags) = echo;
    }

    pub fn set_permissions_granted(&self, granted: bool) {
        lock(&self.state).permissions_granted = granted;
    }

    /// Whether the permission wizard ends with everything granted.
    pub fn set_wizard_grants(&self, grants: bool) {
        lock(&self.state).wizard_grants = grants;
    }

    /// Whether the permission wizard cannot be shown at all.
    pub fn set_wizard_launch_fails(&self, fails: bool) {
        lock(&self.state).wizard_launch_fails = fails;
    }

    pub fn set_unsent_trips(&self, count: u32) {
        lock(&self.state).unsent_trips = count;
    }

    pub fn set_wrong_accuracy(&self, wrong: bool) {
        lock(&self.state).wrong_accuracy = wrong;
    }

    /// Make the next call to `method` report `message` as a native error.
    pub fn fail_next(&self, method: &'static str, message: impl Into<String>) {
        lock(&self.failures).insert(method, message.into());
    }

    // -- Inspection ----------------------------------------------------------

    /// Number of times `method` was invoked on this provider.
    pub fn calls(&self, method: &str) -> usize {
        lock(&self.calls).get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    pub fn is_delegate_registered(&self, topic: EventTopic) -> bool {
        lock(&self.sinks).contains_key(&topic)
    }

    /// How many times a delegate was registered for `topic`.
    pub fn registrations(&self, topic: EventTopic) -> usize {
        lock(&self.registrations).get(&topic).copied().unwrap_or(0)
    }

    pub fn stored_tags(&self) -> Vec<TagRecord> {
        lock(&self.state).tags.clone()
    }

    pub fn heartbeats(&self) -> Vec<String> {
        lock(&self.state).heartbeats.clone()
    }

    pub fn speed_limits(&self) -> Option<SpeedViolationParams> {
        lock(&self.state).speed_limits
    }

    pub fn settings(&self) -> Option<TrackingSettings> {
        lock(&self.state).settings.clone()
    }

    // -- Event simulation ----------------------------------------------------

    /// Push an event as the SDK would. Dropped unless a delegate is registered.
    pub fn emit(&self, event: TelematicsEvent) {
        let topic = event.topic();
        let sink = lock(&self.sinks).get(&topic).cloned();
        match sink {
            Some(sink) => self.later(move || sink.emit(event)),
            None => debug!(%topic, "no delegate registered, event dropped"),
        }
    }

    pub fn simulate_location(&self, latitude: f64, longitude: f64) {
        self.emit(TelematicsEvent::LocationChanged(LocationChangedEvent {
            latitude,
            longitude,
        }));
    }

    pub fn simulate_low_power_mode(&self, enabled: bool) {
        self.emit(TelematicsEvent::LowPowerMode(LowPowerModeEvent { enabled }));
    }

    /// Drive at `speed` km/h for `sustained`. Fires a violation when the
    /// registered limit is exceeded for at least the registered timeout.
    pub fn simulate_speed(&self, speed: f64, sustained: Duration, latitude: f64, longitude: f64) {
        let Some(limits) = self.speed_limits() else {
            debug!(speed, "speed violations not registered");
            return;
        };
        if speed > limits.speed_limit_km_h
            && sustained >= Duration::from_secs(limits.speed_limit_timeout)
        {
            self.emit(TelematicsEvent::SpeedViolation(SpeedViolationEvent {
                date: Utc::now().timestamp(),
                latitude,
                longitude,
                speed,
                speed_limit: limits.speed_limit_km_h,
            }));
        }
    }

    // -- Internals -----------------------------------------------------------

    fn record(&self, method: &'static str) {
        *lock(&self.calls).entry(method).or_insert(0) += 1;
    }

    fn take_failure(&self, method: &'static str) -> Option<String> {
        lock(&self.failures).remove(method)
    }

    /// Run `job` on the worker thread.
    fn later(&self, job: impl FnOnce() + Send + 'static) {
        let job: Job = Box::new(job);
        if let Err(mpsc::SendError(job)) = lock(&self.worker).send(job) {
            job();
        }
    }

    /// Common command path: count, honour an injected failure, otherwise apply
    /// `op` to the state and reply asynchronously.
    fn answer<T: Send + 'static>(
        &self,
        method: &'static str,
        done: Completion<T>,
        op: impl FnOnce(&mut SimState) -> Result<T>,
    ) {
        self.try_answer(method, done, op);
    }

    /// [`Self::answer`], reporting whether the call succeeded.
    fn try_answer<T: Send + 'static>(
        &self,
        method: &'static str,
        done: Completion<T>,
        op: impl FnOnce(&mut SimState) -> Result<T>,
    ) -> bool {
        self.record(method);
        if let Some(message) = self.take_failure(method) {
            self.later(move || {
                done.reply(NativeReply::Checked {
                    value: None,
                    error: Some(message),
                })
            });
            return false;
        }
        let result = op(&mut lock(&self.state));
        let ok = result.is_ok();
        self.later(move || done.settle(result));
        ok
    }

    fn tracking_changed(&self, tracking: bool) {
        self.emit(TelematicsEvent::TrackingStateChanged(tracking));
    }

    fn require_initialized(&self) -> Result<()> {
        if lock(&self.state).initialized {
            Ok(())
        } else {
            Err(TelematicsError::Provider("Tracking api is not initialized".into()))
        }
    }

    /// Deliver a tag answer according to the current reply mode.
    fn tag_reply(&self, slot: TagSlot, deliver: impl Fn(&dyn TagDelegate) + Send + 'static) {
        let Some(delegate) = lock(&self.tag_delegate).clone() else {
            warn!(%slot, "no tag delegate installed, answer lost");
            return;
        };
        let mode = *lock(&self.tag_mode);
        self.later(move || match mode {
            TagReplyMode::Once => deliver(delegate.as_ref()),
            TagReplyMode::Twice => {
                deliver(delegate.as_ref());
                deliver(delegate.as_ref());
            }
            TagReplyMode::Never => debug!(%slot, "withholding tag answer"),
            TagReplyMode::Error => delegate.on_tag_error(slot, "tag server unreachable".into()),
        });
    }

    fn echo(&self, record: TagRecord) -> Option<TagRecord> {
        let echo = *lock(&self.echo_tags);
        echo.then_some(record)
    }
}

impl CapabilityProvider for SimulatedProvider {
    fn platform_name(&self) -> &str {
        match self.platform {
            Platform::Ios => "simulator (iOS)",
            Platform::Android => "simulator (Android)",
            Platform::Other => "simulator",
        }
    }
}

impl SdkLifecycle for SimulatedProvider {
    fn initialize(&self, settings: &TrackingSettings, done: Completion<()>) {
        let settings = settings.clone();
        self.answer("initialize", done, move |s| {
            if !s.initialized {
                s.initialized = true;
                s.settings = Some(settings);
                info!("simulated SDK initialised");
            }
            Ok(())
        })
    }

    fn is_initialized(&self, done: Completion<bool>) {
        self.answer("is_initialized", done, |s| Ok(s.initialized))
    }

    fn set_enable_sdk(&self, enable: bool, done: Completion<()>) {
        self.answer("set_enable_sdk", done, move |s| {
            if enable && !s.permissions_granted {
                return Err(TelematicsError::Provider(
                    "Missing permission ACCESS_FINE_LOCATION".into(),
                ));
            }
            s.enabled = enable;
            if !enable {
                s.tracking = TrackingMode::Idle;
            }
            Ok(())
        })
    }

    fn is_sdk_enabled(&self, done: Completion<bool>) {
        self.answer("is_sdk_enabled", done, |s| Ok(s.enabled))
    }

    fn logout(&self, done: Completion<()>) {
        self.answer("logout", done, |s| {
            s.enabled = false;
            s.tracking = TrackingMode::Idle;
            s.device_id.clear();
            Ok(())
        })
    }
}

impl DeviceIdentity for SimulatedProvider {
    fn device_id(&self, done: Completion<String>) {
        self.answer("device_id", done, |s| Ok(s.device_id.clone()))
    }

    fn set_device_id(&self, device_id: &str, done: Completion<()>) {
        let device_id = device_id.to_string();
        self.answer("set_device_id", done, move |s| {
            s.device_id = device_id;
            Ok(())
        })
    }
}

impl Permissions for SimulatedProvider {
    fn all_permissions_and_sensors_granted(&self, done: Completion<bool>) {
        self.answer("all_permissions_and_sensors_granted", done, |s| {
            Ok(s.permissions_granted)
        })
    }

    fn show_permission_wizard(&self, _options: PermissionWizardOptions, done: Completion<bool>) {
        self.answer("show_permission_wizard", done, |s| {
            if s.permissions_granted {
                return Ok(true);
            }
            if s.wizard_launch_fails {
                return Err(TelematicsError::Provider(
                    "permission wizard failed to launch".into(),
                ));
            }
            if s.wizard_grants {
                s.permissions_granted = true;
            }
            Ok(s.permissions_granted)
        })
    }
}

impl TrackingControl for SimulatedProvider {
    fn is_tracking(&self, done: Completion<bool>) {
        self.answer("is_tracking", done, |s| Ok(s.tracking != TrackingMode::Idle))
    }

    fn start_tracking(&self, done: Completion<()>) {
        let started = self.try_answer("start_tracking", done, |s| {
            s.tracking = TrackingMode::Tracking;
            Ok(())
        });
        if started {
            self.tracking_changed(true);
        }
    }

    fn start_persistent_tracking(&self, done: Completion<()>) {
        let started = self.try_answer("start_persistent_tracking", done, |s| {
            s.tracking = TrackingMode::PersistentTracking;
            Ok(())
        });
        if started {
            self.tracking_changed(true);
        }
    }

    fn stop_tracking(&self, done: Completion<()>) {
        let stopped = self.try_answer("stop_tracking", done, |s| {
            if s.tracking != TrackingMode::Idle {
                s.unsent_trips += 1;
            }
            s.tracking = TrackingMode::Idle;
            Ok(())
        });
        if stopped {
            self.tracking_changed(false);
        }
    }
}

impl TripUpload for SimulatedProvider {
    fn upload_unsent_trips(&self, done: Completion<()>) {
        self.answer("upload_unsent_trips", done, |s| {
            s.unsent_trips = 0;
            Ok(())
        })
    }

    fn unsent_trip_count(&self, done: Completion<u32>) {
        self.answer("unsent_trip_count", done, |s| Ok(s.unsent_trips))
    }

    fn send_custom_heartbeat(&self, reason: &str, done: Completion<()>) {
        let reason = reason.to_string();
        self.answer("send_custom_heartbeat", done, move |s| {
            s.heartbeats.push(reason);
            Ok(())
        })
    }
}

impl AccidentDetection for SimulatedProvider {
    fn set_accident_detection_sensitivity(
        &self,
        sensitivity: AccidentDetectionSensitivity,
        done: Completion<()>,
    ) {
        self.answer("set_accident_detection_sensitivity", done, move |s| {
            s.sensitivity = sensitivity;
            Ok(())
        })
    }

    fn is_rtld_enabled(&self, done: Completion<bool>) {
        self.answer("is_rtld_enabled", done, |s| Ok(s.rtld_enabled))
    }

    fn set_accidents_enabled(&self, enable: bool, done: Completion<()>) {
        self.answer("set_accidents_enabled", done, move |s| {
            s.accidents_enabled = enable;
            Ok(())
        })
    }

    fn accidents_enabled(&self, done: Completion<bool>) {
        self.answer("accidents_enabled", done, |s| Ok(s.accidents_enabled))
    }
}

impl SpeedMonitoring for SimulatedProvider {
    fn register_speed_violations(&self, params: SpeedViolationParams, done: Completion<()>) {
        self.answer("register_speed_violations", done, move |s| {
            s.speed_limits = Some(params);
            Ok(())
        })
    }
}

impl FutureTrackTags for SimulatedProvider {
    fn set_tag_delegate(&self, delegate: Arc<dyn TagDelegate>) {
        self.record("set_tag_delegate");
        *lock(&self.tag_delegate) = Some(delegate);
    }

    fn add_future_track_tag(&self, tag: &TagRecord) -> Result<()> {
        self.record("add_future_track_tag");
        self.require_initialized()?;
        let status = *lock(&self.tag_status);
        {
            let mut state = lock(&self.state);
            if !state.tags.contains(tag) {
                state.tags.push(tag.clone());
            }
        }
        let echoed = self.echo(tag.clone());
        self.tag_reply(TagSlot::Add, move |d| {
            d.on_tag_added(status, echoed.clone(), Utc::now().timestamp_millis())
        });
        Ok(())
    }

    fn remove_future_track_tag(&self, tag: &str, source: Option<&str>) -> Result<()> {
        self.record("remove_future_track_tag");
        if self.platform == Platform::Android && source.is_some() {
            return Err(TelematicsError::invalid(
                "removeFutureTrackTag: Android removes by tag only",
            ));
        }
        self.require_initialized()?;
        let status = *lock(&self.tag_status);
        lock(&self.state)
            .tags
            .retain(|record| !record.matches_removal(tag, source));
        let echoed = self.echo(TagRecord::new(tag, source.map(str::to_owned)));
        self.tag_reply(TagSlot::Remove, move |d| {
            d.on_tag_removed(status, echoed.clone(), Utc::now().timestamp_millis())
        });
        Ok(())
    }

    fn remove_all_future_track_tags(&self) -> Result<()> {
        self.record("remove_all_future_track_tags");
        self.require_initialized()?;
        let status = *lock(&self.tag_status);
        lock(&self.state).tags.clear();
        self.tag_reply(TagSlot::RemoveAll, move |d| {
            d.on_all_tags_removed(status, Utc::now().timestamp_millis())
        });
        Ok(())
    }

    fn get_future_track_tags(&self) -> Result<()> {
        self.record("get_future_track_tags");
        self.require_initialized()?;
        let status = *lock(&self.tag_status);
        let tags = self.stored_tags();
        self.tag_reply(TagSlot::List, move |d| {
            d.on_tags_listed(status, tags.clone(), Utc::now().timestamp_millis())
        });
        Ok(())
    }
}

impl IosExtensions for SimulatedProvider {
    fn is_aggressive_heartbeat(&self, done: Completion<bool>) {
        self.answer("is_aggressive_heartbeat", done, |s| Ok(s.aggressive_heartbeat))
    }

    fn set_aggressive_heartbeats(&self, enable: bool, done: Completion<()>) {
        self.answer("set_aggressive_heartbeats", done, move |s| {
            s.aggressive_heartbeat = enable;
            Ok(())
        })
    }

    fn set_disable_tracking(&self, disable: bool, done: Completion<()>) {
        self.answer("set_disable_tracking", done, move |s| {
            s.disable_tracking = disable;
            Ok(())
        })
    }

    fn is_disable_tracking(&self, done: Completion<bool>) {
        self.answer("is_disable_tracking", done, |s| Ok(s.disable_tracking))
    }

    fn is_wrong_accuracy_state(&self, done: Completion<bool>) {
        self.answer("is_wrong_accuracy_state", done, |s| Ok(s.wrong_accuracy))
    }

    fn request_location_always_permission(&self, done: Completion<bool>) {
        self.answer("request_location_always_permission", done, |s| {
            Ok(s.permissions_granted)
        })
    }

    fn request_motion_permission(&self, done: Completion<bool>) {
        self.answer("request_motion_permission", done, |s| Ok(s.permissions_granted))
    }

    fn api_language(&self, done: Completion<ApiLanguage>) {
        self.answer("api_language", done, |s| Ok(s.api_language))
    }

    fn set_api_language(&self, language: ApiLanguage, done: Completion<()>) {
        self.answer("set_api_language", done, move |s| {
            s.api_language = language;
            Ok(())
        })
    }
}

impl AndroidExtensions for SimulatedProvider {
    fn set_auto_start_enabled(&self, params: AutoStartParams, done: Completion<()>) {
        self.answer("set_auto_start_enabled", done, move |s| {
            s.auto_start = params;
            Ok(())
        })
    }

    fn is_auto_start_enabled(&self, done: Completion<bool>) {
        self.answer("is_auto_start_enabled", done, |s| Ok(s.auto_start.enable))
    }
}

impl EventSources for SimulatedProvider {
    fn register_delegate(&self, topic: EventTopic, sink: Arc<dyn EventSink>) -> Result<()> {
        self.record("register_delegate");
        *lock(&self.registrations).entry(topic).or_insert(0) += 1;
        // Replaces, never stacks.
        lock(&self.sinks).insert(topic, sink);
        debug!(%topic, "simulated delegate registered");
        Ok(())
    }

    fn unregister_delegate(&self, topic: EventTopic) -> Result<()> {
        self.record("unregister_delegate");
        lock(&self.sinks).remove(&topic);
        debug!(%topic, "simulated delegate unregistered");
        Ok(())
    }
}
