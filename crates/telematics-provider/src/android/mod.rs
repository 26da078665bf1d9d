// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android telematics provider via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`.  Commands call straight into
// `com.telematicssdk.tracking.TrackingApi` and settle their completion on the
// calling thread.
//
// ## Callback glue
//
// Listener interfaces (tags, location, tracking state, speed violations) and
// the permission wizard's `onActivityResult` cannot be implemented from Rust.
// The host app ships a small Java class, `com.telematicsbridge.NativeCallbacks`,
// whose static helpers install SDK listeners and whose `native*` methods are
// exported at the bottom of this file.  Every exported entry point forwards
// into `router::global()`.
//
// `NativeCallbacks.attach(code)` / `detach(code)` take the topic codes from
// `listener_code`.  For speed violations (code 2) the listener is the one
// returned by `speedListener()`: `attach` lets it forward, `detach` silences
// it and re-registers the SDK's speed listener as `null`.

#![cfg(target_os = "android")]

use std::sync::{Arc, OnceLock};

use jni::objects::{JClass, JObject, JObjectArray, JString, JValue};
use jni::sys::{jboolean, jdouble, jint, jlong, JNI_TRUE};
use jni::{JNIEnv, JavaVM};

use telematics_core::config::{LocationAccuracy, StopTrackingTime, TrackingSettings};
use telematics_core::error::{Result, TelematicsError};
use telematics_core::types::{
    AccidentDetectionSensitivity, ApiLanguage, AutoStartParams, EventTopic,
    LocationChangedEvent, PermissionWizardOptions, Platform, SpeedViolationEvent,
    SpeedViolationParams, TagRecord, TagStatus, TelematicsEvent,
};

use crate::router;
use crate::traits::*;

const TRACKING_API: &str = "com/telematicssdk/tracking/TrackingApi";
const TRACKING_API_SIG: &str = "()Lcom/telematicssdk/tracking/TrackingApi;";
const SETTINGS: &str = "com/telematicssdk/tracking/Settings";
const SENSITIVITY: &str =
    "com/telematicssdk/tracking/model/realtime/configuration/AccidentDetectionSensitivity";
const SPEED_LISTENER_SIG: &str = "Lcom/telematicssdk/tracking/SpeedViolationsListener;";
const CALLBACKS: &str = "com/telematicsbridge/NativeCallbacks";

/// `PermissionsWizardActivity` result code meaning "all granted".
const WIZARD_RESULT_OK: jint = -1;

const NOT_INITIALIZED: &str = "Tracking api is not initialized";

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// The process `JavaVM`, resolved once from the NDK context.
fn java_vm() -> Result<&'static JavaVM> {
    static VM: OnceLock<JavaVM> = OnceLock::new();
    if let Some(vm) = VM.get() {
        return Ok(vm);
    }
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| TelematicsError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    Ok(VM.get_or_init(|| vm))
}

/// Obtain a [`JNIEnv`] for the current thread, attaching it if needed.
fn jni_env() -> Result<JNIEnv<'static>> {
    java_vm()?
        .attach_current_thread_permanently()
        .map_err(|e| TelematicsError::Bridge(format!("failed to attach JNI thread: {e}")))
}

/// Obtain the hosting Android `Activity` as a [`JObject`].
fn activity() -> Result<JObject<'static>> {
    let ctx = ndk_context::android_context();
    let ptr = ctx.context();
    if ptr.is_null() {
        return Err(TelematicsError::Bridge(
            "Android context is null, native activity not initialised".into(),
        ));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Activity.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Convenience: map any `jni::errors::Error` into `TelematicsError::Bridge`.
fn jni_err(context: &str, e: jni::errors::Error) -> TelematicsError {
    TelematicsError::Bridge(format!("{context}: {e}"))
}

/// Run `f` against `TrackingApi.getInstance()` inside a local reference frame.
///
/// A pending Java exception is cleared and reported as a provider error.
fn with_api<T>(
    what: &str,
    f: impl FnOnce(&mut JNIEnv, &JObject) -> jni::errors::Result<T>,
) -> Result<T> {
    let mut env = jni_env()?;
    let outcome = env.with_local_frame(16, |env| {
        let api = env
            .call_static_method(TRACKING_API, "getInstance", TRACKING_API_SIG, &[])?
            .l()?;
        f(env, &api)
    });
    match outcome {
        Ok(value) => Ok(value),
        Err(jni::errors::Error::JavaException) => {
            if let Err(e) = env.exception_describe() {
                tracing::warn!(what, error = %e, "Android: could not describe Java exception");
            }
            if let Err(e) = env.exception_clear() {
                tracing::warn!(what, error = %e, "Android: could not clear Java exception");
            }
            Err(TelematicsError::Provider(format!("{what}: SDK threw")))
        }
        Err(e) => Err(jni_err(what, e)),
    }
}

fn api_bool(what: &str, method: &str) -> Result<bool> {
    with_api(what, |env, api| env.call_method(api, method, "()Z", &[])?.z())
}

fn api_void(what: &str, method: &str) -> Result<()> {
    with_api(what, |env, api| {
        env.call_method(api, method, "()V", &[])?;
        Ok(())
    })
}

fn api_set_bool(what: &str, method: &str, value: bool) -> Result<()> {
    with_api(what, |env, api| {
        env.call_method(api, method, "(Z)V", &[JValue::Bool(value.into())])?;
        Ok(())
    })
}

fn api_set_string(what: &str, method: &str, value: &str) -> Result<()> {
    with_api(what, |env, api| {
        let j_value = env.new_string(value)?;
        env.call_method(api, method, "(Ljava/lang/String;)V", &[JValue::Object(&j_value)])?;
        Ok(())
    })
}

fn static_int(env: &mut JNIEnv, class: &str, getter: &str) -> jni::errors::Result<jint> {
    env.call_static_method(class, getter, "()I", &[])?.i()
}

fn ensure_initialized() -> Result<()> {
    if api_bool("isInitialized", "isInitialized")? {
        Ok(())
    } else {
        Err(TelematicsError::Provider(NOT_INITIALIZED.into()))
    }
}

fn ios_only<T>(command: &str, done: Completion<T>) {
    tracing::warn!(command, "iOS-only capability called on Android provider");
    done.fail(TelematicsError::UnsupportedPlatform {
        capability: command.into(),
        required: Platform::Ios,
    })
}

// ---------------------------------------------------------------------------
// Provider struct
// ---------------------------------------------------------------------------

/// Android implementation of the telematics provider.
///
/// Zero-sized; SDK state lives on the Java side and callback routing lives in
/// [`router::global`].
pub struct AndroidProvider;

impl AndroidProvider {
    /// Create a new Android provider.
    ///
    /// This does **not** touch JNI; the first call happens lazily.
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityProvider for AndroidProvider {
    fn platform_name(&self) -> &str {
        "Android"
    }
}

// ---------------------------------------------------------------------------
// SdkLifecycle
// ---------------------------------------------------------------------------

impl AndroidProvider {
    fn initialize_sdk(settings: &TrackingSettings) -> Result<()> {
        if api_bool("isInitialized", "isInitialized")? {
            tracing::debug!("Android: SDK already initialised");
            return Ok(());
        }
        let activity = activity()?;
        let TrackingSettings {
            stop_tracking_time,
            accuracy,
            auto_start_on,
            high_frequency,
            elm_on,
        } = settings.clone();

        with_api("initialize", |env, api| {
            let stop_time = match stop_tracking_time {
                StopTrackingTime::High => static_int(env, SETTINGS, "getStopTrackingTimeHigh")?,
                StopTrackingTime::Default => {
                    static_int(env, SETTINGS, "getStopTrackingTimeDefault")?
                }
            };
            let accuracy = match accuracy {
                LocationAccuracy::High => static_int(env, SETTINGS, "getAccuracyHigh")?,
                LocationAccuracy::Default => static_int(env, SETTINGS, "getAccuracyDefault")?,
            };
            let j_settings = env.new_object(
                SETTINGS,
                "(IIZZZ)V",
                &[
                    JValue::Int(stop_time),
                    JValue::Int(accuracy),
                    JValue::Bool(auto_start_on.into()),
                    JValue::Bool(high_frequency.into()),
                    JValue::Bool(elm_on.into()),
                ],
            )?;
            let app_ctx = env
                .call_method(&activity, "getApplicationContext", "()Landroid/content/Context;", &[])?
                .l()?;
            env.call_method(
                api,
                "initialize",
                "(Landroid/content/Context;Lcom/telematicssdk/tracking/Settings;)V",
                &[JValue::Object(&app_ctx), JValue::Object(&j_settings)],
            )?;
            // Tag answers are wanted from the start; event listeners attach
            // per topic later.
            env.call_static_method(
                CALLBACKS,
                "installTagsProcessor",
                "(Lcom/telematicssdk/tracking/TrackingApi;)V",
                &[JValue::Object(api)],
            )?;
            Ok(())
        })?;

        tracing::info!("Android: SDK initialised");
        Ok(())
    }

    fn fine_location_granted() -> Result<bool> {
        let mut env = jni_env()?;
        let activity = activity()?;
        env.with_local_frame(4, |env| {
            let permission = env.new_string("android.permission.ACCESS_FINE_LOCATION")?;
            let state = env
                .call_static_method(
                    "androidx/core/content/ContextCompat",
                    "checkSelfPermission",
                    "(Landroid/content/Context;Ljava/lang/String;)I",
                    &[JValue::Object(&activity), JValue::Object(&permission)],
                )?
                .i()?;
            // PackageManager.PERMISSION_GRANTED
            Ok(state == 0)
        })
        .map_err(|e| jni_err("checkSelfPermission", e))
    }
}

impl SdkLifecycle for AndroidProvider {
    fn initialize(&self, settings: &TrackingSettings, done: Completion<()>) {
        done.settle(Self::initialize_sdk(settings))
    }

    fn is_initialized(&self, done: Completion<bool>) {
        done.settle(api_bool("isInitialized", "isInitialized"))
    }

    fn set_enable_sdk(&self, enable: bool, done: Completion<()>) {
        let result = Self::fine_location_granted().and_then(|granted| {
            if !granted {
                return Err(TelematicsError::Provider(
                    "Missing permission ACCESS_FINE_LOCATION".into(),
                ));
            }
            api_set_bool("setEnableSdk", "setEnableSdk", enable)
        });
        done.settle(result)
    }

    fn is_sdk_enabled(&self, done: Completion<bool>) {
        done.settle(api_bool("isSdkEnabled", "isSdkEnabled"))
    }

    fn logout(&self, done: Completion<()>) {
        done.settle(api_void("logout", "logout"))
    }
}

// ---------------------------------------------------------------------------
// DeviceIdentity / Permissions
// ---------------------------------------------------------------------------

impl DeviceIdentity for AndroidProvider {
    fn device_id(&self, done: Completion<String>) {
        done.settle(with_api("getDeviceId", |env, api| {
            let raw = env
                .call_method(api, "getDeviceId", "()Ljava/lang/String;", &[])?
                .l()?;
            if raw.is_null() {
                return Ok(String::new());
            }
            let j_id = JString::from(raw);
            let id: String = env.get_string(&j_id)?.into();
            Ok(id)
        }))
    }

    fn set_device_id(&self, device_id: &str, done: Completion<()>) {
        done.settle(api_set_string("setDeviceID", "setDeviceID", device_id))
    }
}

impl Permissions for AndroidProvider {
    fn all_permissions_and_sensors_granted(&self, done: Completion<bool>) {
        done.settle(api_bool(
            "areAllRequiredPermissionsAndSensorsGranted",
            "areAllRequiredPermissionsAndSensorsGranted",
        ))
    }

    fn show_permission_wizard(&self, options: PermissionWizardOptions, done: Completion<bool>) {
        match api_bool("areAllRequiredPermissionsGranted", "areAllRequiredPermissionsGranted") {
            Ok(true) => return done.value(true),
            Ok(false) => {}
            Err(e) => return done.fail(e),
        }

        let activity = match activity() {
            Ok(a) => a,
            Err(e) => return done.fail(e),
        };
        router::global().park_wizard(done);

        let launched = jni_env().and_then(|mut env| {
            env.call_static_method(
                CALLBACKS,
                "startPermissionWizard",
                "(Landroid/app/Activity;ZZ)V",
                &[
                    JValue::Object(&activity),
                    JValue::Bool(options.enable_aggressive_permissions_wizard.into()),
                    JValue::Bool(options.enable_aggressive_permissions_wizard_page.into()),
                ],
            )
            .map(drop)
            .map_err(|e| jni_err("startPermissionWizard", e))
        });
        match launched {
            Ok(()) => tracing::info!("Android: permission wizard launched"),
            Err(e) => {
                tracing::error!(error = %e, "Android: permission wizard failed to launch");
                router::global().fail_wizard(TelematicsError::Provider(format!(
                    "permission wizard failed to launch: {e}"
                )));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tracking / trips / accidents / speed
// ---------------------------------------------------------------------------

impl TrackingControl for AndroidProvider {
    fn is_tracking(&self, done: Completion<bool>) {
        done.settle(api_bool("isTracking", "isTracking"))
    }

    fn start_tracking(&self, done: Completion<()>) {
        done.settle(api_void("startTracking", "startTracking"))
    }

    fn start_persistent_tracking(&self, done: Completion<()>) {
        done.settle(api_void("startPersistentTracking", "startPersistentTracking"))
    }

    fn stop_tracking(&self, done: Completion<()>) {
        done.settle(api_void("stopTracking", "stopTracking"))
    }
}

impl TripUpload for AndroidProvider {
    fn upload_unsent_trips(&self, done: Completion<()>) {
        done.settle(api_void("uploadUnsentTrips", "uploadUnsentTrips"))
    }

    fn unsent_trip_count(&self, done: Completion<u32>) {
        done.settle(
            with_api("getUnsentTripCount", |env, api| {
                env.call_method(api, "getUnsentTripCount", "()I", &[])?.i()
            })
            .map(|count| u32::try_from(count).unwrap_or(0)),
        )
    }

    fn send_custom_heartbeat(&self, reason: &str, done: Completion<()>) {
        done.settle(api_set_string("sendCustomHeartbeats", "sendCustomHeartbeats", reason))
    }
}

impl AccidentDetection for AndroidProvider {
    fn set_accident_detection_sensitivity(
        &self,
        sensitivity: AccidentDetectionSensitivity,
        done: Completion<()>,
    ) {
        let field = match sensitivity {
            AccidentDetectionSensitivity::Normal => "Normal",
            AccidentDetectionSensitivity::Sensitive => "Sensitive",
            AccidentDetectionSensitivity::Tough => "Tough",
        };
        done.settle(with_api("setAccidentDetectionMode", |env, api| {
            let sig = format!("L{SENSITIVITY};");
            let mode = env.get_static_field(SENSITIVITY, field, &sig)?.l()?;
            env.call_method(
                api,
                "setAccidentDetectionMode",
                format!("({sig})V"),
                &[JValue::Object(&mode)],
            )?;
            Ok(())
        }))
    }

    fn is_rtld_enabled(&self, done: Completion<bool>) {
        done.settle(api_bool("isRtdEnabled", "isRtdEnabled"))
    }

    fn set_accidents_enabled(&self, enable: bool, done: Completion<()>) {
        done.settle(api_set_bool(
            "setAccidentDetectionEnabled",
            "setAccidentDetectionEnabled",
            enable,
        ))
    }

    fn accidents_enabled(&self, done: Completion<bool>) {
        done.settle(api_bool("isAccidentDetectionEnabled", "isAccidentDetectionEnabled"))
    }
}

impl SpeedMonitoring for AndroidProvider {
    fn register_speed_violations(&self, params: SpeedViolationParams, done: Completion<()>) {
        let timeout_ms: jlong = match params.timeout_ms() {
            Ok(ms) => ms,
            Err(e) => return done.fail(e),
        };
        done.settle(with_api("registerSpeedViolations", |env, api| {
            let listener = env
                .call_static_method(CALLBACKS, "speedListener", format!("(){SPEED_LISTENER_SIG}"), &[])?
                .l()?;
            env.call_method(
                api,
                "registerSpeedViolations",
                format!("(FJ{SPEED_LISTENER_SIG})V"),
                &[
                    JValue::Float(params.speed_limit_km_h as f32),
                    JValue::Long(timeout_ms),
                    JValue::Object(&listener),
                ],
            )?;
            Ok(())
        }))
    }
}

// ---------------------------------------------------------------------------
// FutureTrackTags
// ---------------------------------------------------------------------------

impl FutureTrackTags for AndroidProvider {
    fn set_tag_delegate(&self, delegate: Arc<dyn TagDelegate>) {
        router::global().set_tag_delegate(delegate);
    }

    fn add_future_track_tag(&self, tag: &TagRecord) -> Result<()> {
        ensure_initialized()?;
        tracing::debug!(tag = %tag.tag, "Android: adding future track tag");
        with_api("addFutureTrackTag", |env, api| {
            let j_tag = env.new_string(&tag.tag)?;
            let j_source = match &tag.source {
                Some(source) => JObject::from(env.new_string(source)?),
                None => JObject::null(),
            };
            env.call_method(
                api,
                "addFutureTrackTag",
                "(Ljava/lang/String;Ljava/lang/String;)V",
                &[JValue::Object(&j_tag), JValue::Object(&j_source)],
            )?;
            Ok(())
        })
    }

    fn remove_future_track_tag(&self, tag: &str, source: Option<&str>) -> Result<()> {
        // `removeFutureTrackTag(String)` drops every source of the tag, so a
        // source-scoped removal cannot be honoured.
        if let Some(source) = source {
            return Err(TelematicsError::invalid(format!(
                "removeFutureTrackTag: Android removes by tag only (got source {source:?})"
            )));
        }
        ensure_initialized()?;
        api_set_string("removeFutureTrackTag", "removeFutureTrackTag", tag)
    }

    fn remove_all_future_track_tags(&self) -> Result<()> {
        ensure_initialized()?;
        api_void("removeAllFutureTrackTags", "removeAllFutureTrackTags")
    }

    fn get_future_track_tags(&self) -> Result<()> {
        ensure_initialized()?;
        api_void("getFutureTrackTags", "getFutureTrackTags")
    }
}

// ---------------------------------------------------------------------------
// Platform extensions
// ---------------------------------------------------------------------------

impl IosExtensions for AndroidProvider {
    fn is_aggressive_heartbeat(&self, done: Completion<bool>) {
        ios_only("isAggressiveHeartbeat", done)
    }

    fn set_aggressive_heartbeats(&self, _enable: bool, done: Completion<()>) {
        ios_only("setAggressiveHeartbeats", done)
    }

    fn set_disable_tracking(&self, _disable: bool, done: Completion<()>) {
        ios_only("setDisableTracking", done)
    }

    fn is_disable_tracking(&self, done: Completion<bool>) {
        ios_only("isDisableTracking", done)
    }

    fn is_wrong_accuracy_state(&self, done: Completion<bool>) {
        ios_only("isWrongAccuracyState", done)
    }

    fn request_location_always_permission(&self, done: Completion<bool>) {
        ios_only("requestIOSLocationAlwaysPermission", done)
    }

    fn request_motion_permission(&self, done: Completion<bool>) {
        ios_only("requestIOSMotionPermission", done)
    }

    fn api_language(&self, done: Completion<ApiLanguage>) {
        ios_only("getApiLanguage", done)
    }

    fn set_api_language(&self, _language: ApiLanguage, done: Completion<()>) {
        ios_only("setApiLanguage", done)
    }
}

impl AndroidExtensions for AndroidProvider {
    fn set_auto_start_enabled(&self, params: AutoStartParams, done: Completion<()>) {
        done.settle(with_api("setAutoStartEnabled", |env, api| {
            env.call_method(
                api,
                "setAutoStartEnabled",
                "(ZZ)V",
                &[
                    JValue::Bool(params.enable.into()),
                    JValue::Bool(params.permanent.into()),
                ],
            )?;
            Ok(())
        }))
    }

    fn is_auto_start_enabled(&self, done: Completion<bool>) {
        done.settle(api_bool("isAutoStartEnabled", "isAutoStartEnabled"))
    }
}

// ---------------------------------------------------------------------------
// EventSources
// ---------------------------------------------------------------------------

/// Topic codes understood by `NativeCallbacks.attach` / `detach`.
fn listener_code(topic: EventTopic) -> Result<jint> {
    match topic {
        EventTopic::LocationChanged => Ok(0),
        EventTopic::TrackingStateChanged => Ok(1),
        EventTopic::SpeedViolation => Ok(2),
        other => Err(TelematicsError::UnsupportedPlatform {
            capability: other.name().into(),
            required: Platform::Ios,
        }),
    }
}

fn toggle_listener(method: &str, code: jint) -> Result<()> {
    let mut env = jni_env()?;
    env.call_static_method(CALLBACKS, method, "(I)V", &[JValue::Int(code)])
        .map(drop)
        .map_err(|e| jni_err(method, e))
}

impl EventSources for AndroidProvider {
    fn register_delegate(&self, topic: EventTopic, sink: Arc<dyn EventSink>) -> Result<()> {
        let code = listener_code(topic)?;
        router::global().set_sink(topic, sink);
        if let Err(e) = toggle_listener("attach", code) {
            router::global().clear_sink(topic);
            return Err(e);
        }
        tracing::debug!(%topic, "Android: listener attached");
        Ok(())
    }

    fn unregister_delegate(&self, topic: EventTopic) -> Result<()> {
        let code = listener_code(topic)?;
        router::global().clear_sink(topic);
        toggle_listener("detach", code)?;
        tracing::debug!(%topic, "Android: listener detached");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Exported JNI entry points (called from NativeCallbacks)
// ---------------------------------------------------------------------------

fn optional_string(env: &mut JNIEnv, value: &JString) -> Option<String> {
    if value.is_null() {
        return None;
    }
    env.get_string(value).ok().map(String::from)
}

fn tag_record(env: &mut JNIEnv, tag: &JString, source: &JString) -> Option<TagRecord> {
    optional_string(env, tag).map(|t| TagRecord::new(t, optional_string(env, source)))
}

fn tag_records(env: &mut JNIEnv, tags: &JObjectArray, sources: &JObjectArray) -> Vec<TagRecord> {
    let len = env.get_array_length(tags).unwrap_or(0);
    let mut records = Vec::with_capacity(len.max(0) as usize);
    for i in 0..len {
        let Ok(tag) = env.get_object_array_element(tags, i) else {
            continue;
        };
        let source = if sources.is_null() {
            JObject::null()
        } else {
            env.get_object_array_element(sources, i)
                .unwrap_or_else(|_| JObject::null())
        };
        if let Some(record) = tag_record(env, &JString::from(tag), &JString::from(source)) {
            records.push(record);
        }
    }
    records
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_telematicsbridge_NativeCallbacks_nativeOnLocationChanged(
    _env: JNIEnv,
    _class: JClass,
    latitude: jdouble,
    longitude: jdouble,
) {
    router::global().deliver_event(TelematicsEvent::LocationChanged(LocationChangedEvent {
        latitude,
        longitude,
    }));
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_telematicsbridge_NativeCallbacks_nativeOnTrackingStateChanged(
    _env: JNIEnv,
    _class: JClass,
    tracking: jboolean,
) {
    router::global().deliver_event(TelematicsEvent::TrackingStateChanged(tracking == JNI_TRUE));
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_telematicsbridge_NativeCallbacks_nativeOnSpeedViolation(
    _env: JNIEnv,
    _class: JClass,
    date: jlong,
    latitude: jdouble,
    longitude: jdouble,
    speed: jdouble,
    speed_limit: jdouble,
) {
    router::global().deliver_event(TelematicsEvent::SpeedViolation(SpeedViolationEvent {
        date,
        latitude,
        longitude,
        speed,
        speed_limit,
    }));
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_telematicsbridge_NativeCallbacks_nativeOnTagAdd(
    mut env: JNIEnv,
    _class: JClass,
    status: jint,
    tag: JString,
    source: JString,
    timestamp: jlong,
) {
    let record = tag_record(&mut env, &tag, &source);
    router::global().tag_added(TagStatus::from_native(status), record, timestamp);
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_telematicsbridge_NativeCallbacks_nativeOnTagRemove(
    mut env: JNIEnv,
    _class: JClass,
    status: jint,
    tag: JString,
    source: JString,
    timestamp: jlong,
) {
    let record = tag_record(&mut env, &tag, &source);
    router::global().tag_removed(TagStatus::from_native(status), record, timestamp);
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_telematicsbridge_NativeCallbacks_nativeOnAllTagsRemove(
    _env: JNIEnv,
    _class: JClass,
    status: jint,
    timestamp: jlong,
) {
    router::global().all_tags_removed(TagStatus::from_native(status), timestamp);
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_telematicsbridge_NativeCallbacks_nativeOnGetTags(
    mut env: JNIEnv,
    _class: JClass,
    status: jint,
    tags: JObjectArray,
    sources: JObjectArray,
    timestamp: jlong,
) {
    let records = if tags.is_null() {
        Vec::new()
    } else {
        tag_records(&mut env, &tags, &sources)
    };
    router::global().tags_listed(TagStatus::from_native(status), records, timestamp);
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_telematicsbridge_NativeCallbacks_nativeOnPermissionWizardResult(
    _env: JNIEnv,
    _class: JClass,
    result_code: jint,
) {
    tracing::info!(result_code, "Android: permission wizard finished");
    router::global().finish_wizard(result_code == WIZARD_RESULT_OK);
}
