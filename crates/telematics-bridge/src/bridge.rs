// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The bridge facade.
//
// Every command goes gate -> validation -> provider -> normalised result, and
// successful outcomes feed the lifecycle snapshot.  Typed methods are the Rust
// surface; `invoke` is the name-and-JSON surface used by scripted consumers
// and maps onto the same methods.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use telematics_core::command::{Command, CommandInput};
use telematics_core::config::BridgeConfig;
use telematics_core::error::{Result, TelematicsError};
use telematics_core::types::{
    AccidentDetectionSensitivity, ApiLanguage, AutoStartParams, EventTopic, LocationChangedEvent,
    LowPowerModeEvent, PermissionWizardOptions, Platform, SdkState, SpeedViolationEvent,
    SpeedViolationParams, TagListResult, TagOperationResult, TagRecord, TagStatus,
    TelematicsEvent,
};
use telematics_provider::CapabilityProvider;
use telematics_provider::traits::{
    AccidentDetection, AndroidExtensions, Completion, DeviceIdentity, IosExtensions, Permissions,
    SdkLifecycle, SpeedMonitoring, TrackingControl, TripUpload,
};

use crate::capability::{CapabilityFlag, CapabilityRegistry};
use crate::dispatcher;
use crate::events::{EventMultiplexer, Subscription};
use crate::gate::PlatformGate;
use crate::lifecycle::Lifecycle;
use crate::tags::{self, TagCorrelator};

/// Async command and event surface over one capability provider.
pub struct TelematicsBridge {
    provider: Arc<dyn CapabilityProvider>,
    config: BridgeConfig,
    registry: CapabilityRegistry,
    gate: PlatformGate,
    tags: Arc<TagCorrelator>,
    events: EventMultiplexer,
    lifecycle: Arc<Lifecycle>,
}

impl std::fmt::Debug for TelematicsBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelematicsBridge")
            .field("provider", &self.provider.platform_name())
            .field("platform", &self.registry.platform())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl TelematicsBridge {
    /// Wrap `provider`. Must be called inside a tokio runtime, which runs the
    /// event pump.
    pub fn new(provider: Arc<dyn CapabilityProvider>, config: BridgeConfig) -> Result<Self> {
        let registry = CapabilityRegistry::new(config.platform());
        let gate = PlatformGate::new(registry);
        let lifecycle = Arc::new(Lifecycle::new());
        let events = EventMultiplexer::new(provider.clone(), gate, lifecycle.clone())?;

        let correlator = Arc::new(TagCorrelator::new());
        tags::install(provider.as_ref(), &correlator);

        info!(
            provider = provider.platform_name(),
            platform = %registry.platform(),
            "telematics bridge ready"
        );
        Ok(Self {
            provider,
            config,
            registry,
            gate,
            tags: correlator,
            events,
            lifecycle,
        })
    }

    /// Bridge over the native SDK of the running target.
    pub fn native(config: BridgeConfig) -> Result<Self> {
        Self::new(telematics_provider::platform_provider(), config)
    }

    // -- Introspection ---------------------------------------------------------

    pub fn platform(&self) -> Platform {
        self.registry.platform()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.platform_name()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Lifecycle as last confirmed by the provider.
    pub fn state(&self) -> SdkState {
        self.lifecycle.snapshot()
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Availability of every command and topic on this platform.
    pub fn capability_report(&self) -> Vec<CapabilityFlag> {
        self.registry.report()
    }

    // -- Plumbing --------------------------------------------------------------

    async fn run<T: Send + 'static>(
        &self,
        command: Command,
        issue: impl FnOnce(&dyn CapabilityProvider, Completion<T>),
    ) -> Result<T> {
        self.gate.command(command)?;
        let provider = self.provider.as_ref();
        dispatcher::call(command, |done| issue(provider, done)).await
    }

    /// Boolean query whose answer is reflected in the lifecycle.
    async fn query(
        &self,
        command: Command,
        issue: impl FnOnce(&dyn CapabilityProvider, Completion<bool>),
    ) -> Result<bool> {
        let value = self.run(command, issue).await?;
        self.lifecycle.observed(command, value);
        Ok(value)
    }

    /// State change acknowledged by the provider.
    async fn mutate(
        &self,
        command: Command,
        issue: impl FnOnce(&dyn CapabilityProvider, Completion<()>),
    ) -> Result<()> {
        self.run(command, issue).await?;
        self.lifecycle.confirmed(command);
        Ok(())
    }

    // -- Lifecycle -------------------------------------------------------------

    /// Initialise the SDK with the configured tracking settings. Repeat calls
    /// are no-ops on the native side.
    pub async fn initialize(&self) -> Result<()> {
        let settings = &self.config.tracking;
        self.mutate(Command::Initialize, |p, done| p.initialize(settings, done))
            .await
    }

    pub async fn is_initialized(&self) -> Result<bool> {
        self.query(Command::IsInitialized, |p, done| p.is_initialized(done))
            .await
    }

    pub async fn device_id(&self) -> Result<String> {
        self.run(Command::GetDeviceId, |p, done| p.device_id(done))
            .await
    }

    #[instrument(skip(self))]
    pub async fn set_device_id(&self, device_id: &str) -> Result<()> {
        self.gate.command(Command::SetDeviceId)?;
        if device_id.trim().is_empty() {
            return Err(TelematicsError::invalid("setDeviceId: 'deviceId' must not be empty"));
        }
        self.mutate(Command::SetDeviceId, |p, done| p.set_device_id(device_id, done))
            .await
    }

    pub async fn logout(&self) -> Result<()> {
        self.mutate(Command::Logout, |p, done| p.logout(done)).await
    }

    pub async fn all_permissions_granted(&self) -> Result<bool> {
        self.run(Command::IsAllRequiredPermissionsAndSensorsGranted, |p, done| {
            p.all_permissions_and_sensors_granted(done)
        })
        .await
    }

    pub async fn is_sdk_enabled(&self) -> Result<bool> {
        self.query(Command::IsSdkEnabled, |p, done| p.is_sdk_enabled(done))
            .await
    }

    #[instrument(skip(self))]
    pub async fn set_enable_sdk(&self, enable: bool) -> Result<()> {
        self.run(Command::SetEnableSdk, |p, done| p.set_enable_sdk(enable, done))
            .await?;
        self.lifecycle.sdk_enabled(enable);
        Ok(())
    }

    // -- Tracking --------------------------------------------------------------

    pub async fn is_tracking(&self) -> Result<bool> {
        self.query(Command::IsTracking, |p, done| p.is_tracking(done))
            .await
    }

    pub async fn start_manual_tracking(&self) -> Result<()> {
        self.mutate(Command::StartManualTracking, |p, done| p.start_tracking(done))
            .await
    }

    pub async fn start_manual_persistent_tracking(&self) -> Result<()> {
        self.mutate(Command::StartManualPersistentTracking, |p, done| {
            p.start_persistent_tracking(done)
        })
        .await
    }

    pub async fn stop_manual_tracking(&self) -> Result<()> {
        self.mutate(Command::StopManualTracking, |p, done| p.stop_tracking(done))
            .await
    }

    // -- Trips -----------------------------------------------------------------

    pub async fn upload_unsent_trips(&self) -> Result<()> {
        self.run(Command::UploadUnsentTrips, |p, done| p.upload_unsent_trips(done))
            .await
    }

    pub async fn unsent_trip_count(&self) -> Result<u32> {
        self.run(Command::GetUnsentTripCount, |p, done| p.unsent_trip_count(done))
            .await
    }

    #[instrument(skip(self))]
    pub async fn send_custom_heartbeats(&self, reason: &str) -> Result<()> {
        self.run(Command::SendCustomHeartbeats, |p, done| {
            p.send_custom_heartbeat(reason, done)
        })
        .await
    }

    // -- Permissions -----------------------------------------------------------

    /// Show the native permission wizard. Resolves with whether every
    /// required permission ended up granted.
    #[instrument(skip(self))]
    pub async fn show_permission_wizard(&self, options: PermissionWizardOptions) -> Result<bool> {
        self.run(Command::ShowPermissionWizard, |p, done| {
            p.show_permission_wizard(options, done)
        })
        .await
    }

    // -- Accidents -------------------------------------------------------------

    pub async fn set_accident_detection_sensitivity(
        &self,
        sensitivity: AccidentDetectionSensitivity,
    ) -> Result<()> {
        self.run(Command::SetAccidentDetectionSensitivity, |p, done| {
            p.set_accident_detection_sensitivity(sensitivity, done)
        })
        .await
    }

    pub async fn is_rtld_enabled(&self) -> Result<bool> {
        self.run(Command::IsRtldEnabled, |p, done| p.is_rtld_enabled(done))
            .await
    }

    pub async fn enable_accidents(&self, enable: bool) -> Result<()> {
        self.run(Command::EnableAccidents, |p, done| {
            p.set_accidents_enabled(enable, done)
        })
        .await
    }

    pub async fn is_enabled_accidents(&self) -> Result<bool> {
        self.run(Command::IsEnabledAccidents, |p, done| p.accidents_enabled(done))
            .await
    }

    // -- Speed -----------------------------------------------------------------

    /// Start speed monitoring. Violations arrive on `onSpeedViolation`.
    #[instrument(skip(self))]
    pub async fn register_speed_violations(&self, params: SpeedViolationParams) -> Result<()> {
        self.gate.command(Command::RegisterSpeedViolations)?;
        params.validate()?;
        self.run(Command::RegisterSpeedViolations, |p, done| {
            p.register_speed_violations(params, done)
        })
        .await
    }

    // -- Future-track tags -----------------------------------------------------

    fn check_tag(&self, command: Command, record: &TagRecord) -> Result<()> {
        self.gate.command(command)?;
        if record.tag.trim().is_empty() {
            return Err(TelematicsError::invalid(format!(
                "{command}: 'tag' must not be empty"
            )));
        }
        Ok(())
    }

    pub async fn add_future_track_tag(&self, record: TagRecord) -> Result<TagOperationResult> {
        self.check_tag(Command::AddFutureTrackTag, &record)?;
        self.tags.add(self.provider.as_ref(), record).await
    }

    /// Remove by `(tag, source?)`: without a source every record carrying
    /// the tag goes.
    /// Remove by `(tag, source?)`. Android cannot narrow by source, so a
    /// source there is refused before the remove slot opens.
    pub async fn remove_future_track_tag(&self, record: TagRecord) -> Result<TagOperationResult> {
        self.check_tag(Command::RemoveFutureTrackTag, &record)?;
        if record.source.is_some() && !self.registry.tag_removal_by_source() {
            return Err(TelematicsError::invalid(format!(
                "{}: {} removes by tag only; omit 'source'",
                Command::RemoveFutureTrackTag,
                self.registry.platform()
            )));
        }
        self.tags.remove(self.provider.as_ref(), record).await
    }

    pub async fn remove_all_future_track_tags(&self) -> Result<TagStatus> {
        self.gate.command(Command::RemoveAllFutureTrackTags)?;
        self.tags.remove_all(self.provider.as_ref()).await
    }

    pub async fn future_track_tags(&self) -> Result<TagListResult> {
        self.gate.command(Command::GetFutureTrackTags)?;
        self.tags.list(self.provider.as_ref()).await
    }

    // -- iOS -------------------------------------------------------------------

    pub async fn is_aggressive_heartbeat(&self) -> Result<bool> {
        self.run(Command::IsAggressiveHeartbeat, |p, done| {
            p.is_aggressive_heartbeat(done)
        })
        .await
    }

    pub async fn set_aggressive_heartbeats(&self, enable: bool) -> Result<()> {
        self.run(Command::SetAggressiveHeartbeats, |p, done| {
            p.set_aggressive_heartbeats(enable, done)
        })
        .await
    }

    pub async fn set_disable_tracking(&self, disable: bool) -> Result<()> {
        self.run(Command::SetDisableTracking, |p, done| {
            p.set_disable_tracking(disable, done)
        })
        .await
    }

    pub async fn is_disable_tracking(&self) -> Result<bool> {
        self.run(Command::IsDisableTracking, |p, done| p.is_disable_tracking(done))
            .await
    }

    pub async fn is_wrong_accuracy_state(&self) -> Result<bool> {
        self.run(Command::IsWrongAccuracyState, |p, done| {
            p.is_wrong_accuracy_state(done)
        })
        .await
    }

    pub async fn request_location_always_permission(&self) -> Result<bool> {
        self.run(Command::RequestLocationAlwaysPermission, |p, done| {
            p.request_location_always_permission(done)
        })
        .await
    }

    pub async fn request_motion_permission(&self) -> Result<bool> {
        self.run(Command::RequestMotionPermission, |p, done| {
            p.request_motion_permission(done)
        })
        .await
    }

    pub async fn api_language(&self) -> Result<ApiLanguage> {
        self.run(Command::GetApiLanguage, |p, done| p.api_language(done))
            .await
    }

    pub async fn set_api_language(&self, language: ApiLanguage) -> Result<()> {
        self.run(Command::SetApiLanguage, |p, done| {
            p.set_api_language(language, done)
        })
        .await
    }

    // -- Android ---------------------------------------------------------------

    pub async fn set_android_auto_start_enabled(&self, params: AutoStartParams) -> Result<()> {
        self.run(Command::SetAndroidAutoStartEnabled, |p, done| {
            p.set_auto_start_enabled(params, done)
        })
        .await
    }

    pub async fn is_android_auto_start_enabled(&self) -> Result<bool> {
        self.run(Command::IsAndroidAutoStartEnabled, |p, done| {
            p.is_auto_start_enabled(done)
        })
        .await
    }

    // -- Dynamic surface -------------------------------------------------------

    /// Run a command by wire name with JSON arguments (object keyed by field
    /// name, positional array, or a bare scalar for one-field commands).
    ///
    /// Commands without a result resolve to `null`.
    #[instrument(skip(self, args))]
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value> {
        let command = Command::from_name(name)?;
        self.gate.command(command)?;
        let input = command.parse_input(&args)?;
        debug!(%command, ?input, "invoking");

        use CommandInput as In;
        match (command, input) {
            (Command::Initialize, In::None) => json(self.initialize().await?),
            (Command::IsInitialized, In::None) => json(self.is_initialized().await?),
            (Command::GetDeviceId, In::None) => json(self.device_id().await?),
            (Command::SetDeviceId, In::DeviceId(id)) => json(self.set_device_id(&id).await?),
            (Command::Logout, In::None) => json(self.logout().await?),
            (Command::IsAllRequiredPermissionsAndSensorsGranted, In::None) => {
                json(self.all_permissions_granted().await?)
            }
            (Command::IsSdkEnabled, In::None) => json(self.is_sdk_enabled().await?),
            (Command::SetEnableSdk, In::Flag(enable)) => json(self.set_enable_sdk(enable).await?),
            (Command::IsTracking, In::None) => json(self.is_tracking().await?),
            (Command::StartManualTracking, In::None) => {
                json(self.start_manual_tracking().await?)
            }
            (Command::StartManualPersistentTracking, In::None) => {
                json(self.start_manual_persistent_tracking().await?)
            }
            (Command::StopManualTracking, In::None) => json(self.stop_manual_tracking().await?),
            (Command::UploadUnsentTrips, In::None) => json(self.upload_unsent_trips().await?),
            (Command::GetUnsentTripCount, In::None) => json(self.unsent_trip_count().await?),
            (Command::SendCustomHeartbeats, In::Reason(reason)) => {
                json(self.send_custom_heartbeats(&reason).await?)
            }
            (Command::ShowPermissionWizard, In::Wizard(options)) => {
                json(self.show_permission_wizard(options).await?)
            }
            (Command::SetAccidentDetectionSensitivity, In::Sensitivity(s)) => {
                json(self.set_accident_detection_sensitivity(s).await?)
            }
            (Command::IsRtldEnabled, In::None) => json(self.is_rtld_enabled().await?),
            (Command::EnableAccidents, In::Flag(enable)) => {
                json(self.enable_accidents(enable).await?)
            }
            (Command::IsEnabledAccidents, In::None) => json(self.is_enabled_accidents().await?),
            (Command::RegisterSpeedViolations, In::SpeedViolations(params)) => {
                json(self.register_speed_violations(params).await?)
            }
            (Command::AddFutureTrackTag, In::Tag(record)) => {
                json(self.add_future_track_tag(record).await?)
            }
            (Command::RemoveFutureTrackTag, In::Tag(record)) => {
                json(self.remove_future_track_tag(record).await?)
            }
            (Command::RemoveAllFutureTrackTags, In::None) => {
                json(self.remove_all_future_track_tags().await?)
            }
            (Command::GetFutureTrackTags, In::None) => json(self.future_track_tags().await?),
            (Command::IsAggressiveHeartbeat, In::None) => {
                json(self.is_aggressive_heartbeat().await?)
            }
            (Command::SetAggressiveHeartbeats, In::Flag(enable)) => {
                json(self.set_aggressive_heartbeats(enable).await?)
            }
            (Command::SetDisableTracking, In::Flag(disable)) => {
                json(self.set_disable_tracking(disable).await?)
            }
            (Command::IsDisableTracking, In::None) => json(self.is_disable_tracking().await?),
            (Command::IsWrongAccuracyState, In::None) => {
                json(self.is_wrong_accuracy_state().await?)
            }
            (Command::RequestLocationAlwaysPermission, In::None) => {
                json(self.request_location_always_permission().await?)
            }
            (Command::RequestMotionPermission, In::None) => {
                json(self.request_motion_permission().await?)
            }
            (Command::GetApiLanguage, In::None) => {
                json(self.api_language().await?.native_name())
            }
            (Command::SetApiLanguage, In::Language(language)) => {
                json(self.set_api_language(language).await?)
            }
            (Command::SetAndroidAutoStartEnabled, In::AutoStart(params)) => {
                json(self.set_android_auto_start_enabled(params).await?)
            }
            (Command::IsAndroidAutoStartEnabled, In::None) => {
                json(self.is_android_auto_start_enabled().await?)
            }
            (command, input) => Err(TelematicsError::Bridge(format!(
                "{command}: input {input:?} does not match the command's shape"
            ))),
        }
    }

    // -- Events ----------------------------------------------------------------

    /// Attach `handler` to `topic`. Gated topics fail on the wrong platform
    /// before the provider is touched.
    pub fn subscribe(
        &self,
        topic: EventTopic,
        handler: impl Fn(&TelematicsEvent) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        self.events.subscribe(topic, handler)
    }

    /// Subscribe by wire topic name; the handler receives the JSON payload.
    pub fn subscribe_named(
        &self,
        topic: &str,
        handler: impl Fn(Value) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        let topic = EventTopic::from_name(topic)?;
        self.subscribe(topic, move |event| handler(event.payload()))
    }

    pub fn on_location_changed(
        &self,
        handler: impl Fn(LocationChangedEvent) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        self.subscribe(EventTopic::LocationChanged, move |event| {
            if let TelematicsEvent::LocationChanged(e) = event {
                handler(*e);
            }
        })
    }

    pub fn on_tracking_state_changed(
        &self,
        handler: impl Fn(bool) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        self.subscribe(EventTopic::TrackingStateChanged, move |event| {
            if let TelematicsEvent::TrackingStateChanged(tracking) = event {
                handler(*tracking);
            }
        })
    }

    pub fn on_speed_violation(
        &self,
        handler: impl Fn(SpeedViolationEvent) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        self.subscribe(EventTopic::SpeedViolation, move |event| {
            if let TelematicsEvent::SpeedViolation(e) = event {
                handler(*e);
            }
        })
    }

    /// iOS only.
    pub fn on_low_power_mode(
        &self,
        handler: impl Fn(LowPowerModeEvent) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        self.subscribe(EventTopic::LowPowerMode, move |event| {
            if let TelematicsEvent::LowPowerMode(e) = event {
                handler(*e);
            }
        })
    }

    pub fn listener_count(&self, topic: EventTopic) -> usize {
        self.events.listener_count(topic)
    }
}

fn json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use telematics_core::error::ErrorKind;
    use telematics_core::types::{TagSlot, TrackingMode};
    use telematics_provider::simulator::{SimulatedProvider, TagReplyMode};

    fn bridge_on(platform: Platform) -> (Arc<SimulatedProvider>, TelematicsBridge) {
        let sim = Arc::new(SimulatedProvider::new(platform));
        let config = BridgeConfig {
            platform_override: Some(platform),
            ..BridgeConfig::default()
        };
        let bridge = TelematicsBridge::new(sim.clone(), config).unwrap();
        (sim, bridge)
    }

    async fn initialized(platform: Platform) -> (Arc<SimulatedProvider>, TelematicsBridge) {
        let (sim, bridge) = bridge_on(platform);
        bridge.initialize().await.unwrap();
        (sim, bridge)
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within two seconds")
            .expect("channel open")
    }

    #[tokio::test]
    async fn gated_command_never_reaches_the_provider() {
        let (sim, bridge) = bridge_on(Platform::Android);
        let before = sim.total_calls();

        let err = bridge.api_language().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
        let err = bridge
            .invoke("setApiLanguage", json!({"language": "Spanish"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "setApiLanguage is only available on iOS");

        assert_eq!(sim.total_calls(), before);
    }

    #[tokio::test]
    async fn android_extension_is_gated_on_ios() {
        let (sim, bridge) = bridge_on(Platform::Ios);
        let err = bridge.is_android_auto_start_enabled().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
        assert_eq!(sim.calls("is_auto_start_enabled"), 0);
        assert_eq!(bridge.api_language().await.unwrap(), ApiLanguage::English);
    }

    #[tokio::test]
    async fn enable_sdk_round_trip() {
        let (_sim, bridge) = initialized(Platform::Android).await;
        bridge.set_enable_sdk(true).await.unwrap();
        assert!(bridge.is_sdk_enabled().await.unwrap());
        assert!(bridge.state().enabled);

        bridge.set_enable_sdk(false).await.unwrap();
        assert!(!bridge.is_sdk_enabled().await.unwrap());
        assert!(!bridge.state().enabled);
    }

    #[tokio::test]
    async fn missing_permission_rejects_enable() {
        let (sim, bridge) = initialized(Platform::Android).await;
        sim.set_permissions_granted(false);

        let err = bridge.set_enable_sdk(true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert!(err.to_string().contains("ACCESS_FINE_LOCATION"));
        assert!(!bridge.state().enabled);
    }

    #[tokio::test]
    async fn wizard_reports_the_outcome() {
        let (sim, bridge) = bridge_on(Platform::Ios);
        assert!(
            bridge
                .show_permission_wizard(PermissionWizardOptions::default())
                .await
                .unwrap()
        );

        sim.set_permissions_granted(false);
        sim.set_wizard_grants(false);
        let granted = bridge
            .invoke("showPermissionWizard", json!([true, false]))
            .await
            .unwrap();
        assert_eq!(granted, json!(false));
    }

    #[tokio::test]
    async fn wizard_that_cannot_launch_rejects() {
        let (sim, bridge) = bridge_on(Platform::Android);
        sim.set_permissions_granted(false);
        sim.set_wizard_launch_fails(true);

        let err = bridge
            .show_permission_wizard(PermissionWizardOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        let err = bridge
            .invoke("showPermissionWizard", json!([false, false]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PROVIDER_ERROR");
    }

    #[tokio::test]
    async fn injected_provider_error_rejects() {
        let (sim, bridge) = bridge_on(Platform::Android);
        sim.fail_next("device_id", "device token unavailable");
        let err = bridge.device_id().await.unwrap_err();
        assert_eq!(err.to_string(), "provider error: device token unavailable");
        bridge.set_device_id("token-7").await.unwrap();
        assert_eq!(bridge.device_id().await.unwrap(), "token-7");
    }

    #[tokio::test]
    async fn lifecycle_follows_confirmed_commands() {
        let (_sim, bridge) = bridge_on(Platform::Android);
        assert!(!bridge.state().initialized);
        bridge.initialize().await.unwrap();
        bridge.initialize().await.unwrap();
        assert!(bridge.is_initialized().await.unwrap());

        bridge.set_enable_sdk(true).await.unwrap();
        bridge.start_manual_persistent_tracking().await.unwrap();
        assert_eq!(bridge.state().tracking, TrackingMode::PersistentTracking);
        assert!(bridge.is_tracking().await.unwrap());

        bridge.logout().await.unwrap();
        let state = bridge.state();
        assert!(state.initialized);
        assert!(!state.enabled);
        assert_eq!(state.tracking, TrackingMode::Idle);
    }

    #[tokio::test]
    async fn refused_tracking_start_leaves_the_lifecycle_idle() {
        let (sim, bridge) = initialized(Platform::Android).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bridge
            .on_tracking_state_changed(move |t| tx.send(t).unwrap())
            .unwrap();

        sim.fail_next("start_tracking", "location services off");
        let err = bridge.start_manual_tracking().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(bridge.state().tracking, TrackingMode::Idle);

        bridge.start_manual_tracking().await.unwrap();
        assert!(next(&mut rx).await);
        assert_eq!(bridge.state().tracking, TrackingMode::Tracking);
    }

    #[tokio::test]
    async fn tags_fail_before_initialisation_without_leaving_a_slot_open() {
        let (_sim, bridge) = bridge_on(Platform::Android);
        let err = bridge
            .add_future_track_tag(TagRecord::new("T1", None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "provider error: Tracking api is not initialized");
        assert!(!bridge.tags.is_pending(TagSlot::Add));
    }

    #[tokio::test]
    async fn added_tag_is_listed_once() {
        let (_sim, bridge) = initialized(Platform::Android).await;
        let record = TagRecord::new("T1", Some("S1".into()));

        let added = bridge.add_future_track_tag(record.clone()).await.unwrap();
        assert_eq!(added.status, TagStatus::Success);
        assert_eq!(added.tag, record);

        let listed = bridge.future_track_tags().await.unwrap();
        assert_eq!(listed.status, TagStatus::Success);
        assert_eq!(listed.tags.iter().filter(|t| **t == record).count(), 1);
    }

    #[tokio::test]
    async fn remove_all_then_list_is_empty() {
        let (_sim, bridge) = initialized(Platform::Ios).await;
        bridge
            .add_future_track_tag(TagRecord::new("T1", None))
            .await
            .unwrap();
        bridge
            .add_future_track_tag(TagRecord::new("T2", Some("fleet".into())))
            .await
            .unwrap();

        assert_eq!(
            bridge.remove_all_future_track_tags().await.unwrap(),
            TagStatus::Success
        );
        assert!(bridge.future_track_tags().await.unwrap().tags.is_empty());
    }

    #[tokio::test]
    async fn removal_without_source_clears_every_record_of_the_tag() {
        let (sim, bridge) = initialized(Platform::Android).await;
        for source in [Some("a"), Some("b"), None] {
            bridge
                .add_future_track_tag(TagRecord::new("T1", source.map(str::to_owned)))
                .await
                .unwrap();
        }
        bridge
            .add_future_track_tag(TagRecord::new("T2", None))
            .await
            .unwrap();

        let removed = bridge
            .remove_future_track_tag(TagRecord::new("T1", None))
            .await
            .unwrap();
        assert_eq!(removed.tag.tag, "T1");
        assert_eq!(sim.stored_tags(), vec![TagRecord::new("T2", None)]);
    }

    #[tokio::test]
    async fn source_scoped_removal_is_refused_on_android() {
        let (sim, bridge) = initialized(Platform::Android).await;
        for source in ["S1", "S2"] {
            bridge
                .add_future_track_tag(TagRecord::new("T1", Some(source.into())))
                .await
                .unwrap();
        }

        let err = bridge
            .remove_future_track_tag(TagRecord::new("T1", Some("S1".into())))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = bridge
            .invoke("removeFutureTrackTag", json!({"tag": "T1", "source": "S1"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");

        assert_eq!(sim.calls("remove_future_track_tag"), 0);
        assert!(!bridge.tags.is_pending(TagSlot::Remove));
        assert_eq!(sim.stored_tags().len(), 2);
    }

    #[tokio::test]
    async fn source_scoped_removal_keeps_other_sources_on_ios() {
        let (sim, bridge) = initialized(Platform::Ios).await;
        for source in ["S1", "S2"] {
            bridge
                .add_future_track_tag(TagRecord::new("T1", Some(source.into())))
                .await
                .unwrap();
        }

        let removed = bridge
            .remove_future_track_tag(TagRecord::new("T1", Some("S1".into())))
            .await
            .unwrap();
        assert_eq!(removed.tag, TagRecord::new("T1", Some("S1".into())));
        assert_eq!(sim.stored_tags(), vec![TagRecord::new("T1", Some("S2".into()))]);
    }

    #[tokio::test]
    async fn duplicate_tag_callback_resolves_once() {
        let (sim, bridge) = initialized(Platform::Android).await;
        sim.set_tag_reply_mode(TagReplyMode::Twice);

        let first = bridge
            .add_future_track_tag(TagRecord::new("T1", None))
            .await
            .unwrap();
        assert_eq!(first.status, TagStatus::Success);
        // Let the second callback land on the empty slot.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!bridge.tags.is_pending(TagSlot::Add));

        sim.set_tag_reply_mode(TagReplyMode::Once);
        sim.set_tag_status(TagStatus::Offline);
        let second = bridge
            .add_future_track_tag(TagRecord::new("T2", None))
            .await
            .unwrap();
        assert_eq!(second.status, TagStatus::Offline);
    }

    #[tokio::test]
    async fn unanswered_tag_request_keeps_its_slot() {
        let (sim, bridge) = initialized(Platform::Android).await;
        sim.set_tag_reply_mode(TagReplyMode::Never);

        let waited = tokio::time::timeout(
            Duration::from_millis(100),
            bridge.future_track_tags(),
        )
        .await;
        assert!(waited.is_err());

        let err = bridge.future_track_tags().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Busy);
        assert_eq!(sim.calls("get_future_track_tags"), 1);

        // Other slots are independent.
        sim.set_tag_reply_mode(TagReplyMode::Once);
        assert!(bridge.remove_all_future_track_tags().await.is_ok());
    }

    #[tokio::test]
    async fn tag_error_object_rejects() {
        let (sim, bridge) = initialized(Platform::Ios).await;
        sim.set_tag_reply_mode(TagReplyMode::Error);
        let err = bridge
            .remove_future_track_tag(TagRecord::new("T1", None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert!(!bridge.tags.is_pending(TagSlot::Remove));
    }

    #[tokio::test]
    async fn missing_echo_is_filled_in() {
        let (sim, bridge) = initialized(Platform::Android).await;
        sim.set_echo_tags(false);
        let out = bridge
            .invoke("addFutureTrackTag", json!({"tag": "T9", "source": "S9"}))
            .await
            .unwrap();
        assert_eq!(
            out,
            json!({"status": "Success", "tag": {"tag": "T9", "source": "S9"}})
        );
    }

    #[tokio::test]
    async fn both_location_listeners_fire_in_order() {
        let (sim, bridge) = bridge_on(Platform::Android);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let first = tx.clone();
        let _a = bridge
            .on_location_changed(move |e| first.send(("a", e)).unwrap())
            .unwrap();
        let _b = bridge
            .on_location_changed(move |e| tx.send(("b", e)).unwrap())
            .unwrap();

        sim.simulate_location(48.1, 11.6);
        let (a, at) = next(&mut rx).await;
        let (b, bt) = next(&mut rx).await;
        assert_eq!((a, b), ("a", "b"));
        assert_eq!(at, bt);
        assert_eq!(at.latitude, 48.1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn removing_the_only_listener_stops_delivery() {
        let (sim, bridge) = bridge_on(Platform::Android);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = bridge
            .on_location_changed(move |e| tx.send(e).unwrap())
            .unwrap();
        assert!(sim.is_delegate_registered(EventTopic::LocationChanged));

        sub.remove();
        assert!(!sim.is_delegate_registered(EventTopic::LocationChanged));
        assert_eq!(bridge.listener_count(EventTopic::LocationChanged), 0);

        sim.simulate_location(0.0, 0.0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn speed_violation_fires_after_registration() {
        let (sim, bridge) = initialized(Platform::Android).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        // Subscribing before registering is legal.
        let _sub = bridge
            .on_speed_violation(move |e| tx.send(e).unwrap())
            .unwrap();

        bridge
            .register_speed_violations(SpeedViolationParams {
                speed_limit_km_h: 80.0,
                speed_limit_timeout: 10,
            })
            .await
            .unwrap();
        sim.simulate_speed(95.0, Duration::from_secs(10), 55.75, 37.62);

        let violation = next(&mut rx).await;
        assert_eq!(violation.speed, 95.0);
        assert_eq!(violation.speed_limit, 80.0);
        assert_eq!(violation.latitude, 55.75);
        assert!(violation.date > 0);
    }

    #[tokio::test]
    async fn invalid_speed_limit_is_rejected_locally() {
        let (sim, bridge) = bridge_on(Platform::Android);
        let err = bridge
            .register_speed_violations(SpeedViolationParams {
                speed_limit_km_h: 0.0,
                speed_limit_timeout: 10,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(sim.calls("register_speed_violations"), 0);
    }

    #[tokio::test]
    async fn speed_within_limit_or_timeout_stays_silent() {
        let (sim, bridge) = initialized(Platform::Android).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = bridge
            .on_speed_violation(move |e| tx.send(e).unwrap())
            .unwrap();
        bridge
            .register_speed_violations(SpeedViolationParams {
                speed_limit_km_h: 80.0,
                speed_limit_timeout: 10,
            })
            .await
            .unwrap();

        sim.simulate_speed(80.0, Duration::from_secs(60), 0.0, 0.0);
        sim.simulate_speed(95.0, Duration::from_secs(9), 0.0, 0.0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        sim.simulate_speed(95.0, Duration::from_secs(10), 0.0, 0.0);
        assert_eq!(next(&mut rx).await.speed, 95.0);

        // The last unsubscribe detaches the speed delegate too.
        sub.remove();
        assert!(!sim.is_delegate_registered(EventTopic::SpeedViolation));
        sim.simulate_speed(120.0, Duration::from_secs(60), 0.0, 0.0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn tracking_events_update_the_lifecycle() {
        let (sim, bridge) = initialized(Platform::Android).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bridge
            .on_tracking_state_changed(move |t| tx.send(t).unwrap())
            .unwrap();

        sim.emit(TelematicsEvent::TrackingStateChanged(true));
        assert!(next(&mut rx).await);
        assert_eq!(bridge.state().tracking, TrackingMode::Tracking);

        bridge.stop_manual_tracking().await.unwrap();
        assert!(!next(&mut rx).await);
        assert_eq!(bridge.state().tracking, TrackingMode::Idle);
    }

    #[tokio::test]
    async fn named_subscription_receives_json() {
        let (sim, bridge) = bridge_on(Platform::Ios);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bridge
            .subscribe_named("onLowPowerMode", move |payload| tx.send(payload).unwrap())
            .unwrap();
        sim.simulate_low_power_mode(true);
        assert_eq!(next(&mut rx).await, json!({"enabled": true}));

        let err = bridge.subscribe_named("onTeleport", |_| {}).unwrap_err();
        assert!(matches!(err, TelematicsError::UnknownTopic(_)));
    }

    #[tokio::test]
    async fn ios_topic_is_gated_on_android() {
        let (sim, bridge) = bridge_on(Platform::Android);
        let err = bridge.on_low_power_mode(|_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
        assert_eq!(sim.registrations(EventTopic::LowPowerMode), 0);
    }

    #[tokio::test]
    async fn panicking_handler_does_not_silence_others() {
        let (sim, bridge) = bridge_on(Platform::Android);
        let _bad = bridge
            .on_location_changed(|_| panic!("listener bug"))
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _good = bridge
            .on_location_changed(move |e| tx.send(e).unwrap())
            .unwrap();

        sim.simulate_location(1.0, 1.0);
        sim.simulate_location(2.0, 2.0);
        assert_eq!(next(&mut rx).await.latitude, 1.0);
        assert_eq!(next(&mut rx).await.latitude, 2.0);
    }

    #[tokio::test]
    async fn invoke_validates_before_the_provider() {
        let (sim, bridge) = bridge_on(Platform::Android);
        let before = sim.total_calls();

        let err = bridge
            .invoke("setDeviceId", json!({"deviceId": ""}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = bridge.invoke("selfDestruct", Value::Null).await.unwrap_err();
        assert!(matches!(err, TelematicsError::UnknownCommand(_)));
        let err = bridge
            .invoke("addFutureTrackTag", json!({"source": "S1"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");

        assert_eq!(sim.total_calls(), before);
    }

    #[tokio::test]
    async fn invoke_returns_json_results() {
        let (sim, bridge) = bridge_on(Platform::Android);
        sim.set_unsent_trips(3);
        assert_eq!(
            bridge.invoke("getUnsentTripCount", Value::Null).await.unwrap(),
            json!(3)
        );
        assert_eq!(
            bridge.invoke("uploadUnsentTrips", Value::Null).await.unwrap(),
            Value::Null
        );
        assert_eq!(
            bridge.invoke("getUnsentTripCount", json!([])).await.unwrap(),
            json!(0)
        );
        bridge
            .invoke("sendCustomHeartbeats", json!(["manual check"]))
            .await
            .unwrap();
        assert_eq!(sim.heartbeats(), vec!["manual check".to_string()]);

        bridge
            .invoke("setAndroidAutoStartEnabled", json!({"enable": true, "permanent": false}))
            .await
            .unwrap();
        assert_eq!(
            bridge.invoke("isAndroidAutoStartEnabled", Value::Null).await.unwrap(),
            json!(true)
        );
    }

    #[tokio::test]
    async fn initialize_passes_configured_settings() {
        let (sim, bridge) = bridge_on(Platform::Ios);
        bridge.invoke("initialize", Value::Null).await.unwrap();
        assert_eq!(sim.settings(), Some(bridge.config().tracking.clone()));
        assert_eq!(
            bridge.invoke("getApiLanguage", Value::Null).await.unwrap(),
            json!("English")
        );
    }

    #[tokio::test]
    async fn dropping_the_bridge_releases_delegates() {
        let (sim, bridge) = bridge_on(Platform::Android);
        let _sub = bridge.on_tracking_state_changed(|_| {}).unwrap();
        assert!(sim.is_delegate_registered(EventTopic::TrackingStateChanged));
        drop(bridge);
        assert!(!sim.is_delegate_registered(EventTopic::TrackingStateChanged));
    }
}
