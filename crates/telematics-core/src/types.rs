// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the telematics bridge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TelematicsError};

// ---------------------------------------------------------------------------
// Platforms and constraints
// ---------------------------------------------------------------------------

/// Runtime platform the bridge is hosted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    /// Desktop, CI, or anything without a native SDK.
    Other,
}

impl Platform {
    /// Platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "ios") {
            Self::Ios
        } else if cfg!(target_os = "android") {
            Self::Android
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ios => "iOS",
            Self::Android => "Android",
            Self::Other => "other",
        })
    }
}

/// Where a command or topic may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformConstraint {
    Any,
    IosOnly,
    AndroidOnly,
}

impl PlatformConstraint {
    pub fn allows(&self, platform: Platform) -> bool {
        match self {
            Self::Any => true,
            Self::IosOnly => platform == Platform::Ios,
            Self::AndroidOnly => platform == Platform::Android,
        }
    }

    /// The platform a gated capability requires, if any.
    pub fn required_platform(&self) -> Option<Platform> {
        match self {
            Self::Any => None,
            Self::IosOnly => Some(Platform::Ios),
            Self::AndroidOnly => Some(Platform::Android),
        }
    }
}

// ---------------------------------------------------------------------------
// Future-track tags
// ---------------------------------------------------------------------------

/// A future-track tag as stored by the native SDK.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagRecord {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl TagRecord {
    pub fn new(tag: impl Into<String>, source: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            source,
        }
    }

    /// Whether this record is hit by a removal keyed on `(tag, source?)`.
    ///
    /// A removal without a source matches every record carrying the tag.
    pub fn matches_removal(&self, tag: &str, source: Option<&str>) -> bool {
        self.tag == tag && source.is_none_or(|s| self.source.as_deref() == Some(s))
    }
}

/// Outcome codes reported by the native tag API.
///
/// Not errors: `Offline` means the operation was queued for later delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagStatus {
    #[serde(rename = "Success")]
    Success,
    #[serde(rename = "Offline")]
    Offline,
    #[serde(rename = "Wrong tag operation")]
    WrongTagOperation,
    #[serde(rename = "Invalid device token")]
    InvalidDeviceToken,
    #[serde(rename = "Invalid tag specified")]
    InvalidTagSpecified,
    #[serde(rename = "Wrong time")]
    WrongTime,
    #[serde(rename = "Unknown error")]
    Unknown,
}

impl TagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Offline => "Offline",
            Self::WrongTagOperation => "Wrong tag operation",
            Self::InvalidDeviceToken => "Invalid device token",
            Self::InvalidTagSpecified => "Invalid tag specified",
            Self::WrongTime => "Wrong time",
            Self::Unknown => "Unknown error",
        }
    }

    /// Map a raw native status ordinal. Anything unrecognised is `Unknown`.
    pub fn from_native(code: i32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Offline,
            2 => Self::InvalidTagSpecified,
            3 => Self::WrongTagOperation,
            4 => Self::WrongTime,
            5 => Self::InvalidDeviceToken,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for TagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation slot for tag operations. At most one request per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagSlot {
    Add,
    Remove,
    RemoveAll,
    List,
}

impl TagSlot {
    pub const ALL: [TagSlot; 4] = [Self::Add, Self::Remove, Self::RemoveAll, Self::List];
}

impl std::fmt::Display for TagSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Add => "add-tag",
            Self::Remove => "remove-tag",
            Self::RemoveAll => "remove-all-tags",
            Self::List => "list-tags",
        })
    }
}

/// Result of adding or removing a single tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagOperationResult {
    pub status: TagStatus,
    pub tag: TagRecord,
}

/// Result of listing tags, in provider order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagListResult {
    pub status: TagStatus,
    pub tags: Vec<TagRecord>,
}

// ---------------------------------------------------------------------------
// Command parameter types
// ---------------------------------------------------------------------------

/// Accident detection sensitivity. Native ordinals: 0, 1, 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccidentDetectionSensitivity {
    Normal,
    Sensitive,
    Tough,
}

impl AccidentDetectionSensitivity {
    pub fn ordinal(&self) -> i32 {
        match self {
            Self::Normal => 0,
            Self::Sensitive => 1,
            Self::Tough => 2,
        }
    }

    pub fn from_ordinal(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Sensitive),
            2 => Ok(Self::Tough),
            other => Err(TelematicsError::invalid(format!(
                "accident detection sensitivity must be 0, 1 or 2 (got {other})"
            ))),
        }
    }
}

/// Language of server-side API messages (iOS SDK only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiLanguage {
    None,
    English,
    Russian,
    Portuguese,
    Spanish,
}

impl ApiLanguage {
    pub fn native_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::English => "English",
            Self::Russian => "Russian",
            Self::Portuguese => "Portuguese",
            Self::Spanish => "Spanish",
        }
    }

    pub fn from_native_name(name: &str) -> Result<Self> {
        match name {
            "None" => Ok(Self::None),
            "English" => Ok(Self::English),
            "Russian" => Ok(Self::Russian),
            "Portuguese" => Ok(Self::Portuguese),
            "Spanish" => Ok(Self::Spanish),
            other => Err(TelematicsError::invalid(format!("unknown API language {other:?}"))),
        }
    }
}

/// Speed limit monitoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedViolationParams {
    pub speed_limit_km_h: f64,
    /// Seconds the limit must be exceeded before a violation is reported.
    pub speed_limit_timeout: u64,
}

impl SpeedViolationParams {
    /// Largest timeout whose millisecond form still fits a signed 64-bit long.
    pub const MAX_TIMEOUT_SECS: u64 = i64::MAX as u64 / 1000;

    pub fn validate(&self) -> Result<()> {
        if !self.speed_limit_km_h.is_finite() || self.speed_limit_km_h <= 0.0 {
            return Err(TelematicsError::invalid(format!(
                "speedLimitKmH must be a positive finite number (got {})",
                self.speed_limit_km_h
            )));
        }
        if self.speed_limit_timeout > Self::MAX_TIMEOUT_SECS {
            return Err(TelematicsError::invalid(format!(
                "speedLimitTimeout must be at most {} seconds (got {})",
                Self::MAX_TIMEOUT_SECS,
                self.speed_limit_timeout
            )));
        }
        Ok(())
    }

    /// Timeout in milliseconds, as the native SDK expects it.
    pub fn timeout_ms(&self) -> Result<i64> {
        self.speed_limit_timeout
            .checked_mul(1000)
            .and_then(|ms| i64::try_from(ms).ok())
            .ok_or_else(|| {
                TelematicsError::invalid(format!(
                    "speedLimitTimeout {}s does not fit in milliseconds",
                    self.speed_limit_timeout
                ))
            })
    }
}

/// Android autostart toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoStartParams {
    pub enable: bool,
    pub permanent: bool,
}

/// Options for the native permission wizard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionWizardOptions {
    /// Finish only when every required permission is granted.
    pub enable_aggressive_permissions_wizard: bool,
    /// Auto-advance when the current page's permissions are granted.
    pub enable_aggressive_permissions_wizard_page: bool,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Named event channels pushed by the native SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    LowPowerMode,
    LocationChanged,
    TrackingStateChanged,
    WrongAccuracyAuthorization,
    RtldCollected,
    SpeedViolation,
}

impl EventTopic {
    pub const ALL: [EventTopic; 6] = [
        Self::LowPowerMode,
        Self::LocationChanged,
        Self::TrackingStateChanged,
        Self::WrongAccuracyAuthorization,
        Self::RtldCollected,
        Self::SpeedViolation,
    ];

    /// Wire name used by the event contract.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LowPowerMode => "onLowPowerMode",
            Self::LocationChanged => "onLocationChanged",
            Self::TrackingStateChanged => "onTrackingStateChanged",
            Self::WrongAccuracyAuthorization => "onWrongAccuracyAuthorization",
            // Spelling is part of the published contract.
            Self::RtldCollected => "onRtldColectedData",
            Self::SpeedViolation => "onSpeedViolation",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| TelematicsError::UnknownTopic(name.to_string()))
    }

    pub fn constraint(&self) -> PlatformConstraint {
        match self {
            Self::LowPowerMode | Self::WrongAccuracyAuthorization | Self::RtldCollected => {
                PlatformConstraint::IosOnly
            }
            Self::LocationChanged | Self::TrackingStateChanged | Self::SpeedViolation => {
                PlatformConstraint::Any
            }
        }
    }
}

impl std::fmt::Display for EventTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowPowerModeEvent {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationChangedEvent {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedViolationEvent {
    /// Epoch seconds.
    pub date: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub speed_limit: f64,
}

/// One occurrence pushed by the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum TelematicsEvent {
    LowPowerMode(LowPowerModeEvent),
    LocationChanged(LocationChangedEvent),
    TrackingStateChanged(bool),
    WrongAccuracyAuthorization,
    RtldCollected,
    SpeedViolation(SpeedViolationEvent),
}

impl TelematicsEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::LowPowerMode(_) => EventTopic::LowPowerMode,
            Self::LocationChanged(_) => EventTopic::LocationChanged,
            Self::TrackingStateChanged(_) => EventTopic::TrackingStateChanged,
            Self::WrongAccuracyAuthorization => EventTopic::WrongAccuracyAuthorization,
            Self::RtldCollected => EventTopic::RtldCollected,
            Self::SpeedViolation(_) => EventTopic::SpeedViolation,
        }
    }

    /// JSON body as delivered to dynamic subscribers (`null` for bare events).
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::LowPowerMode(e) => serde_json::to_value(e),
            Self::LocationChanged(e) => serde_json::to_value(e),
            Self::TrackingStateChanged(state) => Ok(serde_json::Value::Bool(*state)),
            Self::WrongAccuracyAuthorization | Self::RtldCollected => {
                Ok(serde_json::Value::Null)
            }
            Self::SpeedViolation(e) => serde_json::to_value(e),
        }
        .unwrap_or(serde_json::Value::Null)
    }
}

/// Unique identifier for an event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SDK lifecycle
// ---------------------------------------------------------------------------

/// Tracking sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingMode {
    Idle,
    Tracking,
    /// Continues across app restarts.
    PersistentTracking,
}

/// Bridge-side view of the SDK lifecycle, updated from confirmed commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkState {
    pub initialized: bool,
    pub enabled: bool,
    pub tracking: TrackingMode,
    pub updated_at: DateTime<Utc>,
}

impl Default for SdkState {
    fn default() -> Self {
        Self {
            initialized: false,
            enabled: false,
            tracking: TrackingMode::Idle,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_without_source_matches_every_source() {
        let a = TagRecord::new("T1", Some("S1".into()));
        let b = TagRecord::new("T1", None);
        assert!(a.matches_removal("T1", None));
        assert!(b.matches_removal("T1", None));
        assert!(a.matches_removal("T1", Some("S1")));
        assert!(!a.matches_removal("T1", Some("S2")));
        assert!(!b.matches_removal("T1", Some("S1")));
        assert!(!a.matches_removal("T2", None));
    }

    #[test]
    fn tag_status_serializes_to_contract_strings() {
        let json = serde_json::to_string(&TagStatus::WrongTagOperation).unwrap();
        assert_eq!(json, "\"Wrong tag operation\"");
        assert_eq!(TagStatus::from_native(42), TagStatus::Unknown);
        assert_eq!(TagStatus::Offline.to_string(), "Offline");
    }

    #[test]
    fn topic_names_round_trip() {
        for topic in EventTopic::ALL {
            assert_eq!(EventTopic::from_name(topic.name()).unwrap(), topic);
        }
        assert!(EventTopic::from_name("onNothing").is_err());
    }

    #[test]
    fn ios_only_topics() {
        assert!(!EventTopic::LowPowerMode.constraint().allows(Platform::Android));
        assert!(EventTopic::LowPowerMode.constraint().allows(Platform::Ios));
        assert!(EventTopic::SpeedViolation.constraint().allows(Platform::Other));
    }

    #[test]
    fn speed_params_reject_non_finite() {
        let bad = SpeedViolationParams {
            speed_limit_km_h: f64::NAN,
            speed_limit_timeout: 10,
        };
        assert!(bad.validate().is_err());
        let good = SpeedViolationParams {
            speed_limit_km_h: 80.0,
            speed_limit_timeout: 10,
        };
        assert!(good.validate().is_ok());
        assert_eq!(good.timeout_ms().unwrap(), 10_000);
    }

    #[test]
    fn speed_timeout_must_fit_native_millis() {
        let edge = SpeedViolationParams {
            speed_limit_km_h: 80.0,
            speed_limit_timeout: SpeedViolationParams::MAX_TIMEOUT_SECS,
        };
        assert!(edge.validate().is_ok());
        assert!(edge.timeout_ms().unwrap() > 0);

        let huge = SpeedViolationParams {
            speed_limit_timeout: SpeedViolationParams::MAX_TIMEOUT_SECS + 1,
            ..edge
        };
        assert!(matches!(huge.validate(), Err(TelematicsError::InvalidArgument(_))));
        assert!(huge.timeout_ms().is_err());

        let max = SpeedViolationParams {
            speed_limit_timeout: u64::MAX,
            ..edge
        };
        assert!(max.validate().is_err());
        assert!(max.timeout_ms().is_err());
    }

    #[test]
    fn speed_violation_payload_uses_camel_case() {
        let event = TelematicsEvent::SpeedViolation(SpeedViolationEvent {
            date: 1_700_000_000,
            latitude: 1.0,
            longitude: 2.0,
            speed: 95.0,
            speed_limit: 80.0,
        });
        let body = event.payload();
        assert_eq!(body["speedLimit"], 80.0);
        assert_eq!(body["speed"], 95.0);
        assert_eq!(event.topic(), EventTopic::SpeedViolation);
    }

    #[test]
    fn sensitivity_ordinals() {
        assert_eq!(
            AccidentDetectionSensitivity::from_ordinal(2).unwrap(),
            AccidentDetectionSensitivity::Tough
        );
        assert!(AccidentDetectionSensitivity::from_ordinal(3).is_err());
    }
}
