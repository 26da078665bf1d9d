// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Static command catalog: every command's wire name, platform constraint, and
// input shape.  Arguments arrive as JSON (either an object keyed by field name
// or a positional array) and are validated here before anything reaches the
// native provider.

use serde_json::{Map, Value};

use crate::error::{Result, TelematicsError};
use crate::types::{
    AccidentDetectionSensitivity, ApiLanguage, AutoStartParams, PermissionWizardOptions,
    PlatformConstraint, SpeedViolationParams, TagRecord,
};

/// Every command the bridge exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Initialize,
    IsInitialized,
    GetDeviceId,
    SetDeviceId,
    Logout,
    IsAllRequiredPermissionsAndSensorsGranted,
    IsSdkEnabled,
    SetEnableSdk,
    IsTracking,
    StartManualTracking,
    StartManualPersistentTracking,
    StopManualTracking,
    UploadUnsentTrips,
    GetUnsentTripCount,
    SendCustomHeartbeats,
    ShowPermissionWizard,
    SetAccidentDetectionSensitivity,
    IsRtldEnabled,
    EnableAccidents,
    IsEnabledAccidents,
    RegisterSpeedViolations,
    AddFutureTrackTag,
    RemoveFutureTrackTag,
    RemoveAllFutureTrackTags,
    GetFutureTrackTags,
    // iOS only
    IsAggressiveHeartbeat,
    SetAggressiveHeartbeats,
    SetDisableTracking,
    IsDisableTracking,
    IsWrongAccuracyState,
    RequestLocationAlwaysPermission,
    RequestMotionPermission,
    GetApiLanguage,
    SetApiLanguage,
    // Android only
    SetAndroidAutoStartEnabled,
    IsAndroidAutoStartEnabled,
}

/// Type of a single input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    /// Non-empty string.
    Text,
    /// Any string, including empty.
    AnyText,
    /// Finite number.
    Number,
    /// Non-negative whole number.
    Count,
    /// Ordinal or variant name.
    Sensitivity,
    Language,
}

/// One named input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub optional: bool,
}

const fn req(name: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        kind,
        optional: false,
    }
}

const fn opt(name: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        kind,
        optional: true,
    }
}

const DEVICE_ID: &[Field] = &[req("deviceId", FieldKind::Text)];
const ENABLE: &[Field] = &[req("enable", FieldKind::Bool)];
const VALUE: &[Field] = &[req("value", FieldKind::Bool)];
const REASON: &[Field] = &[req("reason", FieldKind::AnyText)];
const WIZARD: &[Field] = &[
    req("enableAggressivePermissionsWizard", FieldKind::Bool),
    req("enableAggressivePermissionsWizardPage", FieldKind::Bool),
];
const SENSITIVITY: &[Field] = &[req("sensitivity", FieldKind::Sensitivity)];
const SPEED_VIOLATIONS: &[Field] = &[
    req("speedLimitKmH", FieldKind::Number),
    req("speedLimitTimeout", FieldKind::Count),
];
const TAG: &[Field] = &[req("tag", FieldKind::Text), opt("source", FieldKind::AnyText)];
const LANGUAGE: &[Field] = &[req("language", FieldKind::Language)];
const AUTO_START: &[Field] = &[
    req("enable", FieldKind::Bool),
    req("permanent", FieldKind::Bool),
];

/// Validated, typed command input.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandInput {
    None,
    DeviceId(String),
    Flag(bool),
    Reason(String),
    Wizard(PermissionWizardOptions),
    Sensitivity(AccidentDetectionSensitivity),
    SpeedViolations(SpeedViolationParams),
    Tag(TagRecord),
    Language(ApiLanguage),
    AutoStart(AutoStartParams),
}

impl Command {
    pub const ALL: [Command; 36] = [
        Self::Initialize,
        Self::IsInitialized,
        Self::GetDeviceId,
        Self::SetDeviceId,
        Self::Logout,
        Self::IsAllRequiredPermissionsAndSensorsGranted,
        Self::IsSdkEnabled,
        Self::SetEnableSdk,
        Self::IsTracking,
        Self::StartManualTracking,
        Self::StartManualPersistentTracking,
        Self::StopManualTracking,
        Self::UploadUnsentTrips,
        Self::GetUnsentTripCount,
        Self::SendCustomHeartbeats,
        Self::ShowPermissionWizard,
        Self::SetAccidentDetectionSensitivity,
        Self::IsRtldEnabled,
        Self::EnableAccidents,
        Self::IsEnabledAccidents,
        Self::RegisterSpeedViolations,
        Self::AddFutureTrackTag,
        Self::RemoveFutureTrackTag,
        Self::RemoveAllFutureTrackTags,
        Self::GetFutureTrackTags,
        Self::IsAggressiveHeartbeat,
        Self::SetAggressiveHeartbeats,
        Self::SetDisableTracking,
        Self::IsDisableTracking,
        Self::IsWrongAccuracyState,
        Self::RequestLocationAlwaysPermission,
        Self::RequestMotionPermission,
        Self::GetApiLanguage,
        Self::SetApiLanguage,
        Self::SetAndroidAutoStartEnabled,
        Self::IsAndroidAutoStartEnabled,
    ];

    /// Wire name used by the command contract.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::IsInitialized => "isInitialized",
            Self::GetDeviceId => "getDeviceId",
            Self::SetDeviceId => "setDeviceId",
            Self::Logout => "logout",
            Self::IsAllRequiredPermissionsAndSensorsGranted => {
                "isAllRequiredPermissionsAndSensorsGranted"
            }
            Self::IsSdkEnabled => "isSdkEnabled",
            Self::SetEnableSdk => "setEnableSdk",
            Self::IsTracking => "isTracking",
            Self::StartManualTracking => "startManualTracking",
            Self::StartManualPersistentTracking => "startManualPersistentTracking",
            Self::StopManualTracking => "stopManualTracking",
            Self::UploadUnsentTrips => "uploadUnsentTrips",
            Self::GetUnsentTripCount => "getUnsentTripCount",
            Self::SendCustomHeartbeats => "sendCustomHeartbeats",
            Self::ShowPermissionWizard => "showPermissionWizard",
            Self::SetAccidentDetectionSensitivity => "setAccidentDetectionSensitivity",
            Self::IsRtldEnabled => "isRTLDEnabled",
            Self::EnableAccidents => "enableAccidents",
            Self::IsEnabledAccidents => "isEnabledAccidents",
            Self::RegisterSpeedViolations => "registerSpeedViolations",
            Self::AddFutureTrackTag => "addFutureTrackTag",
            Self::RemoveFutureTrackTag => "removeFutureTrackTag",
            Self::RemoveAllFutureTrackTags => "removeAllFutureTrackTags",
            Self::GetFutureTrackTags => "getFutureTrackTags",
            Self::IsAggressiveHeartbeat => "isAggressiveHeartbeat",
            Self::SetAggressiveHeartbeats => "setAggressiveHeartbeats",
            Self::SetDisableTracking => "setDisableTracking",
            Self::IsDisableTracking => "isDisableTracking",
            Self::IsWrongAccuracyState => "isWrongAccuracyState",
            Self::RequestLocationAlwaysPermission => "requestIOSLocationAlwaysPermission",
            Self::RequestMotionPermission => "requestIOSMotionPermission",
            Self::GetApiLanguage => "getApiLanguage",
            Self::SetApiLanguage => "setApiLanguage",
            Self::SetAndroidAutoStartEnabled => "setAndroidAutoStartEnabled",
            Self::IsAndroidAutoStartEnabled => "isAndroidAutoStartEnabled",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| TelematicsError::UnknownCommand(name.to_string()))
    }

    pub fn constraint(&self) -> PlatformConstraint {
        match self {
            Self::IsAggressiveHeartbeat
            | Self::SetAggressiveHeartbeats
            | Self::SetDisableTracking
            | Self::IsDisableTracking
            | Self::IsWrongAccuracyState
            | Self::RequestLocationAlwaysPermission
            | Self::RequestMotionPermission
            | Self::GetApiLanguage
            | Self::SetApiLanguage => PlatformConstraint::IosOnly,
            Self::SetAndroidAutoStartEnabled | Self::IsAndroidAutoStartEnabled => {
                PlatformConstraint::AndroidOnly
            }
            _ => PlatformConstraint::Any,
        }
    }

    /// Whether the command changes provider state (resolves on acknowledgement).
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Self::Initialize
                | Self::SetDeviceId
                | Self::Logout
                | Self::SetEnableSdk
                | Self::StartManualTracking
                | Self::StartManualPersistentTracking
                | Self::StopManualTracking
                | Self::SetAccidentDetectionSensitivity
                | Self::EnableAccidents
                | Self::RegisterSpeedViolations
                | Self::SetAggressiveHeartbeats
                | Self::SetDisableTracking
                | Self::SetApiLanguage
                | Self::SetAndroidAutoStartEnabled
        )
    }

    /// Declared input fields, in positional order.
    pub fn input_shape(&self) -> &'static [Field] {
        match self {
            Self::SetDeviceId => DEVICE_ID,
            Self::SetEnableSdk | Self::EnableAccidents | Self::SetAggressiveHeartbeats => ENABLE,
            Self::SetDisableTracking => VALUE,
            Self::SendCustomHeartbeats => REASON,
            Self::ShowPermissionWizard => WIZARD,
            Self::SetAccidentDetectionSensitivity => SENSITIVITY,
            Self::RegisterSpeedViolations => SPEED_VIOLATIONS,
            Self::AddFutureTrackTag | Self::RemoveFutureTrackTag => TAG,
            Self::SetApiLanguage => LANGUAGE,
            Self::SetAndroidAutoStartEnabled => AUTO_START,
            _ => &[],
        }
    }

    /// Validate raw JSON arguments against the input shape.
    pub fn parse_input(&self, args: &Value) -> Result<CommandInput> {
        let fields = normalize_args(self, args)?;
        let get = |name: &str| fields.get(name).filter(|v| !v.is_null());

        let input = match self {
            Self::SetDeviceId => CommandInput::DeviceId(text(self, get("deviceId"), "deviceId")?),
            Self::SetEnableSdk | Self::EnableAccidents | Self::SetAggressiveHeartbeats => {
                CommandInput::Flag(boolean(self, get("enable"), "enable")?)
            }
            Self::SetDisableTracking => CommandInput::Flag(boolean(self, get("value"), "value")?),
            Self::SendCustomHeartbeats => {
                CommandInput::Reason(any_text(self, get("reason"), "reason")?)
            }
            Self::ShowPermissionWizard => CommandInput::Wizard(PermissionWizardOptions {
                enable_aggressive_permissions_wizard: boolean(
                    self,
                    get("enableAggressivePermissionsWizard"),
                    "enableAggressivePermissionsWizard",
                )?,
                enable_aggressive_permissions_wizard_page: boolean(
                    self,
                    get("enableAggressivePermissionsWizardPage"),
                    "enableAggressivePermissionsWizardPage",
                )?,
            }),
            Self::SetAccidentDetectionSensitivity => {
                CommandInput::Sensitivity(sensitivity(self, get("sensitivity"))?)
            }
            Self::RegisterSpeedViolations => {
                let params = SpeedViolationParams {
                    speed_limit_km_h: number(self, get("speedLimitKmH"), "speedLimitKmH")?,
                    speed_limit_timeout: count(
                        self,
                        get("speedLimitTimeout"),
                        "speedLimitTimeout",
                    )?,
                };
                params.validate()?;
                CommandInput::SpeedViolations(params)
            }
            Self::AddFutureTrackTag | Self::RemoveFutureTrackTag => {
                let tag = text(self, get("tag"), "tag")?;
                let source = get("source")
                    .map(|v| any_text(self, Some(v), "source"))
                    .transpose()?;
                CommandInput::Tag(TagRecord::new(tag, source))
            }
            Self::SetApiLanguage => {
                let name = text(self, get("language"), "language")?;
                CommandInput::Language(ApiLanguage::from_native_name(&name)?)
            }
            Self::SetAndroidAutoStartEnabled => CommandInput::AutoStart(AutoStartParams {
                enable: boolean(self, get("enable"), "enable")?,
                permanent: boolean(self, get("permanent"), "permanent")?,
            }),
            _ => CommandInput::None,
        };
        Ok(input)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Field extraction
// ---------------------------------------------------------------------------

/// Turn positional or keyed arguments into a keyed map.
fn normalize_args(cmd: &Command, args: &Value) -> Result<Map<String, Value>> {
    let shape = cmd.input_shape();
    match args {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map.clone()),
        Value::Array(items) => {
            if items.len() > shape.len() {
                return Err(TelematicsError::invalid(format!(
                    "{cmd} takes at most {} argument(s), got {}",
                    shape.len(),
                    items.len()
                )));
            }
            Ok(shape
                .iter()
                .zip(items)
                .map(|(field, value)| (field.name.to_string(), value.clone()))
                .collect())
        }
        // A lone scalar is accepted for single-field commands.
        scalar if shape.len() == 1 => {
            let mut map = Map::new();
            map.insert(shape[0].name.to_string(), scalar.clone());
            Ok(map)
        }
        other => Err(TelematicsError::invalid(format!(
            "{cmd} expects an object or array of arguments, got {other}"
        ))),
    }
}

fn missing(cmd: &Command, field: &str) -> TelematicsError {
    TelematicsError::invalid(format!("{cmd}: missing '{field}'"))
}

fn wrong_type(cmd: &Command, field: &str, expected: &str) -> TelematicsError {
    TelematicsError::invalid(format!("{cmd}: '{field}' must be {expected}"))
}

fn boolean(cmd: &Command, v: Option<&Value>, field: &str) -> Result<bool> {
    v.ok_or_else(|| missing(cmd, field))?
        .as_bool()
        .ok_or_else(|| wrong_type(cmd, field, "a boolean"))
}

fn any_text(cmd: &Command, v: Option<&Value>, field: &str) -> Result<String> {
    v.ok_or_else(|| missing(cmd, field))?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| wrong_type(cmd, field, "a string"))
}

fn text(cmd: &Command, v: Option<&Value>, field: &str) -> Result<String> {
    let s = any_text(cmd, v, field)?;
    if s.trim().is_empty() {
        return Err(TelematicsError::invalid(format!("{cmd}: '{field}' must not be empty")));
    }
    Ok(s)
}

fn number(cmd: &Command, v: Option<&Value>, field: &str) -> Result<f64> {
    let n = v
        .ok_or_else(|| missing(cmd, field))?
        .as_f64()
        .ok_or_else(|| wrong_type(cmd, field, "a number"))?;
    if !n.is_finite() {
        return Err(wrong_type(cmd, field, "finite"));
    }
    Ok(n)
}

fn count(cmd: &Command, v: Option<&Value>, field: &str) -> Result<u64> {
    let v = v.ok_or_else(|| missing(cmd, field))?;
    if let Some(n) = v.as_u64() {
        return Ok(n);
    }
    // Whole floats (e.g. 10.0 from a JS number) are accepted.
    match v.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => {
            if f >= u64::MAX as f64 {
                return Err(TelematicsError::invalid(format!("{cmd}: '{field}' is out of range")));
            }
            Ok(f as u64)
        }
        _ => Err(wrong_type(cmd, field, "a non-negative whole number")),
    }
}

fn sensitivity(cmd: &Command, v: Option<&Value>) -> Result<AccidentDetectionSensitivity> {
    match v.ok_or_else(|| missing(cmd, "sensitivity"))? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| wrong_type(cmd, "sensitivity", "0, 1 or 2"))
            .and_then(AccidentDetectionSensitivity::from_ordinal),
        Value::String(s) => match s.as_str() {
            "Normal" => Ok(AccidentDetectionSensitivity::Normal),
            "Sensitive" => Ok(AccidentDetectionSensitivity::Sensitive),
            "Tough" => Ok(AccidentDetectionSensitivity::Tough),
            _ => Err(wrong_type(cmd, "sensitivity", "Normal, Sensitive or Tough")),
        },
        _ => Err(wrong_type(cmd, "sensitivity", "a number or name")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_name_resolves_back() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_name(cmd.name()).unwrap(), cmd);
        }
        assert!(matches!(
            Command::from_name("selfDestruct"),
            Err(TelematicsError::UnknownCommand(_))
        ));
    }

    #[test]
    fn gated_commands() {
        assert_eq!(Command::GetApiLanguage.constraint(), PlatformConstraint::IosOnly);
        assert_eq!(
            Command::IsAndroidAutoStartEnabled.constraint(),
            PlatformConstraint::AndroidOnly
        );
        assert_eq!(Command::AddFutureTrackTag.constraint(), PlatformConstraint::Any);
    }

    #[test]
    fn empty_device_id_is_rejected() {
        let err = Command::SetDeviceId.parse_input(&json!({"deviceId": ""})).unwrap_err();
        assert!(matches!(err, TelematicsError::InvalidArgument(_)));
        let err = Command::SetDeviceId.parse_input(&json!({})).unwrap_err();
        assert!(err.to_string().contains("missing 'deviceId'"));
    }

    #[test]
    fn positional_and_keyed_args_agree() {
        let keyed = Command::AddFutureTrackTag
            .parse_input(&json!({"tag": "T1", "source": "S1"}))
            .unwrap();
        let positional = Command::AddFutureTrackTag
            .parse_input(&json!(["T1", "S1"]))
            .unwrap();
        assert_eq!(keyed, positional);
        assert_eq!(
            keyed,
            CommandInput::Tag(TagRecord::new("T1", Some("S1".into())))
        );
    }

    #[test]
    fn null_source_is_absent() {
        let input = Command::RemoveFutureTrackTag
            .parse_input(&json!({"tag": "T1", "source": null}))
            .unwrap();
        assert_eq!(input, CommandInput::Tag(TagRecord::new("T1", None)));
    }

    #[test]
    fn speed_violation_args() {
        let input = Command::RegisterSpeedViolations
            .parse_input(&json!({"speedLimitKmH": 80, "speedLimitTimeout": 10.0}))
            .unwrap();
        assert_eq!(
            input,
            CommandInput::SpeedViolations(SpeedViolationParams {
                speed_limit_km_h: 80.0,
                speed_limit_timeout: 10,
            })
        );
        assert!(
            Command::RegisterSpeedViolations
                .parse_input(&json!({"speedLimitKmH": -5, "speedLimitTimeout": 10}))
                .is_err()
        );
        assert!(
            Command::RegisterSpeedViolations
                .parse_input(&json!({"speedLimitKmH": 80, "speedLimitTimeout": 1.5}))
                .is_err()
        );
    }

    #[test]
    fn oversized_speed_timeout_is_rejected() {
        let too_long = SpeedViolationParams::MAX_TIMEOUT_SECS + 1;
        for timeout in [json!(1e300), json!(u64::MAX), json!(too_long)] {
            let err = Command::RegisterSpeedViolations
                .parse_input(&json!({"speedLimitKmH": 80, "speedLimitTimeout": timeout}))
                .unwrap_err();
            assert!(matches!(err, TelematicsError::InvalidArgument(_)), "{timeout}: {err}");
        }
        let input = Command::RegisterSpeedViolations
            .parse_input(&json!({
                "speedLimitKmH": 80,
                "speedLimitTimeout": SpeedViolationParams::MAX_TIMEOUT_SECS
            }))
            .unwrap();
        let CommandInput::SpeedViolations(params) = input else {
            panic!("expected speed violation params");
        };
        assert_eq!(
            params.timeout_ms().unwrap(),
            SpeedViolationParams::MAX_TIMEOUT_SECS as i64 * 1000
        );
    }

    #[test]
    fn scalar_for_single_field() {
        let input = Command::SetEnableSdk.parse_input(&json!(true)).unwrap();
        assert_eq!(input, CommandInput::Flag(true));
        assert!(Command::SetEnableSdk.parse_input(&json!("yes")).is_err());
    }

    #[test]
    fn sensitivity_by_ordinal_or_name() {
        assert_eq!(
            Command::SetAccidentDetectionSensitivity
                .parse_input(&json!([1]))
                .unwrap(),
            CommandInput::Sensitivity(AccidentDetectionSensitivity::Sensitive)
        );
        assert_eq!(
            Command::SetAccidentDetectionSensitivity
                .parse_input(&json!({"sensitivity": "Tough"}))
                .unwrap(),
            CommandInput::Sensitivity(AccidentDetectionSensitivity::Tough)
        );
        assert!(
            Command::SetAccidentDetectionSensitivity
                .parse_input(&json!({"sensitivity": 7}))
                .is_err()
        );
    }

    #[test]
    fn too_many_positional_args() {
        assert!(Command::SetEnableSdk.parse_input(&json!([true, false])).is_err());
    }
}
