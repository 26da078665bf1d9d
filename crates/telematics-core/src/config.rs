// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TelematicsError};
use crate::types::Platform;

/// How long the SDK waits without movement before ending a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopTrackingTime {
    Default,
    High,
}

/// Location accuracy requested from the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationAccuracy {
    Default,
    High,
}

/// Settings handed to the native SDK at initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    pub stop_tracking_time: StopTrackingTime,
    pub accuracy: LocationAccuracy,
    /// Start tracking automatically when driving is detected.
    pub auto_start_on: bool,
    /// High-frequency sensor sampling.
    pub high_frequency: bool,
    /// ELM (OBD dongle) integration.
    pub elm_on: bool,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            stop_tracking_time: StopTrackingTime::High,
            accuracy: LocationAccuracy::High,
            auto_start_on: true,
            high_frequency: true,
            elm_on: false,
        }
    }
}

/// Persistent bridge settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Pretend to run on this platform instead of the compile target.
    pub platform_override: Option<Platform>,
    /// Settings passed to the SDK on `initialize`.
    pub tracking: TrackingSettings,
}

impl BridgeConfig {
    /// Platform the gate should check against.
    pub fn platform(&self) -> Platform {
        self.platform_override.unwrap_or_else(Platform::current)
    }

    /// Read configuration from a JSON file.
    ///
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data).map_err(|e| {
            warn!(path = %path.display(), error = %e, "config file is malformed");
            TelematicsError::Config(format!("{}: {e}", path.display()))
        })
    }

    /// Write configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_native_initialisation() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.tracking.stop_tracking_time, StopTrackingTime::High);
        assert!(cfg.tracking.auto_start_on);
        assert!(!cfg.tracking.elm_on);
        assert_eq!(cfg.platform(), Platform::current());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bridge.json");
        let cfg = BridgeConfig {
            platform_override: Some(Platform::Android),
            ..Default::default()
        };
        cfg.save(&path).expect("save");
        let loaded = BridgeConfig::load(&path).expect("load");
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.platform(), Platform::Android);
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = BridgeConfig::load(dir.path().join("absent.json")).expect("load");
        assert_eq!(loaded, BridgeConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bridge.json");
        std::fs::write(&path, r#"{"platform_override":"ios"}"#).expect("write");
        let loaded = BridgeConfig::load(&path).expect("load");
        assert_eq!(loaded.platform(), Platform::Ios);
        assert_eq!(loaded.tracking, TrackingSettings::default());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bridge.json");
        std::fs::write(&path, "{not json").expect("write");
        assert!(matches!(
            BridgeConfig::load(&path),
            Err(TelematicsError::Config(_))
        ));
    }
}
