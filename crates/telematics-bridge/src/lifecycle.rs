// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge-side view of the SDK lifecycle.
//
// Updated only from outcomes the provider confirmed (successful commands,
// query answers, tracking-state events).  The bridge never refuses a command
// because of this state; it is an observation, not a guard.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::debug;

use telematics_core::command::Command;
use telematics_core::types::{SdkState, TelematicsEvent, TrackingMode};

#[derive(Debug, Default)]
pub struct Lifecycle {
    state: RwLock<SdkState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SdkState> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SdkState> {
        self.state.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn snapshot(&self) -> SdkState {
        self.read().clone()
    }

    fn update(&self, reason: &str, apply: impl FnOnce(&mut SdkState)) {
        let mut state = self.write();
        let before = state.clone();
        apply(&mut state);
        if *state != before {
            state.updated_at = Utc::now();
            debug!(
                reason,
                initialized = state.initialized,
                enabled = state.enabled,
                tracking = ?state.tracking,
                "SDK state changed"
            );
        }
    }

    /// A command without a flag argument succeeded.
    pub fn confirmed(&self, command: Command) {
        self.update(command.name(), |s| match command {
            Command::Initialize => s.initialized = true,
            Command::Logout => {
                s.enabled = false;
                s.tracking = TrackingMode::Idle;
            }
            Command::StartManualTracking => s.tracking = TrackingMode::Tracking,
            Command::StartManualPersistentTracking => {
                s.tracking = TrackingMode::PersistentTracking
            }
            Command::StopManualTracking => s.tracking = TrackingMode::Idle,
            _ => {}
        });
    }

    /// `setEnableSdk(enable)` succeeded.
    pub fn sdk_enabled(&self, enable: bool) {
        self.update("setEnableSdk", |s| {
            s.enabled = enable;
            if !enable {
                s.tracking = TrackingMode::Idle;
            }
        });
    }

    /// A boolean query came back from the provider.
    pub fn observed(&self, command: Command, value: bool) {
        self.update(command.name(), |s| match command {
            // Initialisation is one-way.
            Command::IsInitialized if value => s.initialized = true,
            Command::IsSdkEnabled => s.enabled = value,
            Command::IsTracking => match (value, s.tracking) {
                (false, _) => s.tracking = TrackingMode::Idle,
                (true, TrackingMode::Idle) => s.tracking = TrackingMode::Tracking,
                (true, _) => {}
            },
            _ => {}
        });
    }

    /// Events that carry lifecycle information.
    pub fn observe_event(&self, event: &TelematicsEvent) {
        if let TelematicsEvent::TrackingStateChanged(tracking) = event {
            self.observed(Command::IsTracking, *tracking);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized_and_idle() {
        let state = Lifecycle::new().snapshot();
        assert!(!state.initialized);
        assert!(!state.enabled);
        assert_eq!(state.tracking, TrackingMode::Idle);
    }

    #[test]
    fn initialization_is_one_way() {
        let lc = Lifecycle::new();
        lc.confirmed(Command::Initialize);
        lc.observed(Command::IsInitialized, false);
        assert!(lc.snapshot().initialized);
    }

    #[test]
    fn persistent_tracking_survives_a_positive_tracking_query() {
        let lc = Lifecycle::new();
        lc.confirmed(Command::StartManualPersistentTracking);
        lc.observe_event(&TelematicsEvent::TrackingStateChanged(true));
        assert_eq!(lc.snapshot().tracking, TrackingMode::PersistentTracking);
        lc.observe_event(&TelematicsEvent::TrackingStateChanged(false));
        assert_eq!(lc.snapshot().tracking, TrackingMode::Idle);
    }

    #[test]
    fn disabling_stops_tracking() {
        let lc = Lifecycle::new();
        lc.sdk_enabled(true);
        lc.confirmed(Command::StartManualTracking);
        lc.sdk_enabled(false);
        let state = lc.snapshot();
        assert!(!state.enabled);
        assert_eq!(state.tracking, TrackingMode::Idle);
    }

    #[test]
    fn unchanged_state_keeps_its_timestamp() {
        let lc = Lifecycle::new();
        let before = lc.snapshot().updated_at;
        lc.observed(Command::IsSdkEnabled, false);
        assert_eq!(lc.snapshot().updated_at, before);
    }
}
