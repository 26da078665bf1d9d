// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform gate: the first step of every gated command and subscription.
// A rejection happens before the provider is touched.

use tracing::debug;

use telematics_core::command::Command;
use telematics_core::error::{Result, TelematicsError};
use telematics_core::types::{EventTopic, Platform, PlatformConstraint};

use crate::capability::CapabilityRegistry;

#[derive(Debug, Clone, Copy)]
pub struct PlatformGate {
    registry: CapabilityRegistry,
}

impl PlatformGate {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self { registry }
    }

    pub fn platform(&self) -> Platform {
        self.registry.platform()
    }

    /// Fail with `UnsupportedPlatform` unless `constraint` admits the
    /// running platform.
    pub fn guard(&self, capability: &str, constraint: PlatformConstraint) -> Result<()> {
        if self.registry.allows(constraint) {
            return Ok(());
        }
        let required = constraint.required_platform().unwrap_or(Platform::Other);
        debug!(
            capability,
            %required,
            current = %self.registry.platform(),
            "gate rejected capability"
        );
        Err(TelematicsError::UnsupportedPlatform {
            capability: capability.to_string(),
            required,
        })
    }

    pub fn command(&self, command: Command) -> Result<()> {
        self.guard(command.name(), command.constraint())
    }

    pub fn topic(&self, topic: EventTopic) -> Result<()> {
        self.guard(topic.name(), topic.constraint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telematics_core::error::ErrorKind;

    fn gate(platform: Platform) -> PlatformGate {
        PlatformGate::new(CapabilityRegistry::new(platform))
    }

    #[test]
    fn ios_command_on_android_names_ios() {
        let err = gate(Platform::Android)
            .command(Command::SetApiLanguage)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
        match err {
            TelematicsError::UnsupportedPlatform {
                capability,
                required,
            } => {
                assert_eq!(capability, "setApiLanguage");
                assert_eq!(required, Platform::Ios);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn android_command_on_ios_is_rejected() {
        assert!(
            gate(Platform::Ios)
                .command(Command::SetAndroidAutoStartEnabled)
                .is_err()
        );
    }

    #[test]
    fn shared_commands_pass_everywhere() {
        for platform in [Platform::Ios, Platform::Android, Platform::Other] {
            assert!(gate(platform).command(Command::GetFutureTrackTags).is_ok());
            assert!(gate(platform).topic(EventTopic::LocationChanged).is_ok());
        }
    }

    #[test]
    fn ios_topics_are_gated() {
        let err = gate(Platform::Android)
            .topic(EventTopic::RtldCollected)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "onRtldColectedData is only available on iOS"
        );
    }
}
