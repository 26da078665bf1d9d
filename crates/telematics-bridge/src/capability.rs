// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capability registry.
//
// Answers "is this command / topic usable here?" from the static catalog's
// platform constraints and the platform the bridge runs on.  Flags are derived
// per query; nothing is cached.

use serde::Serialize;

use telematics_core::command::Command;
use telematics_core::types::{EventTopic, Platform, PlatformConstraint};

/// Availability of one named capability on the current platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityFlag {
    pub name: &'static str,
    pub current_platform: Platform,
    pub constraint: PlatformConstraint,
    pub available: bool,
}

/// Platform-capability lookups for one bridge instance.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityRegistry {
    platform: Platform,
}

impl CapabilityRegistry {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn allows(&self, constraint: PlatformConstraint) -> bool {
        constraint.allows(self.platform)
    }

    pub fn command_available(&self, command: Command) -> bool {
        self.allows(command.constraint())
    }

    pub fn topic_available(&self, topic: EventTopic) -> bool {
        self.allows(topic.constraint())
    }

    /// Whether tag removal can be narrowed to one source.
    ///
    /// The Android SDK removes by tag name alone, dropping every source.
    pub fn tag_removal_by_source(&self) -> bool {
        self.platform != Platform::Android
    }

    pub fn command_flag(&self, command: Command) -> CapabilityFlag {
        self.flag(command.name(), command.constraint())
    }

    pub fn topic_flag(&self, topic: EventTopic) -> CapabilityFlag {
        self.flag(topic.name(), topic.constraint())
    }

    fn flag(&self, name: &'static str, constraint: PlatformConstraint) -> CapabilityFlag {
        CapabilityFlag {
            name,
            current_platform: self.platform,
            constraint,
            available: self.allows(constraint),
        }
    }

    /// Commands callable on this platform, in catalog order.
    pub fn available_commands(&self) -> Vec<Command> {
        Command::ALL
            .into_iter()
            .filter(|c| self.command_available(*c))
            .collect()
    }

    /// Topics subscribable on this platform.
    pub fn available_topics(&self) -> Vec<EventTopic> {
        EventTopic::ALL
            .into_iter()
            .filter(|t| self.topic_available(*t))
            .collect()
    }

    /// Every command and topic with its availability.
    pub fn report(&self) -> Vec<CapabilityFlag> {
        Command::ALL
            .into_iter()
            .map(|c| self.command_flag(c))
            .chain(EventTopic::ALL.into_iter().map(|t| self.topic_flag(t)))
            .collect()
    }
}
