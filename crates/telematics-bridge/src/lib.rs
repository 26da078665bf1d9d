// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Telematics bridge: turns the callback-shaped native SDK surface exposed by
// `telematics-provider` into async commands and multiplexed event topics.
//
// Control flow for a command: gate -> argument validation -> provider call ->
// completion normalised by the dispatcher (or the tag correlator for tag
// operations).  Events flow provider -> channel sink -> pump task -> handlers.

pub mod bridge;
pub mod capability;
pub mod dispatcher;
pub mod events;
pub mod gate;
pub mod lifecycle;
pub mod pending;
pub mod tags;

pub use bridge::TelematicsBridge;
pub use capability::CapabilityRegistry;
pub use events::{EventMultiplexer, Subscription};
pub use gate::PlatformGate;
