// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Telematics bridge core: types, command catalog, and error definitions
// shared across all crates.

pub mod command;
pub mod config;
pub mod error;
pub mod types;

pub use command::{Command, CommandInput};
pub use config::BridgeConfig;
pub use error::TelematicsError;
pub use types::*;
