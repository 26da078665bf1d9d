// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the telematics bridge.

use thiserror::Error;

use crate::types::{Platform, TagSlot};

/// Top-level error type for all bridge operations.
#[derive(Debug, Error)]
pub enum TelematicsError {
    // -- Caller errors (raised before the provider is touched) --
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{capability} is only available on {required}")]
    UnsupportedPlatform {
        capability: String,
        required: Platform,
    },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("unknown event topic: {0}")]
    UnknownTopic(String),

    #[error("a {slot} request is already in flight")]
    OperationPending { slot: TagSlot },

    // -- Provider errors --
    #[error("provider error: {0}")]
    Provider(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Native glue / environment --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("no async runtime available to drive event delivery")]
    NoRuntime,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-supplied input failed validation.
    InvalidArgument,
    /// Gated command or topic on the wrong platform. Retrying elsewhere may help.
    UnsupportedPlatform,
    /// The native provider reported a failure.
    ProviderError,
    /// A request of the same kind is still outstanding.
    Busy,
    /// Bridge-side failure unrelated to the provider's answer.
    Internal,
}

impl TelematicsError {
    /// Classify this error for caller-side control flow.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::UnknownCommand(_) | Self::UnknownTopic(_) => {
                ErrorKind::InvalidArgument
            }
            Self::Serialization(_) => ErrorKind::InvalidArgument,
            Self::UnsupportedPlatform { .. } => ErrorKind::UnsupportedPlatform,
            Self::Provider(_) | Self::PlatformUnavailable => ErrorKind::ProviderError,
            Self::OperationPending { .. } => ErrorKind::Busy,
            Self::Bridge(_) | Self::NoRuntime | Self::Config(_) | Self::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Stable rejection code exposed through the command contract.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidArgument => "INVALID_PARAMS",
            ErrorKind::UnsupportedPlatform => "UNSUPPORTED_PLATFORM",
            ErrorKind::ProviderError => "PROVIDER_ERROR",
            ErrorKind::Busy => "OPERATION_PENDING",
            ErrorKind::Internal => "BRIDGE_ERROR",
        }
    }

    /// Shorthand used by argument validation.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TelematicsError>;
