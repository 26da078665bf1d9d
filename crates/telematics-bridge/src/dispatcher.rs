// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command dispatch: hands the provider a one-shot completion and turns
// whatever shape the native answer takes into a single `Result`.
//
// No timeout is applied; the permission wizard, for one, waits on the user.

use tokio::sync::oneshot;
use tracing::{debug, warn};

use telematics_core::command::Command;
use telematics_core::error::{Result, TelematicsError};
use telematics_provider::traits::{Completion, NativeReply};

/// Fold a native reply into a result. An error message always wins over a
/// value reported alongside it.
pub fn normalize<T>(command: Command, reply: NativeReply<T>) -> Result<T> {
    match reply {
        NativeReply::Value(value) => Ok(value),
        NativeReply::Checked {
            error: Some(message),
            ..
        } => Err(TelematicsError::Provider(message)),
        NativeReply::Checked {
            value: Some(value),
            error: None,
        } => Ok(value),
        NativeReply::Checked {
            value: None,
            error: None,
        } => Err(TelematicsError::Provider(format!(
            "{command}: provider answered with neither value nor error"
        ))),
        NativeReply::Failed(error) => Err(error),
    }
}

/// Invoke the provider through `issue` and wait for its completion.
///
/// The completion is consumed on first use, so the caller sees exactly one
/// outcome. A completion the provider drops unanswered rejects the call.
pub async fn call<T: Send + 'static>(
    command: Command,
    issue: impl FnOnce(Completion<T>),
) -> Result<T> {
    let (tx, rx) = oneshot::channel::<NativeReply<T>>();
    issue(Completion::new(move |reply| {
        if tx.send(reply).is_err() {
            debug!(%command, "answer arrived after the caller stopped waiting");
        }
    }));

    let result = match rx.await {
        Ok(reply) => normalize(command, reply),
        Err(_) => Err(TelematicsError::Provider(format!(
            "{command}: provider dropped the completion without answering"
        ))),
    };
    if let Err(e) = &result {
        warn!(%command, error = %e, "command rejected");
    }
    result
}
