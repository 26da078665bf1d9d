// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-occupancy correlation slot.
//
// A slot holds at most one outstanding request.  Whoever answers first takes
// the request out of the slot, so a second answer finds it empty and is
// dropped.  Opening an occupied slot is refused and leaves the occupant alone.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use telematics_core::error::{Result, TelematicsError};
use telematics_core::types::TagSlot;

/// One outstanding request.
///
/// `context` is whatever the answering side needs from the original call
/// (for tag operations, the record to echo back).
#[derive(Debug)]
pub struct PendingRequest<C, T> {
    pub slot: TagSlot,
    pub context: C,
    pub created_at: DateTime<Utc>,
    resolver: oneshot::Sender<Result<T>>,
}

/// A correlation slot holding at most one [`PendingRequest`].
#[derive(Debug)]
pub struct PendingSlot<C, T> {
    slot: TagSlot,
    request: Mutex<Option<PendingRequest<C, T>>>,
}

impl<C, T> PendingSlot<C, T> {
    pub fn new(slot: TagSlot) -> Self {
        Self {
            slot,
            request: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingRequest<C, T>>> {
        self.request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the slot. Fails with `OperationPending` while it is occupied.
    pub fn open(&self, context: C) -> Result<oneshot::Receiver<Result<T>>> {
        let mut request = self.lock();
        if let Some(outstanding) = request.as_ref() {
            debug!(
                slot = %self.slot,
                since = %outstanding.created_at,
                "slot busy, request refused"
            );
            return Err(TelematicsError::OperationPending { slot: self.slot });
        }
        let (resolver, rx) = oneshot::channel();
        *request = Some(PendingRequest {
            slot: self.slot,
            context,
            created_at: Utc::now(),
            resolver,
        });
        Ok(rx)
    }

    /// Resolve the outstanding request with whatever `answer` builds from its
    /// context. Returns `false` when the slot was empty (late or duplicate
    /// answer); `answer` is not called then.
    pub fn complete(&self, answer: impl FnOnce(C) -> Result<T>) -> bool {
        let Some(request) = self.lock().take() else {
            warn!(slot = %self.slot, "answer without an outstanding request, dropped");
            return false;
        };
        let elapsed = Utc::now() - request.created_at;
        if request.resolver.send(answer(request.context)).is_err() {
            debug!(slot = %self.slot, "caller stopped waiting before the answer arrived");
        } else {
            debug!(
                slot = %self.slot,
                elapsed_ms = elapsed.num_milliseconds(),
                "slot resolved"
            );
        }
        true
    }

    /// Release the slot without answering (the provider refused the request
    /// synchronously, so no answer will ever come).
    pub fn abandon(&self) {
        if self.lock().take().is_some() {
            debug!(slot = %self.slot, "slot released");
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// When the outstanding request was opened, if any.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.lock().as_ref().map(|r| r.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_open_is_refused_and_first_survives() {
        let slot: PendingSlot<&str, u32> = PendingSlot::new(TagSlot::List);
        let rx = slot.open("first").unwrap();
        let err = slot.open("second").unwrap_err();
        assert!(matches!(
            err,
            TelematicsError::OperationPending {
                slot: TagSlot::List
            }
        ));

        assert!(slot.complete(|ctx| {
            assert_eq!(ctx, "first");
            Ok(7)
        }));
        assert_eq!(rx.await.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn duplicate_answers_resolve_once() {
        let slot: PendingSlot<(), &str> = PendingSlot::new(TagSlot::Add);
        let rx = slot.open(()).unwrap();
        assert!(slot.complete(|_| Ok("one")));
        assert!(!slot.complete(|_| Ok("two")));
        assert_eq!(rx.await.unwrap().unwrap(), "one");
        assert!(!slot.is_pending());
    }

    #[test]
    fn abandoned_slot_can_be_reopened() {
        let slot: PendingSlot<(), ()> = PendingSlot::new(TagSlot::Remove);
        let _rx = slot.open(()).unwrap();
        assert!(slot.opened_at().is_some());
        slot.abandon();
        assert!(!slot.is_pending());
        assert!(slot.open(()).is_ok());
    }

    #[test]
    fn answer_after_caller_left_still_frees_the_slot() {
        let slot: PendingSlot<(), ()> = PendingSlot::new(TagSlot::RemoveAll);
        drop(slot.open(()).unwrap());
        assert!(slot.complete(|_| Ok(())));
        assert!(!slot.is_pending());
    }
}
