// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Future-track tag correlator.
//
// Tag operations answer through a delegate, not a per-call completion, so
// each operation kind gets one slot and the delegate callback completes
// whichever request occupies it.  The correlator is itself the delegate the
// provider is given.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use telematics_core::error::{Result, TelematicsError};
use telematics_core::types::{
    TagListResult, TagOperationResult, TagRecord, TagSlot, TagStatus,
};
use telematics_provider::traits::{FutureTrackTags, TagDelegate};

use crate::pending::PendingSlot;

/// Routes tag delegate callbacks to the waiting callers.
#[derive(Debug)]
pub struct TagCorrelator {
    add: PendingSlot<TagRecord, TagOperationResult>,
    remove: PendingSlot<TagRecord, TagOperationResult>,
    remove_all: PendingSlot<(), TagStatus>,
    list: PendingSlot<(), TagListResult>,
}

impl Default for TagCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl TagCorrelator {
    pub fn new() -> Self {
        Self {
            add: PendingSlot::new(TagSlot::Add),
            remove: PendingSlot::new(TagSlot::Remove),
            remove_all: PendingSlot::new(TagSlot::RemoveAll),
            list: PendingSlot::new(TagSlot::List),
        }
    }

    /// Whether a request is outstanding in `slot`.
    pub fn is_pending(&self, slot: TagSlot) -> bool {
        match slot {
            TagSlot::Add => self.add.is_pending(),
            TagSlot::Remove => self.remove.is_pending(),
            TagSlot::RemoveAll => self.remove_all.is_pending(),
            TagSlot::List => self.list.is_pending(),
        }
    }

    #[instrument(skip(self, provider), fields(tag = %record.tag))]
    pub async fn add<P: FutureTrackTags + ?Sized>(
        &self,
        provider: &P,
        record: TagRecord,
    ) -> Result<TagOperationResult> {
        let rx = self.add.open(record.clone())?;
        if let Err(e) = provider.add_future_track_tag(&record) {
            self.add.abandon();
            return Err(e);
        }
        await_slot(TagSlot::Add, rx).await
    }

    #[instrument(skip(self, provider), fields(tag = %record.tag))]
    pub async fn remove<P: FutureTrackTags + ?Sized>(
        &self,
        provider: &P,
        record: TagRecord,
    ) -> Result<TagOperationResult> {
        let rx = self.remove.open(record.clone())?;
        if let Err(e) = provider.remove_future_track_tag(&record.tag, record.source.as_deref()) {
            self.remove.abandon();
            return Err(e);
        }
        await_slot(TagSlot::Remove, rx).await
    }

    #[instrument(skip_all)]
    pub async fn remove_all<P: FutureTrackTags + ?Sized>(&self, provider: &P) -> Result<TagStatus> {
        let rx = self.remove_all.open(())?;
        if let Err(e) = provider.remove_all_future_track_tags() {
            self.remove_all.abandon();
            return Err(e);
        }
        await_slot(TagSlot::RemoveAll, rx).await
    }

    #[instrument(skip_all)]
    pub async fn list<P: FutureTrackTags + ?Sized>(&self, provider: &P) -> Result<TagListResult> {
        let rx = self.list.open(())?;
        if let Err(e) = provider.get_future_track_tags() {
            self.list.abandon();
            return Err(e);
        }
        await_slot(TagSlot::List, rx).await
    }
}

async fn await_slot<T>(
    slot: TagSlot,
    rx: tokio::sync::oneshot::Receiver<Result<T>>,
) -> Result<T> {
    // The sender only disappears unanswered if the correlator itself is gone.
    rx.await
        .map_err(|_| TelematicsError::Bridge(format!("{slot} request dropped by the bridge")))?
}

impl TagDelegate for TagCorrelator {
    fn on_tag_added(&self, status: TagStatus, tag: Option<TagRecord>, timestamp: i64) {
        debug!(%status, timestamp, "tag added callback");
        self.add.complete(|input| {
            Ok(TagOperationResult {
                status,
                tag: tag.unwrap_or(input),
            })
        });
    }

    fn on_tag_removed(&self, status: TagStatus, tag: Option<TagRecord>, timestamp: i64) {
        debug!(%status, timestamp, "tag removed callback");
        self.remove.complete(|input| {
            Ok(TagOperationResult {
                status,
                tag: tag.unwrap_or(input),
            })
        });
    }

    fn on_all_tags_removed(&self, status: TagStatus, timestamp: i64) {
        debug!(%status, timestamp, "all tags removed callback");
        self.remove_all.complete(|()| Ok(status));
    }

    fn on_tags_listed(&self, status: TagStatus, tags: Vec<TagRecord>, timestamp: i64) {
        debug!(%status, count = tags.len(), timestamp, "tags listed callback");
        self.list.complete(|()| Ok(TagListResult { status, tags }));
    }

    fn on_tag_error(&self, slot: TagSlot, message: String) {
        info!(%slot, %message, "tag operation failed in the SDK");
        let error = || TelematicsError::Provider(message.clone());
        match slot {
            TagSlot::Add => self.add.complete(|_| Err(error())),
            TagSlot::Remove => self.remove.complete(|_| Err(error())),
            TagSlot::RemoveAll => self.remove_all.complete(|_| Err(error())),
            TagSlot::List => self.list.complete(|_| Err(error())),
        };
    }
}

/// Install `correlator` as the provider's tag delegate.
pub fn install<P: FutureTrackTags + ?Sized>(provider: &P, correlator: &Arc<TagCorrelator>) {
    provider.set_tag_delegate(correlator.clone());
}
