// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process-wide landing point for native callbacks.
//
// JNI entry points and Objective-C delegate methods are free functions with no
// way to carry a Rust receiver, so the native providers park their delegate,
// sinks, and outstanding wizard completion here.  The router itself is plain
// Rust and is exercised on every target.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing::{debug, warn};

use telematics_core::error::TelematicsError;
use telematics_core::types::{EventTopic, TagRecord, TagSlot, TagStatus, TelematicsEvent};

use crate::traits::{Completion, EventSink, TagDelegate};

/// Routes native callbacks to whoever registered for them.
#[derive(Default)]
pub struct CallbackRouter {
    tag_delegate: Mutex<Option<Arc<dyn TagDelegate>>>,
    sinks: Mutex<HashMap<EventTopic, Arc<dyn EventSink>>>,
    wizard: Mutex<Option<Completion<bool>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The router shared by native entry points.
pub fn global() -> &'static CallbackRouter {
    static ROUTER: OnceLock<CallbackRouter> = OnceLock::new();
    ROUTER.get_or_init(CallbackRouter::default)
}

impl CallbackRouter {
    pub fn set_tag_delegate(&self, delegate: Arc<dyn TagDelegate>) {
        *lock(&self.tag_delegate) = Some(delegate);
    }

    pub fn set_sink(&self, topic: EventTopic, sink: Arc<dyn EventSink>) {
        lock(&self.sinks).insert(topic, sink);
    }

    pub fn clear_sink(&self, topic: EventTopic) {
        lock(&self.sinks).remove(&topic);
    }

    pub fn has_sink(&self, topic: EventTopic) -> bool {
        lock(&self.sinks).contains_key(&topic)
    }

    /// Forward a pushed event. Events for unregistered topics are dropped.
    pub fn deliver_event(&self, event: TelematicsEvent) {
        let topic = event.topic();
        let sink = lock(&self.sinks).get(&topic).cloned();
        match sink {
            Some(sink) => sink.emit(event),
            None => debug!(%topic, "native event without a registered sink"),
        }
    }

    fn delegate(&self) -> Option<Arc<dyn TagDelegate>> {
        let delegate = lock(&self.tag_delegate).clone();
        if delegate.is_none() {
            warn!("tag callback arrived before a delegate was installed");
        }
        delegate
    }

    pub fn tag_added(&self, status: TagStatus, tag: Option<TagRecord>, timestamp: i64) {
        if let Some(d) = self.delegate() {
            d.on_tag_added(status, tag, timestamp);
        }
    }

    pub fn tag_removed(&self, status: TagStatus, tag: Option<TagRecord>, timestamp: i64) {
        if let Some(d) = self.delegate() {
            d.on_tag_removed(status, tag, timestamp);
        }
    }

    pub fn all_tags_removed(&self, status: TagStatus, timestamp: i64) {
        if let Some(d) = self.delegate() {
            d.on_all_tags_removed(status, timestamp);
        }
    }

    pub fn tags_listed(&self, status: TagStatus, tags: Vec<TagRecord>, timestamp: i64) {
        if let Some(d) = self.delegate() {
            d.on_tags_listed(status, tags, timestamp);
        }
    }

    pub fn tag_error(&self, slot: TagSlot, message: String) {
        if let Some(d) = self.delegate() {
            d.on_tag_error(slot, message);
        }
    }

    /// Park the completion of a wizard launch. A previous one is superseded
    /// and answered `false`.
    pub fn park_wizard(&self, done: Completion<bool>) {
        if let Some(previous) = lock(&self.wizard).replace(done) {
            warn!("permission wizard relaunched while one was open");
            previous.value(false);
        }
    }

    /// Answer the parked wizard completion, if any.
    pub fn finish_wizard(&self, granted: bool) {
        match lock(&self.wizard).take() {
            Some(done) => done.value(granted),
            None => debug!(granted, "wizard result without a waiting caller"),
        }
    }

    /// Reject the parked wizard completion: the wizard was never shown.
    pub fn fail_wizard(&self, error: TelematicsError) {
        match lock(&self.wizard).take() {
            Some(done) => done.fail(error),
            None => warn!(error = %error, "wizard failure without a waiting caller"),
        }
    }
}
