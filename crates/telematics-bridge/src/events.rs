// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Event multiplexer.
//
// The provider accepts a single delegate per topic.  The multiplexer owns that
// delegate (a channel sink) and fans each pushed event out to any number of
// subscribed handlers.  Native threads only ever touch the channel; handlers
// run on the pump task spawned on the caller's tokio runtime.
//
// A topic's delegate is registered with the first subscription and removed
// with the last one, independently of every other topic.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use telematics_core::error::{Result, TelematicsError};
use telematics_core::types::{EventTopic, ListenerId, TelematicsEvent};
use telematics_provider::CapabilityProvider;
use telematics_provider::traits::{EventSink, EventSources};

use crate::gate::PlatformGate;
use crate::lifecycle::Lifecycle;

/// Callback invoked for every event on a subscribed topic.
pub type Handler = Arc<dyn Fn(&TelematicsEvent) + Send + Sync>;

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    handler: Handler,
    active: Arc<AtomicBool>,
}

/// Delegate handed to the provider: forwards into the pump channel.
struct ChannelSink {
    tx: mpsc::UnboundedSender<TelematicsEvent>,
}

impl EventSink for ChannelSink {
    fn emit(&self, event: TelematicsEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            debug!(topic = %event.topic(), "event pump stopped, event dropped");
        }
    }
}

struct Inner {
    provider: Arc<dyn CapabilityProvider>,
    gate: PlatformGate,
    lifecycle: Arc<Lifecycle>,
    sink: Arc<ChannelSink>,
    topics: Mutex<HashMap<EventTopic, Vec<Listener>>>,
}

impl Inner {
    fn topics(&self) -> MutexGuard<'_, HashMap<EventTopic, Vec<Listener>>> {
        self.topics.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn dispatch(&self, event: &TelematicsEvent) -> usize {
        self.lifecycle.observe_event(event);

        let topic = event.topic();
        // Snapshot so handlers may subscribe or unsubscribe without deadlock.
        let listeners = self.topics().get(&topic).cloned().unwrap_or_default();
        let mut delivered = 0;
        for listener in &listeners {
            if !listener.active.load(Ordering::Acquire) {
                continue;
            }
            let handler = &listener.handler;
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".into());
                    warn!(%topic, listener = %listener.id, %message, "event handler panicked");
                }
            }
        }
        delivered
    }

    fn unsubscribe(&self, topic: EventTopic, id: ListenerId) {
        let mut topics = self.topics();
        let Some(listeners) = topics.get_mut(&topic) else {
            return;
        };
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        if listeners.len() == before {
            return;
        }
        debug!(%topic, listener = %id, remaining = listeners.len(), "listener removed");
        if listeners.is_empty() {
            topics.remove(&topic);
            match self.provider.unregister_delegate(topic) {
                Ok(()) => info!(%topic, "provider delegate removed"),
                Err(e) => warn!(%topic, error = %e, "failed to remove provider delegate"),
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let topics = self
            .topics
            .get_mut()
            .map(std::mem::take)
            .unwrap_or_default();
        for (topic, listeners) in topics {
            for listener in &listeners {
                listener.active.store(false, Ordering::Release);
            }
            if let Err(e) = self.provider.unregister_delegate(topic) {
                warn!(%topic, error = %e, "failed to remove provider delegate on shutdown");
            }
        }
    }
}

/// Fans provider events out to subscribed handlers.
pub struct EventMultiplexer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics: Vec<_> = self
            .inner
            .topics()
            .iter()
            .map(|(t, l)| (t.name(), l.len()))
            .collect();
        f.debug_struct("EventMultiplexer")
            .field("topics", &topics)
            .finish()
    }
}

impl EventMultiplexer {
    /// Build a multiplexer and spawn its pump on the current tokio runtime.
    ///
    /// Fails with `NoRuntime` outside a runtime context.
    pub fn new(
        provider: Arc<dyn CapabilityProvider>,
        gate: PlatformGate,
        lifecycle: Arc<Lifecycle>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| TelematicsError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            provider,
            gate,
            lifecycle,
            sink: Arc::new(ChannelSink { tx }),
            topics: Mutex::new(HashMap::new()),
        });
        runtime.spawn(pump(Arc::downgrade(&inner), rx));
        Ok(Self { inner })
    }

    /// Attach `handler` to `topic`.
    ///
    /// The topic is gated first. The first handler on a topic registers the
    /// provider delegate; if that registration fails nothing is attached.
    pub fn subscribe(
        &self,
        topic: EventTopic,
        handler: impl Fn(&TelematicsEvent) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        self.inner.gate.topic(topic)?;

        let mut topics = self.inner.topics();
        if topics.get(&topic).is_none_or(Vec::is_empty) {
            self.inner
                .provider
                .register_delegate(topic, self.inner.sink.clone())?;
            info!(%topic, "provider delegate registered");
        }

        let listener = Listener {
            id: ListenerId::new(),
            handler: Arc::new(handler),
            active: Arc::new(AtomicBool::new(true)),
        };
        let subscription = Subscription {
            id: listener.id,
            topic,
            active: listener.active.clone(),
            owner: Arc::downgrade(&self.inner),
        };
        let listeners = topics.entry(topic).or_default();
        listeners.push(listener);
        debug!(%topic, listener = %subscription.id, count = listeners.len(), "listener added");
        Ok(subscription)
    }

    /// Run every active handler of the event's topic, in subscription order.
    /// Returns how many handlers completed without panicking.
    pub fn dispatch(&self, event: &TelematicsEvent) -> usize {
        self.inner.dispatch(event)
    }

    pub fn listener_count(&self, topic: EventTopic) -> usize {
        self.inner.topics().get(&topic).map_or(0, Vec::len)
    }

    /// Whether the provider delegate for `topic` is currently installed.
    pub fn is_active(&self, topic: EventTopic) -> bool {
        self.listener_count(topic) > 0
    }
}

async fn pump(owner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<TelematicsEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(inner) = owner.upgrade() else {
            break;
        };
        inner.dispatch(&event);
    }
    debug!("event pump exiting");
}

/// Handle to one attached handler.
///
/// Dropping it leaves the handler attached; call [`Subscription::remove`].
#[must_use = "keep the subscription to be able to remove the handler"]
pub struct Subscription {
    id: ListenerId,
    topic: EventTopic,
    active: Arc<AtomicBool>,
    owner: Weak<Inner>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn topic(&self) -> EventTopic {
        self.topic
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Detach exactly this handler. Idempotent.
    ///
    /// Takes effect immediately: events already queued are not delivered to
    /// it. Removing the topic's last handler deregisters the provider delegate.
    pub fn remove(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.owner.upgrade() {
            inner.unsubscribe(self.topic, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use telematics_core::error::ErrorKind;
    use telematics_core::types::{LocationChangedEvent, Platform};
    use telematics_provider::simulator::SimulatedProvider;

    use crate::capability::CapabilityRegistry;

    fn multiplexer(platform: Platform) -> (Arc<SimulatedProvider>, EventMultiplexer) {
        let sim = Arc::new(SimulatedProvider::new(platform));
        let mux = EventMultiplexer::new(
            sim.clone(),
            PlatformGate::new(CapabilityRegistry::new(platform)),
            Arc::new(Lifecycle::new()),
        )
        .unwrap();
        (sim, mux)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn requires_a_runtime() {
        let sim = Arc::new(SimulatedProvider::new(Platform::Android));
        let err = EventMultiplexer::new(
            sim,
            PlatformGate::new(CapabilityRegistry::new(Platform::Android)),
            Arc::new(Lifecycle::new()),
        )
        .unwrap_err();
        assert!(matches!(err, TelematicsError::NoRuntime));
    }

    #[tokio::test]
    async fn handlers_run_in_subscription_order() {
        let (sim, mux) = multiplexer(Platform::Android);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let first_tx = tx.clone();
        let _first = mux
            .subscribe(EventTopic::LocationChanged, move |_| {
                first_tx.send("first").unwrap();
            })
            .unwrap();
        let _second = mux
            .subscribe(EventTopic::LocationChanged, move |_| {
                tx.send("second").unwrap();
            })
            .unwrap();
        assert_eq!(sim.registrations(EventTopic::LocationChanged), 1);

        sim.simulate_location(52.5, 13.4);
        let order = tokio::time::timeout(Duration::from_secs(2), async {
            vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()]
        })
        .await
        .unwrap();
        assert_eq!(order, ["first", "second"]);
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn removing_last_listener_deregisters() {
        let (sim, mux) = multiplexer(Platform::Android);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let sub = mux
            .subscribe(EventTopic::LocationChanged, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(sim.is_delegate_registered(EventTopic::LocationChanged));

        sub.remove();
        sub.remove();
        assert!(!sub.is_active());
        assert!(!sim.is_delegate_registered(EventTopic::LocationChanged));
        assert_eq!(sim.calls("unregister_delegate"), 1);

        sim.simulate_location(1.0, 2.0);
        settle().await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn removed_listener_misses_queued_events() {
        let (_sim, mux) = multiplexer(Platform::Android);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let removed = mux
            .subscribe(EventTopic::LocationChanged, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        let _kept = mux.subscribe(EventTopic::LocationChanged, |_| {}).unwrap();

        removed.remove();
        let event = TelematicsEvent::LocationChanged(LocationChangedEvent {
            latitude: 0.0,
            longitude: 0.0,
        });
        assert_eq!(mux.dispatch(&event), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(mux.listener_count(EventTopic::LocationChanged), 1);
    }

    #[tokio::test]
    async fn topics_activate_independently() {
        let (sim, mux) = multiplexer(Platform::Ios);
        let location = mux.subscribe(EventTopic::LocationChanged, |_| {}).unwrap();
        let _power = mux.subscribe(EventTopic::LowPowerMode, |_| {}).unwrap();
        location.remove();
        assert!(!sim.is_delegate_registered(EventTopic::LocationChanged));
        assert!(sim.is_delegate_registered(EventTopic::LowPowerMode));
        assert!(mux.is_active(EventTopic::LowPowerMode));
    }

    #[tokio::test]
    async fn gated_topic_touches_no_provider() {
        let (sim, mux) = multiplexer(Platform::Android);
        let err = mux.subscribe(EventTopic::WrongAccuracyAuthorization, |_| {});
        assert_eq!(err.unwrap_err().kind(), ErrorKind::UnsupportedPlatform);
        assert_eq!(sim.total_calls(), 0);
    }

    #[tokio::test]
    async fn panicking_handler_is_isolated() {
        let (sim, mux) = multiplexer(Platform::Android);
        let _bad = mux
            .subscribe(EventTopic::TrackingStateChanged, |_| panic!("handler bug"))
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _good = mux
            .subscribe(EventTopic::TrackingStateChanged, move |event| {
                tx.send(event.clone()).unwrap();
            })
            .unwrap();

        sim.emit(TelematicsEvent::TrackingStateChanged(true));
        sim.emit(TelematicsEvent::TrackingStateChanged(false));
        for expected in [true, false] {
            let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event, TelematicsEvent::TrackingStateChanged(expected));
        }
        assert_eq!(mux.listener_count(EventTopic::TrackingStateChanged), 2);
    }

    #[tokio::test]
    async fn dropping_the_multiplexer_deregisters() {
        let (sim, mux) = multiplexer(Platform::Android);
        let sub = mux.subscribe(EventTopic::SpeedViolation, |_| {}).unwrap();
        drop(mux);
        assert!(!sim.is_delegate_registered(EventTopic::SpeedViolation));
        assert!(!sub.is_active());
        sub.remove();
    }
}
