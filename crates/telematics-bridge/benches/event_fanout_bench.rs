// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for event fan-out, command argument validation, and a
// full command round trip through the simulated provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;

use telematics_bridge::capability::CapabilityRegistry;
use telematics_bridge::gate::PlatformGate;
use telematics_bridge::lifecycle::Lifecycle;
use telematics_bridge::{EventMultiplexer, TelematicsBridge};
use telematics_core::command::Command;
use telematics_core::config::BridgeConfig;
use telematics_core::types::{EventTopic, LocationChangedEvent, Platform, TelematicsEvent};
use telematics_provider::simulator::SimulatedProvider;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("tokio runtime")
}

/// Dispatch one location event to N handlers (the pump's per-event cost).
fn bench_dispatch_fanout(c: &mut Criterion) {
    let rt = runtime();
    let _guard = rt.enter();
    let event = TelematicsEvent::LocationChanged(LocationChangedEvent {
        latitude: 52.52,
        longitude: 13.40,
    });

    let mut group = c.benchmark_group("dispatch_fanout");
    for listeners in [1usize, 8, 64] {
        let sim = Arc::new(SimulatedProvider::new(Platform::Android));
        let mux = EventMultiplexer::new(
            sim,
            PlatformGate::new(CapabilityRegistry::new(Platform::Android)),
            Arc::new(Lifecycle::new()),
        )
        .expect("multiplexer");
        let hits = Arc::new(AtomicU64::new(0));
        let subs: Vec<_> = (0..listeners)
            .map(|_| {
                let hits = hits.clone();
                mux.subscribe(EventTopic::LocationChanged, move |_| {
                    hits.fetch_add(1, Ordering::Relaxed);
                })
                .expect("subscribe")
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(listeners), &event, |b, event| {
            b.iter(|| black_box(mux.dispatch(black_box(event))));
        });
        black_box(subs);
    }
    group.finish();
}

/// Validate positional and keyed arguments for the widest command.
fn bench_parse_input(c: &mut Criterion) {
    let keyed = json!({"speedLimitKmH": 80, "speedLimitTimeout": 10});
    let positional = json!(["T1", "S1"]);

    c.bench_function("parse_input (keyed speed limits)", |b| {
        b.iter(|| {
            let input = Command::RegisterSpeedViolations.parse_input(black_box(&keyed));
            assert!(input.is_ok());
        });
    });
    c.bench_function("parse_input (positional tag)", |b| {
        b.iter(|| {
            let input = Command::AddFutureTrackTag.parse_input(black_box(&positional));
            assert!(input.is_ok());
        });
    });
}

/// `invoke` through gate, validation, provider thread, and completion.
fn bench_invoke_round_trip(c: &mut Criterion) {
    let rt = runtime();
    let sim = Arc::new(SimulatedProvider::new(Platform::Android));
    let config = BridgeConfig {
        platform_override: Some(Platform::Android),
        ..BridgeConfig::default()
    };
    let bridge = rt
        .block_on(async { TelematicsBridge::new(sim, config) })
        .expect("bridge");

    c.bench_function("invoke isTracking", |b| {
        b.iter(|| {
            let out = rt.block_on(bridge.invoke("isTracking", serde_json::Value::Null));
            black_box(out.expect("isTracking"));
        });
    });
}

criterion_group!(
    benches,
    bench_dispatch_fanout,
    bench_parse_input,
    bench_invoke_round_trip,
);
criterion_main!(benches);
