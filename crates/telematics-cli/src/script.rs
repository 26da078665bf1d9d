// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON command scripts.
//
// A script is an array of steps.  Each step either invokes a bridge command by
// wire name, pushes a simulated SDK event, or sleeps:
//
//   [
//     {"command": "initialize"},
//     {"command": "addFutureTrackTag", "args": {"tag": "T1", "source": "S1"}},
//     {"simulate": {"event": "location", "latitude": 52.5, "longitude": 13.4}},
//     {"sleepMs": 50}
//   ]

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use telematics_bridge::TelematicsBridge;
use telematics_core::error::{Result, TelematicsError};
use telematics_core::types::TelematicsEvent;
use telematics_provider::simulator::SimulatedProvider;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Command {
        command: String,
        #[serde(default)]
        args: Value,
    },
    Simulate {
        simulate: Simulation,
    },
    Sleep {
        #[serde(rename = "sleepMs")]
        sleep_ms: u64,
    },
}

/// SDK-side occurrences the simulator can push.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Simulation {
    Location {
        latitude: f64,
        longitude: f64,
    },
    LowPowerMode {
        enabled: bool,
    },
    TrackingState {
        tracking: bool,
    },
    #[serde(rename_all = "camelCase")]
    Speed {
        speed: f64,
        sustained_secs: u64,
        latitude: f64,
        longitude: f64,
    },
}

/// One line of script output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub label: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    fn done(step: usize, label: String, value: Option<Value>) -> Self {
        Self {
            step,
            label,
            ok: true,
            value,
            code: None,
            error: None,
        }
    }

    fn failed(step: usize, label: String, error: &TelematicsError) -> Self {
        Self {
            step,
            label,
            ok: false,
            value: None,
            code: Some(error.code()),
            error: Some(error.to_string()),
        }
    }
}

pub fn parse_script(json: &str) -> Result<Vec<Step>> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<Step>> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)?;
    parse_script(&data).map_err(|e| {
        TelematicsError::Config(format!("{}: {e}", path.display()))
    })
}

/// Run `steps` in order. Stops at the first failed command unless
/// `keep_going` is set.
pub async fn run_script(
    bridge: &TelematicsBridge,
    sim: &SimulatedProvider,
    steps: &[Step],
    keep_going: bool,
) -> Vec<StepReport> {
    let mut reports = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let report = match step {
            Step::Command { command, args } => {
                match bridge.invoke(command, args.clone()).await {
                    Ok(value) => {
                        info!(step = index, %command, %value, "command resolved");
                        StepReport::done(index, command.clone(), Some(value))
                    }
                    Err(e) => {
                        warn!(step = index, %command, code = e.code(), error = %e, "command rejected");
                        StepReport::failed(index, command.clone(), &e)
                    }
                }
            }
            Step::Simulate { simulate } => {
                simulate_event(sim, simulate);
                StepReport::done(index, format!("simulate {simulate:?}"), None)
            }
            Step::Sleep { sleep_ms } => {
                tokio::time::sleep(Duration::from_millis(*sleep_ms)).await;
                StepReport::done(index, format!("sleep {sleep_ms}ms"), None)
            }
        };
        let stop = !report.ok && !keep_going;
        reports.push(report);
        if stop {
            break;
        }
    }
    reports
}

fn simulate_event(sim: &SimulatedProvider, simulation: &Simulation) {
    match *simulation {
        Simulation::Location {
            latitude,
            longitude,
        } => sim.simulate_location(latitude, longitude),
        Simulation::LowPowerMode { enabled } => sim.simulate_low_power_mode(enabled),
        Simulation::TrackingState { tracking } => {
            sim.emit(TelematicsEvent::TrackingStateChanged(tracking))
        }
        Simulation::Speed {
            speed,
            sustained_secs,
            latitude,
            longitude,
        } => sim.simulate_speed(
            speed,
            Duration::from_secs(sustained_secs),
            latitude,
            longitude,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use telematics_core::config::BridgeConfig;
    use telematics_core::types::Platform;

    fn bridge(platform: Platform) -> (Arc<SimulatedProvider>, TelematicsBridge) {
        let sim = Arc::new(SimulatedProvider::new(platform));
        let config = BridgeConfig {
            platform_override: Some(platform),
            ..BridgeConfig::default()
        };
        let bridge = TelematicsBridge::new(sim.clone(), config).unwrap();
        (sim, bridge)
    }

    #[test]
    fn parses_every_step_kind() {
        let steps = parse_script(
            r#"[
                {"command": "isTracking"},
                {"command": "setEnableSdk", "args": [true]},
                {"simulate": {"event": "speed", "speed": 95, "sustainedSecs": 10,
                              "latitude": 1.0, "longitude": 2.0}},
                {"sleepMs": 5}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            steps[0],
            Step::Command {
                command: "isTracking".into(),
                args: Value::Null
            }
        );
        assert_eq!(
            steps[2],
            Step::Simulate {
                simulate: Simulation::Speed {
                    speed: 95.0,
                    sustained_secs: 10,
                    latitude: 1.0,
                    longitude: 2.0
                }
            }
        );
        assert_eq!(steps[3], Step::Sleep { sleep_ms: 5 });
    }

    #[test]
    fn unreadable_script_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("script.json");
        std::fs::write(&path, r#"[{"bogus": 1}]"#).expect("write");
        assert!(matches!(load_script(&path), Err(TelematicsError::Config(_))));
        assert!(matches!(
            load_script(dir.path().join("absent.json")),
            Err(TelematicsError::Io(_))
        ));
    }

    #[tokio::test]
    async fn runs_a_tag_session() {
        let (sim, bridge) = bridge(Platform::Android);
        let steps = parse_script(
            &json!([
                {"command": "initialize"},
                {"command": "addFutureTrackTag", "args": {"tag": "T1", "source": "S1"}},
                {"command": "getFutureTrackTags"},
                {"command": "removeAllFutureTrackTags"}
            ])
            .to_string(),
        )
        .unwrap();

        let reports = run_script(&bridge, &sim, &steps, false).await;
        assert!(reports.iter().all(|r| r.ok));
        assert_eq!(
            reports[2].value,
            Some(json!({"status": "Success", "tags": [{"tag": "T1", "source": "S1"}]}))
        );
        assert_eq!(reports[3].value, Some(json!("Success")));
        assert!(sim.stored_tags().is_empty());
    }

    #[tokio::test]
    async fn stops_at_the_first_failure() {
        let (sim, bridge) = bridge(Platform::Android);
        let steps = vec![
            Step::Command {
                command: "getApiLanguage".into(),
                args: Value::Null,
            },
            Step::Command {
                command: "isTracking".into(),
                args: Value::Null,
            },
        ];

        let reports = run_script(&bridge, &sim, &steps, false).await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].code, Some("UNSUPPORTED_PLATFORM"));

        let reports = run_script(&bridge, &sim, &steps, true).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].value, Some(json!(false)));
    }
}
