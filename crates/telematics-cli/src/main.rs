// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Telematics bridge script runner.
//
// Drives the bridge's command contract against the simulated SDK: every step
// result and every pushed event is printed as one JSON line on stdout, while
// diagnostics go through tracing on stderr.

mod script;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde_json::json;

use telematics_bridge::TelematicsBridge;
use telematics_core::config::BridgeConfig;
use telematics_core::types::Platform;
use telematics_provider::simulator::SimulatedProvider;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlatformArg {
    Ios,
    Android,
    Other,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Ios => Platform::Ios,
            PlatformArg::Android => Platform::Android,
            PlatformArg::Other => Platform::Other,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "telematics", about = "Run a command script against the simulated telematics SDK", version)]
struct Cli {
    /// JSON script: an array of command, simulate, and sleep steps.
    script: Option<PathBuf>,

    /// Bridge configuration file (JSON). Missing file means defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Platform to gate against; overrides the configuration.
    #[arg(long, value_enum)]
    platform: Option<PlatformArg>,

    /// Continue after a rejected command.
    #[arg(long)]
    keep_going: bool,

    /// Print the capability report and exit.
    #[arg(long)]
    capabilities: bool,

    /// How long to wait for trailing events after the last step.
    #[arg(long, default_value_t = 100)]
    settle_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "telematics runner failed");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every step succeeded.
async fn run(cli: Cli) -> telematics_core::error::Result<bool> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(platform) = cli.platform {
        config.platform_override = Some(platform.into());
    }
    let platform = config.platform();

    let sim = Arc::new(SimulatedProvider::new(platform));
    let bridge = TelematicsBridge::new(sim.clone(), config)?;
    tracing::info!(%platform, provider = bridge.provider_name(), "telematics runner starting");

    if cli.capabilities {
        for flag in bridge.capability_report() {
            println!("{}", serde_json::to_string(&flag)?);
        }
        return Ok(true);
    }

    let Some(path) = cli.script else {
        tracing::warn!("no script given; nothing to run");
        return Ok(true);
    };
    let steps = script::load_script(&path)?;

    let mut subscriptions = Vec::new();
    for topic in bridge.capabilities().available_topics() {
        let sub = bridge.subscribe_named(topic.name(), move |payload| {
            tracing::info!(%topic, %payload, "event");
            println!("{}", json!({"event": topic.name(), "payload": payload}));
        })?;
        subscriptions.push(sub);
    }

    let reports = script::run_script(&bridge, &sim, &steps, cli.keep_going).await;
    tokio::time::sleep(Duration::from_millis(cli.settle_ms)).await;

    for sub in &subscriptions {
        sub.remove();
    }
    let mut all_ok = true;
    for report in &reports {
        all_ok &= report.ok;
        println!("{}", serde_json::to_string(report)?);
    }
    tracing::info!(steps = reports.len(), ok = all_ok, "script finished");
    Ok(all_ok)
}
