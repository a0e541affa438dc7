use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use droidbridge::app::config::{load_config, verify_install};
use droidbridge::app::logging::init_logging;
use droidbridge::app::models::Device;
use droidbridge::app::orchestrator::Orchestrator;

#[derive(Serialize)]
struct SmokeSummary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    checks: Vec<SmokeCheck>,
    devices: Vec<Device>,
}

#[derive(Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: &'static str, // pass|fail
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() {
    let trace_id = Uuid::new_v4().to_string();
    let mut checks = Vec::new();
    let mut devices = Vec::new();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config: {err}");
            std::process::exit(2);
        }
    };
    init_logging(&config.log_level);

    let start = Instant::now();
    let install_ok = match verify_install(&config, &trace_id) {
        Ok(()) => {
            checks.push(SmokeCheck {
                name: "verify_install",
                status: "pass",
                duration_ms: start.elapsed().as_millis(),
                error: None,
            });
            true
        }
        Err(err) => {
            checks.push(SmokeCheck {
                name: "verify_install",
                status: "fail",
                duration_ms: start.elapsed().as_millis(),
                error: Some(err.to_string()),
            });
            false
        }
    };

    if install_ok {
        let start = Instant::now();
        match Orchestrator::with_defaults(config) {
            Ok(orchestrator) => {
                devices = orchestrator.scan();
                checks.push(SmokeCheck {
                    name: "scan",
                    status: "pass",
                    duration_ms: start.elapsed().as_millis(),
                    error: None,
                });
            }
            Err(err) => {
                checks.push(SmokeCheck {
                    name: "scan",
                    status: "fail",
                    duration_ms: start.elapsed().as_millis(),
                    error: Some(err.to_string()),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == "fail");
    let summary = SmokeSummary {
        tool: "droidbridge-smoke",
        status: if failed { "fail" } else { "pass" },
        trace_id,
        checks,
        devices,
    };
    match serde_json::to_string_pretty(&summary) {
        Ok(payload) => println!("{payload}"),
        Err(err) => eprintln!("failed to serialize summary: {err}"),
    }
    if failed {
        std::process::exit(1);
    }
}
