//! Call Center Simulation - Main
//!
//! Usage:
//!   cargo run --release -p call_center -- [scenarios.toml] [--json results.json]
//!
//! Without a config file the reference study runs: three scenarios over an
//! 8-hour shift with seed 42.

use std::env;
use std::fs;
use std::process;

use call_center::{ScenarioResults, ScenarioRunner, SimulationConfig};
use tracing_subscriber::EnvFilter;

struct Args {
    config_path: Option<String>,
    json_path: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config_path: None,
        json_path: None,
    };
    let mut rest = env::args().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--json" => {
                let path = rest.next().ok_or("--json needs an output path")?;
                args.json_path = Some(path);
            }
            _ if args.config_path.is_none() && !arg.starts_with("--") => {
                args.config_path = Some(arg);
            }
            _ => return Err(format!("unexpected argument '{}'", arg)),
        }
    }
    Ok(args)
}

fn print_report(config: &SimulationConfig, results: &ScenarioResults) {
    println!("Simulation Results:");
    println!(
        "  ({} minutes, seed {}, {} scenarios)",
        config.horizon,
        config.seed,
        results.len()
    );
    for (name, summary) in results.iter() {
        let summary = summary.rounded();
        println!("\n{}:", name);
        println!("  Average Wait Time (min): {:.2}", summary.avg_wait_time);
        println!("  Agent Utilization: {:.2}", summary.utilization);
        println!("  Calls Handled: {}", summary.calls_handled);
        if let Some(queue_length) = summary.avg_queue_length {
            println!("  Average Queue Length: {:.2}", queue_length);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Usage: call_center [scenarios.toml] [--json results.json]");
        process::exit(2);
    });

    let config = match &args.config_path {
        Some(path) => SimulationConfig::from_path(path).unwrap_or_else(|e| {
            eprintln!("Error loading {}: {}", path, e);
            process::exit(1);
        }),
        None => SimulationConfig::baseline(),
    };

    let runner = ScenarioRunner::from_config(&config);
    let results = runner.run(&config.scenarios).unwrap_or_else(|e| {
        eprintln!("Simulation failed: {}", e);
        process::exit(1);
    });

    print_report(&config, &results);

    if let Some(path) = &args.json_path {
        let json = serde_json::to_string_pretty(&results).unwrap_or_else(|e| {
            eprintln!("Error serializing results: {}", e);
            process::exit(1);
        });
        if let Err(e) = fs::write(path, json) {
            eprintln!("Error writing {}: {}", path, e);
            process::exit(1);
        }
        println!("\nResults written to {}", path);
    }
}
