//! Misinformation Diffusion Simulator CLI
//!
//! Run countermeasure scenarios against a synthetic population or a
//! preprocessed dataset.

use clap::Parser;
use misinfo_core::EngineConfig;
use misinfo_env::DatasetInput;
use misinfo_sim::{ScenarioId, ScenarioResult, ScenarioRunner, SimExport};
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Misinformation diffusion scenario CLI
#[derive(Parser, Debug)]
#[command(name = "misinfo-sim")]
#[command(about = "Simulate misinformation diffusion under platform countermeasures", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of users in the synthetic population
    #[arg(short, long, default_value = "1000")]
    users: usize,

    /// Scenario to run (baseline, key_node, fact_check, early_warning, combined, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Maximum ticks per run
    #[arg(short, long, default_value = "500")]
    ticks: u64,

    /// Number of consecutive seeds to sweep
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Preprocessed dataset JSON (replaces the synthetic population)
    #[arg(short, long)]
    input: Option<String>,

    /// Engine config JSON (time unit and countermeasure parameters)
    #[arg(short, long)]
    config: Option<String>,

    /// Seconds per tick, overrides the config
    #[arg(long)]
    time_unit: Option<f64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Export per-tick metrics of a single scenario to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn init_logging(verbose: bool) {
    let builder = FmtSubscriber::builder();
    let installed = match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish()),
        Err(_) => {
            let level = if verbose { Level::DEBUG } else { Level::INFO };
            tracing::subscriber::set_global_default(builder.with_max_level(level).finish())
        }
    };
    if let Err(e) = installed {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Builds a runner for one seed from the parsed arguments.
fn build_runner(
    args: &Args,
    seed: u64,
    dataset: Option<&DatasetInput>,
    config: Option<&EngineConfig>,
) -> ScenarioRunner {
    let mut runner = ScenarioRunner::new(seed, args.users).with_ticks(args.ticks);
    if let Some(data) = dataset {
        runner = runner.with_dataset(data.clone());
    }
    if let Some(config) = config {
        runner = runner.with_base_config(config.clone());
    }
    if let Some(secs) = args.time_unit {
        runner = runner.with_time_unit(secs);
    }
    runner
}

fn report(result: &ScenarioResult) {
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED | shares={} baseline={} suppression={:.1}%",
            result.scenario.name(),
            result.seed,
            result.metrics.total_shares,
            result.baseline.total_shares,
            result.suppression * 100.0
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if !args.json {
        info!("Misinformation Diffusion Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: baseline, key_node, fact_check, early_warning, combined, all");
                std::process::exit(1);
            }
        }
    };

    let dataset = match &args.input {
        Some(path) => match DatasetInput::from_json_file(path) {
            Ok(data) => {
                info!(
                    "Loaded {}: {} users, {} timeline records",
                    path,
                    data.users.len(),
                    data.tweets_timeline.len()
                );
                Some(data)
            }
            Err(e) => {
                error!("Failed to load dataset {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    let config = match &args.config {
        Some(path) => match EngineConfig::from_json_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                error!("Failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        let runner = build_runner(&args, base_seed, dataset.as_ref(), config.as_ref());
        let run = match runner.run_detailed(scenarios[0]) {
            Ok(run) => run,
            Err(e) => {
                error!("✗ {} FAILED: {}", scenarios[0].name(), e);
                std::process::exit(1);
            }
        };

        let mut export = SimExport::new(scenarios[0].name(), base_seed, run.result.run_id);
        export.add_series(&run.series);
        export.finalize(&run.result);

        if let Err(e) = export.write_to_file(export_path) {
            error!("Failed to write export: {}", e);
            std::process::exit(1);
        }
        info!("Exported {} frames to {}", export.frames.len(), export_path);
        report(&run.result);

        if !run.result.passed {
            std::process::exit(1);
        }
        return;
    }

    // Run simulations
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = build_runner(&args, seed, dataset.as_ref(), config.as_ref());

        for scenario in &scenarios {
            let result = runner.run(*scenario);
            if !args.json {
                report(&result);
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "run_id": r.run_id,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "users": r.users,
                    "metrics": r.metrics,
                    "baseline": r.baseline,
                    "suppression": r.suppression,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("Failed to serialize summary: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
