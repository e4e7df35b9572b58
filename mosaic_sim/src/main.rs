//! `mosaic-sim`: runs display-wall scenarios against the simulated server
//! and exits non-zero if any of them fails.

use clap::Parser;
use mosaic_core::WallConfig;
use mosaic_sim::scenarios::ScenarioId;
use mosaic_sim::{ScenarioResult, ScenarioRunner, SimError};
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "mosaic-sim")]
#[command(about = "Deterministic simulation runs for Mosaic display walls", long_about = None)]
struct Args {
    /// Master seed (0 = derive one from the system clock)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario name, or "all"
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Run every scenario for this many consecutive seeds
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Viewers in the shutdown and crowd scenarios
    #[arg(long, default_value = "8")]
    viewers: usize,

    /// Client actions per viewer
    #[arg(long, default_value = "200")]
    actions: usize,

    /// Wall configuration (JSON); defaults apply for missing fields
    #[arg(short, long)]
    config: Option<String>,

    /// Log at DEBUG instead of INFO
    #[arg(short, long)]
    verbose: bool,

    /// Print a JSON report on stdout instead of log lines
    #[arg(long)]
    json: bool,
}

fn init_logging(verbose: bool) {
    // RUST_LOG wins over --verbose when set
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn load_config(path: Option<&str>) -> Result<WallConfig, SimError> {
    let config = match path {
        Some(path) => WallConfig::from_json_file(path)?,
        None => WallConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn select_scenarios(name: &str) -> Result<Vec<ScenarioId>, String> {
    if name == "all" {
        return Ok(ScenarioId::all());
    }
    name.parse().map(|scenario| vec![scenario])
}

fn base_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}

fn json_report(results: &[ScenarioResult]) -> serde_json::Value {
    let failed = results.iter().filter(|r| !r.passed).count();
    serde_json::json!({
        "total": results.len(),
        "passed": results.len() - failed,
        "failed": failed,
        "results": results.iter().map(|r| serde_json::json!({
            "scenario": r.scenario.name(),
            "seed": r.seed,
            "passed": r.passed,
            "ticks": r.total_ticks,
            "time_secs": r.final_time_secs,
            "active_sessions": r.active_sessions,
            "metrics": r.metrics,
            "failure_reason": r.failure_reason,
        })).collect::<Vec<_>>(),
    })
}

fn log_result(result: &ScenarioResult) {
    if result.passed {
        info!(
            scenario = result.scenario.name(),
            seed = result.seed,
            ticks = result.total_ticks,
            updates = result.metrics.display_updates,
            vetoes = result.metrics.vetoes,
            "PASSED"
        );
    } else {
        error!(
            scenario = result.scenario.name(),
            seed = result.seed,
            "FAILED: {}",
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    });
    let scenarios = select_scenarios(&args.scenario).unwrap_or_else(|e| {
        let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
        eprintln!("Error: {}", e);
        eprintln!("Available scenarios: {}, all", names.join(", "));
        std::process::exit(2);
    });

    let first_seed = base_seed(args.seed);
    if !args.json {
        info!(seed = first_seed, seeds = args.seeds, scenarios = scenarios.len(), "Mosaic simulator starting");
    }

    let mut results = Vec::with_capacity(args.seeds * scenarios.len());
    for offset in 0..args.seeds as u64 {
        let runner = ScenarioRunner::new(first_seed.wrapping_add(offset), config.clone())
            .with_viewers(args.viewers)
            .with_actions(args.actions);

        for scenario in &scenarios {
            let result = runner.run(*scenario);
            if !args.json {
                log_result(&result);
            }
            results.push(result);
        }
    }

    let failed = results.iter().filter(|r| !r.passed).count();
    if args.json {
        match serde_json::to_string_pretty(&json_report(&results)) {
            Ok(report) => println!("{}", report),
            Err(e) => error!("Failed to serialize report: {}", e),
        }
    } else if failed == 0 {
        info!("All {} scenario runs passed", results.len());
    } else {
        error!("{}/{} scenario runs failed", failed, results.len());
    }

    if failed > 0 {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_selection() {
        assert_eq!(select_scenarios("all").unwrap().len(), ScenarioId::all().len());
        assert_eq!(select_scenarios("wire").unwrap(), vec![ScenarioId::Wire]);
        assert!(select_scenarios("time_warp").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["mosaic-sim", "-S", "browse", "--seeds", "3", "--json"]);
        assert_eq!(args.scenario, "browse");
        assert_eq!(args.seeds, 3);
        assert!(args.json && !args.verbose);
        assert_eq!(args.seed, 42);
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        assert!(matches!(
            load_config(Some("/nonexistent/mosaic.json")),
            Err(SimError::Config(_))
        ));
    }
}
