//! MapTrack Replay CLI
//!
//! Replay seeded play sessions through the tracker and report what it kept.

use clap::Parser;
use maptrack_core::MapTrackConfig;
use maptrack_sim::{ReplayConfig, ReplayExport, ReplayResult, ReplayRunner, SimError};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// MapTrack deterministic replay CLI
#[derive(Parser, Debug)]
#[command(name = "maptrack-sim")]
#[command(about = "Replay seeded play sessions through MapTrack", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of consecutive seeds to replay
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Game days per replay
    #[arg(short, long, default_value = "3")]
    days: f32,

    /// Settings file (JSON); defaults are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the merge distance from the settings
    #[arg(long)]
    min_distance: Option<f32>,

    /// Override the seconds between samples from the settings
    #[arg(long)]
    update_period: Option<f32>,

    /// Reload the last save at this fraction of the run (0..1)
    #[arg(long)]
    rewind_at: Option<f32>,

    /// Write the final track here and check it reloads identically (single seed only)
    #[arg(long)]
    track: Option<PathBuf>,

    /// Export frames and the final track to a JSON file (single seed only)
    #[arg(long)]
    export: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn load_settings(args: &Args) -> Result<MapTrackConfig, SimError> {
    let mut config = match &args.config {
        Some(path) => MapTrackConfig::load(path)?,
        None => MapTrackConfig::default(),
    };
    if let Some(distance) = args.min_distance {
        config.min_distance = distance;
    }
    if let Some(period) = args.update_period {
        config.update_period = period;
    }
    config.validate()?;
    Ok(config)
}

/// Rejects flag combinations that would make seeds overwrite each other's files.
fn check_args(args: &Args) -> Result<(), SimError> {
    if args.seeds > 1 {
        if args.export.is_some() {
            return Err(SimError::invalid("--export only supports a single seed"));
        }
        if args.track.is_some() {
            return Err(SimError::invalid("--track only supports a single seed"));
        }
    }
    Ok(())
}

fn run(args: &Args) -> Result<Vec<ReplayResult>, SimError> {
    check_args(args)?;
    let settings = load_settings(args)?;

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let mut results = Vec::with_capacity(args.seeds);
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let config = ReplayConfig {
            seed,
            days: args.days,
            rewind_at: args.rewind_at,
            track_path: args.track.clone(),
            ..ReplayConfig::default()
        };
        let runner = ReplayRunner::new(config, settings.clone())?;

        let result = match &args.export {
            Some(path) => {
                let mut export = ReplayExport::new(seed, settings.clone());
                let result = runner.run(Some(&mut export))?;
                export.write_to_file(path)?;
                info!("Exported {} frames to {}", export.frames.len(), path.display());
                result
            }
            None => runner.run(None)?,
        };

        if !args.json {
            if result.passed {
                info!(
                    "✓ seed={} PASSED | {} samples -> {} points | length {:.0} | {} cells discovered",
                    seed, result.samples, result.retained_points, result.length, result.discovered_cells
                );
            } else {
                error!(
                    "✗ seed={} FAILED: {}",
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        results.push(result);
    }
    Ok(results)
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("MapTrack Replay v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let results = match run(&args) {
        Ok(results) => results,
        Err(e) => {
            error!("Replay aborted: {}", e);
            std::process::exit(2);
        }
    };

    let total = results.len();
    let failed_count = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize summary: {}", e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} replays passed!", total);
        } else {
            error!("❌ {}/{} replays failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
