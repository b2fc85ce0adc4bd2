//! mapfix CLI: locate world coordinates from map screenshots.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use mapfix::config::{self, AppConfig};
use mapfix::{recognize_batch, MapFixError, MapFixResult, Recognizer, TemplateMatcher, WorldBounds};

#[derive(Parser)]
#[command(name = "mapfix")]
#[command(about = "Find the world position shown in an in-game map screenshot")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognise one or more screenshots.
    Locate(LocateArgs),

    /// Check whether a world coordinate lies inside the configured bounds.
    Check {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        /// Config file (defaults to the usual search locations).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct LocateArgs {
    /// Screenshot files.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Config file (defaults to the usual search locations).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reference map image, overriding `matcher.reference_map`.
    #[arg(long)]
    map: Option<PathBuf>,

    /// Print one JSON object per screenshot.
    #[arg(long)]
    json: bool,
}

fn load(path: Option<&PathBuf>) -> MapFixResult<AppConfig> {
    match path {
        Some(p) => config::load_config_from(p),
        None => config::load_config(),
    }
}

async fn run_locate(args: LocateArgs) -> MapFixResult<bool> {
    let cfg = load(args.config.as_ref())?;
    let map_path = args
        .map
        .clone()
        .or_else(|| cfg.matcher.reference_map.clone())
        .ok_or_else(|| {
            MapFixError::Config("no reference map: pass --map or set matcher.reference_map".into())
        })?;

    let options = cfg.matcher.options();
    let matcher = tokio::task::spawn_blocking(move || TemplateMatcher::open(map_path, options))
        .await
        .map_err(|e| MapFixError::Batch(format!("join: {e}")))??;
    let recognizer = Arc::new(Recognizer::from_config(&cfg, matcher));

    let entries = recognize_batch(recognizer, args.paths, cfg.concurrency()).await;
    let mut all_ok = true;
    for entry in &entries {
        all_ok &= entry.outcome.is_success();
        if args.json {
            println!("{}", serde_json::to_string(entry)?);
        } else {
            println!("{}: {}", entry.path.display(), entry.outcome);
        }
    }
    Ok(all_ok)
}

fn run_check(x: f64, y: f64, config: Option<&PathBuf>) -> MapFixResult<bool> {
    let cfg = load(config)?;
    let bounds = WorldBounds::from(cfg.bounds);
    let inside = bounds.contains_xy(x, y);
    println!(
        "{x:.1},{y:.1}: {}",
        if inside { "valid" } else { "out of bounds" }
    );
    Ok(inside)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    mapfix::init_tracing("warn");

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Locate(args) => run_locate(args).await,
        Commands::Check { x, y, config } => run_check(x, y, config.as_ref()),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "mapfix failed");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
