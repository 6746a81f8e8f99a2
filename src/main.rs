//! Retrieval Tuner operator CLI
//!
//! Runs the analysis, optimization, and monitoring calls against a libSQL
//! database and prints the results as JSON.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use retrieval_tuner::optimization::{AutoTuner, OptimizationApplier};
use retrieval_tuner::{RetrievalOptimizer, RetrievalStrategy, TunerConfig, TunerContext};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

/// Get the default database path under the platform data directory
fn get_default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("retrieval-tuner")
        .join("tuner.db")
}

#[derive(Parser)]
#[command(name = "retrieval-tuner")]
#[command(about = "Closed-loop performance optimizer for retrieval pipelines", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Database path
    #[arg(long, env = "RETRIEVAL_TUNER_DB_PATH")]
    db: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze recorded performance
    Analyze {
        /// Limit to one strategy
        #[arg(short, long)]
        strategy: Option<RetrievalStrategy>,

        #[arg(short, long)]
        window_hours: Option<u32>,
    },

    /// Search for better parameters
    Optimize {
        #[arg(short, long)]
        strategy: RetrievalStrategy,

        /// Apply the result as the live configuration
        #[arg(long)]
        apply: bool,
    },

    /// Suggest parameter adjustments without a search
    Recommend {
        #[arg(short, long)]
        strategy: RetrievalStrategy,
    },

    /// Show the live applied configuration
    Current {
        #[arg(short, long)]
        strategy: RetrievalStrategy,
    },

    /// Measure the impact of the latest applied optimization
    Monitor {
        #[arg(short, long)]
        strategy: RetrievalStrategy,

        #[arg(short, long)]
        window_hours: Option<u32>,
    },

    /// Run one auto-tuning cycle, or keep tuning with --watch
    Tune {
        #[arg(short, long)]
        strategy: RetrievalStrategy,

        /// Loop every auto_tune.interval_secs (requires auto_tune.enabled)
        #[arg(long)]
        watch: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Library logs at the chosen level; libsql internals stay quiet
    let filter = EnvFilter::new(format!(
        "retrieval_tuner={},libsql=warn",
        level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => TunerConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => TunerConfig::default(),
    };
    config.validate()?;

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    debug!("Using database {}", db_path.display());

    let ctx = TunerContext::libsql(&db_path.to_string_lossy(), config).await?;
    let applier = OptimizationApplier::new(ctx.clone());
    let tuner = RetrievalOptimizer::new(ctx.clone());

    match cli.command {
        Commands::Analyze {
            strategy,
            window_hours,
        } => {
            let report = tuner.analyze(strategy, window_hours).await?;
            print_json(&report)?;
        }
        Commands::Optimize { strategy, apply } => {
            let current = applier.effective_parameters(strategy).await?;
            let result = tuner.optimize(&current, None).await?;
            if apply {
                tuner.apply(&result).await?;
            }
            print_json(&result)?;
        }
        Commands::Recommend { strategy } => {
            let current = applier.effective_parameters(strategy).await?;
            print_json(&tuner.recommend(&current).await)?;
        }
        Commands::Current { strategy } => match tuner.current(strategy).await? {
            Some(applied) => print_json(&applied)?,
            None => {
                eprintln!("No applied configuration for {}; defaults are in effect", strategy);
                print_json(&retrieval_tuner::RetrievalParameters::defaults_for(strategy))?;
            }
        },
        Commands::Monitor {
            strategy,
            window_hours,
        } => {
            let history = tuner.applied_history(strategy).await?;
            let Some(latest) = history.first() else {
                bail!("no applied optimization for {}", strategy);
            };
            print_json(&tuner.monitor(latest, window_hours).await?)?;
        }
        Commands::Tune { strategy, watch } => {
            let current = applier.effective_parameters(strategy).await?;
            let auto_tuner = AutoTuner::new(ctx);
            if watch {
                auto_tuner.start(vec![current]).await?;
            } else {
                print_json(&auto_tuner.run_cycle(&current).await?)?;
            }
        }
    }

    Ok(())
}
