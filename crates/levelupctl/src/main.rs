//! LevelUp Control - CLI host for the progression engine
//!
//! Keeps state in `state.json` and history in `history.jsonl` under the data
//! directory. Logging goes to stderr, filtered by `LEVELUP_LOG`.

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "levelupctl")]
#[command(about = "LevelUp - turn focused time into skill levels", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/levelup/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overrides the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one tracker tick
    Tick {
        /// Active category (repeatable)
        #[arg(short = 'c', long = "category", required = true)]
        categories: Vec<String>,

        /// Elapsed seconds
        #[arg(short, long)]
        seconds: f64,
    },

    /// Complete a focus session and evaluate achievements
    Session {
        /// Active category (repeatable)
        #[arg(short = 'c', long = "category", required = true)]
        categories: Vec<String>,

        /// Session length in seconds
        #[arg(short, long)]
        seconds: f64,

        /// Override the streak computed from active days
        #[arg(long)]
        streak: Option<u32>,

        /// Pretend the session started at this local hour today (0-23)
        #[arg(long)]
        start_hour: Option<u32>,

        /// Override the stored session count
        #[arg(long)]
        sessions: Option<u32>,
    },

    /// Set the friend count and evaluate social achievements
    Friends {
        count: u32,
    },

    /// Claim today's streak bonus
    StreakBonus {
        /// Override the streak computed from active days
        #[arg(long)]
        streak: Option<u32>,
    },

    /// Show skill levels, streak and counters
    Status,

    /// List achievements with progress
    Achievements,

    /// Show recent progression events
    History {
        /// Number of events
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("LEVELUP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let ctx = commands::Context::load(cli.config.as_deref(), cli.data_dir)?;

    match cli.command {
        Commands::Tick { categories, seconds } => commands::tick(&ctx, &categories, seconds),
        Commands::Session {
            categories,
            seconds,
            streak,
            start_hour,
            sessions,
        } => commands::session(&ctx, &categories, seconds, streak, start_hour, sessions),
        Commands::Friends { count } => commands::friends(&ctx, count),
        Commands::StreakBonus { streak } => commands::streak_bonus(&ctx, streak),
        Commands::Status => commands::status(&ctx),
        Commands::Achievements => commands::achievements(&ctx),
        Commands::History { count } => commands::history(&ctx, count),
    }
}
