//! Command-line argument parsing for Strata tools.

use std::path::PathBuf;

use clap::Parser;

use crate::Settings;

/// Strata command-line arguments.
///
/// CLI values override settings loaded from `settings.ron`.
#[derive(Parser, Debug)]
#[command(name = "strata", about = "Generate a region of Strata terrain")]
pub struct CliArgs {
    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Generator preset file.
    #[arg(long)]
    pub preset: Option<PathBuf>,

    /// Worker threads (0 = automatic).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Sample cache capacity in entries.
    #[arg(long)]
    pub cache_capacity: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Horizontal radius of the generated region, in chunks.
    #[arg(long, default_value_t = 2)]
    pub radius: u32,

    /// Vertical radius of the generated region around chunk y = 4, in chunks.
    #[arg(long, default_value_t = 2)]
    pub vertical_radius: u32,
}

impl Settings {
    /// Apply CLI overrides to loaded settings.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.generation.seed = seed;
        }
        if let Some(ref path) = args.preset {
            self.preset.path = Some(path.clone());
        }
        if let Some(threads) = args.threads {
            self.generation.worker_threads = threads;
        }
        if let Some(capacity) = args.cache_capacity {
            self.generation.sample_cache_capacity = capacity;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
