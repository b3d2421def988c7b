//! The `strata` command: generates a region of terrain around the origin and
//! reports what came out.

mod platform;
mod region;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use strata_config::{CliArgs, Settings, SettingsError};
use strata_preset::{ConfigError, GeneratorPreset};
use strata_terrain::{
    AsyncChunkGenerator, ClimateMap, EngineOptions, GridBiomeMap, TerrainEngine,
    default_thread_count,
};

use crate::platform::{PlatformDirs, PlatformError};
use crate::region::{generate_region, region_chunks};

/// Anything that stops the command before generation starts.
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Preset(#[from] ConfigError),
    #[error("failed to start worker threads: {0}")]
    Workers(#[source] std::io::Error),
}

const REGION_TIMEOUT: Duration = Duration::from_secs(600);

fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("strata: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<(), AppError> {
    let dirs = match &args.config {
        Some(root) => PlatformDirs::resolve_with_root(root),
        None => PlatformDirs::resolve()?,
    };
    dirs.create_dirs()?;

    let mut settings = Settings::load_or_create(&dirs.config_dir)?;
    settings.apply_cli_overrides(args);
    strata_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&settings));
    tracing::info!(config = %dirs.config_dir.display(), "Settings loaded");

    let preset = match &settings.preset.path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading preset");
            GeneratorPreset::load_file(path)?
        }
        None => GeneratorPreset::builtin()?,
    };
    let preset = Arc::new(preset);

    let generation = &settings.generation;
    let climate = ClimateMap::with_default_regions(generation.seed);
    let biome_map = GridBiomeMap::new(preset.terrain.blend_spacing, move |x, z| climate.biome_at(x, z));
    let engine = Arc::new(TerrainEngine::initialize(
        generation.seed,
        preset,
        Arc::new(biome_map),
        EngineOptions {
            sample_cache_capacity: generation.sample_cache_capacity,
            column_cache_capacity: generation.column_cache_capacity,
            cache_shards: generation.cache_shards,
        },
    ));

    let threads = match generation.worker_threads {
        0 => default_thread_count(),
        n => n,
    };
    let generator = AsyncChunkGenerator::new(
        Arc::clone(&engine),
        threads,
        generation.max_in_flight,
        generation.result_capacity,
    )
    .map_err(AppError::Workers)?;

    let chunks = region_chunks(args.radius, args.vertical_radius);
    tracing::info!(chunks = chunks.len(), threads, "Generating region");
    let start = Instant::now();
    let summary = generate_region(&generator, &chunks, REGION_TIMEOUT);
    let elapsed = start.elapsed();

    let (samples, columns) = engine.cache_stats();
    tracing::info!(
        sample_hit_rate = samples.hit_rate(),
        column_hit_rate = columns.hit_rate(),
        sample_entries = samples.entries,
        "Cache statistics"
    );

    println!("seed:        {}", engine.seed());
    println!("chunks:      {} generated, {} failed", summary.generated, summary.failed);
    println!("solid:       {:.1}%", summary.solid_fraction() * 100.0);
    println!("structures:  {}", summary.placements);
    println!("ore veins:   {}", summary.veins);
    println!("lakes:       {}", summary.lakes);
    println!(
        "time:        {:.2}s wall, {:.2}s worker",
        elapsed.as_secs_f64(),
        summary.total_time_us as f64 / 1e6
    );
    println!("center biome: {}", engine.request_column_biome(0, 0).0);
    Ok(())
}
