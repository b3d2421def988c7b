//! Runtime settings for Strata tools.
//!
//! Settings persist to disk as a RON file. CLI arguments parsed with clap
//! override individual values; missing sections and fields fall back to
//! defaults so older files keep loading.

mod cli;
mod error;
mod settings;

pub use cli::CliArgs;
pub use error::SettingsError;
pub use settings::{DebugSettings, GenerationSettings, PresetSettings, SETTINGS_FILE, Settings};
