//! Settings structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// File name of the settings file inside the config directory.
pub const SETTINGS_FILE: &str = "settings.ron";

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Engine and worker pool sizing.
    pub generation: GenerationSettings,
    /// Which generator preset to load.
    pub preset: PresetSettings,
    /// Logging.
    pub debug: DebugSettings,
}

/// Engine and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationSettings {
    /// World seed. A preset's `seedOverride` takes precedence.
    pub seed: u64,
    /// Entries in the lattice/column sample cache.
    pub sample_cache_capacity: usize,
    /// Entries in the blended-biome column cache.
    pub column_cache_capacity: usize,
    /// Independently locked cache shards.
    pub cache_shards: usize,
    /// Worker threads (0 = one per core, minus two).
    pub worker_threads: usize,
    /// Maximum queued requests before submissions are rejected.
    pub max_in_flight: usize,
    /// Capacity of the completed-chunk channel.
    pub result_capacity: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            sample_cache_capacity: 1 << 20,
            column_cache_capacity: 1 << 16,
            cache_shards: 16,
            worker_threads: 0,
            max_in_flight: 64,
            result_capacity: 128,
        }
    }
}

/// Preset selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PresetSettings {
    /// Preset file to load. `None` uses the built-in preset.
    pub path: Option<PathBuf>,
}

/// Debug/development settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DebugSettings {
    /// Log filter (e.g., "debug", "info,strata_noise=trace").
    pub log_level: String,
    /// Also write a JSON log file in debug builds.
    pub log_to_file: bool,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: true,
        }
    }
}

// --- Load / Save / Reload ---

impl Settings {
    /// Load settings from the given directory, or create a default settings file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, SettingsError> {
        let path = config_dir.join(SETTINGS_FILE);

        if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(SettingsError::Read)?;
            let settings: Settings = ron::from_str(&contents).map_err(SettingsError::Parse)?;
            log::info!("Loaded settings from {}", path.display());
            Ok(settings)
        } else {
            let settings = Settings::default();
            settings.save(config_dir)?;
            log::info!("Created default settings at {}", path.display());
            Ok(settings)
        }
    }

    /// Save settings to the given directory as [`SETTINGS_FILE`].
    pub fn save(&self, config_dir: &Path) -> Result<(), SettingsError> {
        std::fs::create_dir_all(config_dir).map_err(SettingsError::Write)?;

        let path = config_dir.join(SETTINGS_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(SettingsError::Serialize)?;

        std::fs::write(&path, serialized).map_err(SettingsError::Write)?;
        Ok(())
    }

    /// Re-read the file: returns `Some(new_settings)` if it changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, SettingsError> {
        let path = config_dir.join(SETTINGS_FILE);
        let contents = std::fs::read_to_string(&path).map_err(SettingsError::Read)?;
        let reloaded: Settings = ron::from_str(&contents).map_err(SettingsError::Parse)?;

        if &reloaded != self {
            log::info!("Settings reloaded with changes");
            Ok(Some(reloaded))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_serialize() {
        let settings = Settings::default();
        let ron_str =
            ron::ser::to_string_pretty(&settings, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("cache_shards: 16"));
        assert!(ron_str.contains("log_level: \"info\""));
    }

    #[test]
    fn test_settings_roundtrip() {
        let mut settings = Settings::default();
        settings.preset.path = Some(PathBuf::from("presets/caves.ron"));
        let ron_str = ron::to_string(&settings).unwrap();
        let deserialized: Settings = ron::from_str(&ron_str).unwrap();
        assert_eq!(settings, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let settings: Settings = ron::from_str("(generation: (seed: 42))").unwrap();
        assert_eq!(settings.generation.seed, 42);
        assert_eq!(settings.generation.max_in_flight, 64);
        assert_eq!(settings.debug, DebugSettings::default());
        assert_eq!(settings.preset.path, None);
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Settings, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_create(dir.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(dir.path().join(SETTINGS_FILE).exists());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.generation.seed = 42;
        settings.generation.worker_threads = 3;
        settings.debug.log_level = "debug".to_string();

        settings.save(dir.path()).unwrap();
        let loaded = Settings::load_or_create(dir.path()).unwrap();
        assert_eq!(settings, loaded);
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default();
        settings.save(dir.path()).unwrap();

        let mut modified = settings.clone();
        modified.generation.cache_shards = 4;
        modified.save(dir.path()).unwrap();

        let result = settings.reload(dir.path()).unwrap();
        assert_eq!(result.map(|s| s.generation.cache_shards), Some(4));
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default();
        settings.save(dir.path()).unwrap();
        assert!(settings.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{{not valid}}").unwrap();
        assert!(matches!(
            Settings::load_or_create(dir.path()),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_reload_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Settings::default().reload(dir.path()),
            Err(SettingsError::Read(_))
        ));
    }
}
