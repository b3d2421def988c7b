//! Platform directory resolution.

use std::io;
use std::path::{Path, PathBuf};

/// Errors that can occur while resolving or creating directories.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The OS did not provide a configuration directory.
    #[error("could not determine OS configuration directory")]
    NoConfigDir,
    /// Directory creation failed.
    #[error("platform I/O error: {0}")]
    Io(#[from] io::Error),
}

/// OS-specific directory paths for Strata.
///
/// Follows OS conventions (XDG on Linux, Known Folders on Windows, Library
/// on macOS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDirs {
    /// `settings.ron` and user presets.
    pub config_dir: PathBuf,
    /// Log files.
    pub log_dir: PathBuf,
}

const APP_NAME: &str = "strata";

impl PlatformDirs {
    /// Resolve platform-specific directories without creating them on disk.
    pub fn resolve() -> Result<Self, PlatformError> {
        let config_base = dirs::config_dir().ok_or(PlatformError::NoConfigDir)?;
        let app_config = config_base.join(APP_NAME);
        Ok(Self {
            config_dir: app_config.join("config"),
            log_dir: app_config.join("logs"),
        })
    }

    /// Directories rooted under `root`, as used for `--config`.
    pub fn resolve_with_root(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            log_dir: root.join("logs"),
        }
    }

    /// Create all directories on disk.
    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_with_root() {
        let root = tempfile::tempdir().unwrap();
        let dirs = PlatformDirs::resolve_with_root(root.path());
        assert_eq!(dirs.config_dir, root.path());
        assert!(dirs.log_dir.starts_with(root.path()));
        dirs.create_dirs().unwrap();
        assert!(dirs.log_dir.is_dir());
    }

    #[test]
    fn test_resolved_dirs_are_distinct() {
        // CI containers may lack a config dir; nothing to check then.
        if let Ok(dirs) = PlatformDirs::resolve() {
            assert_ne!(dirs.config_dir, dirs.log_dir);
            assert!(dirs.config_dir.ends_with("config"));
        }
    }
}
