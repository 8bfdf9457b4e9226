//! Resolution of the flat-file storage directory.
//!
//! The directory is user-configurable and may change between runs, so it is
//! re-resolved from configuration on every access; callers must never cache
//! the resolved path. Changing the location migrates the known data files to
//! the new directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config;
use crate::storage::jsonl::DATA_FILES;
use crate::{Error, Result};

enum Mode {
    /// Follow the persisted configuration (production).
    Config,
    /// Pinned directory, ignoring configuration (tests, `--data-dir`).
    Fixed(PathBuf),
}

/// Resolves the directory where the flat-file backend keeps its files.
pub struct StorageLocation {
    mode: Mode,
}

impl StorageLocation {
    /// Resolver that follows the persisted configuration.
    pub fn from_config() -> Self {
        Self { mode: Mode::Config }
    }

    /// Resolver pinned to a specific directory.
    pub fn fixed(dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: Mode::Fixed(dir.into()),
        }
    }

    /// Resolve the current directory, creating it if necessary.
    ///
    /// Re-reads configuration on every call; the configured location may
    /// have changed since the last access.
    pub fn resolve(&self) -> Result<PathBuf> {
        let dir = match &self.mode {
            Mode::Fixed(dir) => dir.clone(),
            Mode::Config => {
                let cfg = config::load()?;
                match cfg.storage_dir {
                    Some(dir) => dir,
                    None => config::data_dir()?.join("files"),
                }
            }
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Persist a new storage directory and migrate the known data files
    /// from the previous location (copy, overwriting at the destination).
    pub fn set(&self, new_dir: &Path) -> Result<PathBuf> {
        if matches!(self.mode, Mode::Fixed(_)) {
            return Err(Error::Config(
                "storage location is pinned and cannot be changed".to_string(),
            ));
        }

        let previous = self.resolve()?;
        let mut cfg = config::load()?;
        cfg.storage_dir = Some(new_dir.to_path_buf());
        config::save(&cfg)?;

        let target = self.resolve()?;
        if previous != target {
            for name in DATA_FILES {
                let source = previous.join(name);
                if source.exists() {
                    fs::copy(&source, target.join(name))?;
                }
            }
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fixed_location_resolves_and_creates() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("files");
        let location = StorageLocation::fixed(&dir);

        let resolved = location.resolve().unwrap();
        assert_eq!(resolved, dir);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_fixed_location_rejects_set() {
        let temp = TempDir::new().unwrap();
        let location = StorageLocation::fixed(temp.path());
        assert!(location.set(temp.path()).is_err());
    }
}
