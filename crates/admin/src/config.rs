//! Admin tool configuration
//!
//! Small TOML file pointing at the database; every field is optional and
//! falls back to the platform data directory.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use hackreg_core::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Path to the SQLite database. Defaults to `hackreg.db` in the
    /// platform data directory.
    pub database: Option<PathBuf>,
}

impl Config {
    /// Load from an explicit path, or from the default config location if
    /// one exists there. A missing default file yields the default config.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_config_path()? {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let raw = std::fs::read_to_string(&path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Resolve the database path, creating its parent directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        let path = match &self.database {
            Some(p) => p.clone(),
            None => Self::data_dir()?.join("hackreg.db"),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn default_config_path() -> Result<Option<PathBuf>> {
        Ok(Self::project_dirs()?.map(|dirs| dirs.config_dir().join("config.toml")))
    }

    fn data_dir() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?.ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;
        Ok(dirs.data_dir().to_path_buf())
    }

    fn project_dirs() -> Result<Option<ProjectDirs>> {
        Ok(ProjectDirs::from("dev", "hackreg", "hackreg"))
    }
}
