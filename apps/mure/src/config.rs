//! # Configuration
//!
//! An optional TOML file supplies defaults; command-line flags win over it.
//!
//! Lookup order for the file: `--config <path>`, then `MURE_CONFIG`, then
//! `./mure.toml` if it exists. No file means built-in defaults.
//!
//! ```toml
//! database = "graphs.redb"
//! aggressive = true
//!
//! [export]
//! pretty = true
//! classes = ["node", "link"]
//! ```

use mure_core::{ExportOptions, MureError, StandardizeOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "MURE_CONFIG";

/// Config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "mure.toml";

/// Database used when neither flag nor file names one.
pub const DEFAULT_DATABASE: &str = "mure.redb";

/// Maximum config file size (1 MB).
const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Contents of a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: Option<PathBuf>,
    pub aggressive: bool,
    pub json_mode: bool,
    pub export: ExportConfig,
}

/// `[export]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub pretty: bool,
    pub classes: Option<Vec<String>>,
}

impl Config {
    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self, MureError> {
        toml::from_str(text)
            .map_err(|e| MureError::SerializationError(format!("invalid config: {e}")))
    }

    /// Read a config file.
    pub fn from_file(path: &Path) -> Result<Self, MureError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            MureError::IoError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        if metadata.len() > MAX_CONFIG_SIZE {
            return Err(MureError::SerializationError(format!(
                "config '{}' exceeds {MAX_CONFIG_SIZE} bytes",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            MureError::IoError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Find and read the config file, if any.
    pub fn load(explicit: Option<&Path>) -> Result<Self, MureError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.is_empty()
        {
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(local);
        }
        Ok(Self::default())
    }
}

/// Effective settings after layering flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub standardize: StandardizeOptions,
    pub json_mode: bool,
    pub quiet: bool,
    pub export: ExportConfig,
}

impl Settings {
    /// Layer command-line values over `config`.
    #[must_use]
    pub fn resolve(
        config: Config,
        database: Option<PathBuf>,
        aggressive: bool,
        json_mode: bool,
        quiet: bool,
    ) -> Self {
        Self {
            database: database
                .or(config.database)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            standardize: StandardizeOptions {
                aggressive: aggressive || config.aggressive,
            },
            json_mode: json_mode || config.json_mode,
            quiet,
            export: config.export,
        }
    }

    /// Export options, with command-line classes taking precedence.
    #[must_use]
    pub fn export_options(&self, classes: Option<Vec<String>>, pretty: bool) -> ExportOptions {
        ExportOptions {
            include_classes: classes.or_else(|| self.export.classes.clone()),
            pretty: pretty || self.export.pretty,
        }
    }
}
