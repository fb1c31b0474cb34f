//! Configuration management.
//!
//! Settings come from three layers, later ones winning: an optional config
//! file (TOML, YAML or JSON by extension), the `DATABASE_URL` environment
//! variable, and command line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ocr::TesseractConfig;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "recordscribe.db";

/// Default pattern for subject IDs embedded in directory names.
pub const DEFAULT_SUBJECT_ID_PATTERN: &str = r"(094-[0-9]{6})";

/// Config file basename looked up in the working directory.
const CONFIG_BASENAME: &str = "recordscribe";

const CONFIG_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

/// Errors loading configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config {path}: {reason}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        reason: String,
    },
}

/// PII scrubbing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubConfig {
    /// Minimum entity score kept for redaction.
    pub threshold: f64,
    /// Entity types never redacted.
    pub exclude_types: Vec<String>,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            exclude_types: vec!["IN_PAN".to_string()],
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename inside `data_dir`.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    pub tesseract: TesseractConfig,
    pub scrub: ScrubConfig,
    /// Regex whose first capture group is the subject ID.
    pub subject_id_pattern: String,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recordscribe");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            tesseract: TesseractConfig::default(),
            scrub: ScrubConfig::default(),
            subject_id_pattern: DEFAULT_SUBJECT_ID_PATTERN.to_string(),
        }
    }
}

impl Settings {
    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            let path = self.data_dir.join(&self.database_filename);
            format!("sqlite:{}", path.display())
        }
    }

    /// Full path to the default database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Create the data directory when the database lives there.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        if self.database_url.is_none() {
            std::fs::create_dir_all(&self.data_dir)?;
        }
        Ok(())
    }
}

/// Configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory (relative paths resolve against the config file).
    pub data_dir: Option<String>,
    /// Database filename inside the data directory.
    pub database: Option<String>,
    /// Full database URL or path.
    pub database_url: Option<String>,
    pub tesseract: Option<TesseractConfig>,
    pub scrub: Option<ScrubConfig>,
    pub subject_id_pattern: Option<String>,
    /// Where this config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// The format is chosen by extension; anything unknown is read as JSON.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |format: &'static str, reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            reason,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_err("TOML", e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_err("YAML", e.to_string()))?
            }
            _ => serde_json::from_str(&contents).map_err(|e| parse_err("JSON", e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// Paths starting with ~ are expanded.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref url) = self.database_url {
            settings.database_url = Some(url.clone());
        }
        if let Some(ref tesseract) = self.tesseract {
            settings.tesseract = tesseract.clone();
            if let Some(ref dir) = tesseract.tessdata_dir {
                settings.tesseract.tessdata_dir =
                    Some(self.resolve_path(&dir.to_string_lossy(), base_dir));
            }
        }
        if let Some(ref scrub) = self.scrub {
            settings.scrub = scrub.clone();
        }
        if let Some(ref pattern) = self.subject_id_pattern {
            settings.subject_id_pattern = pattern.clone();
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides discovery).
    pub config_path: Option<PathBuf>,
    /// Database URL or path from the command line.
    pub database: Option<String>,
}

/// Look for `recordscribe.{toml,yaml,yml,json}` in a directory.
fn find_config_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", CONFIG_BASENAME, ext)))
        .find(|path| path.is_file())
}

fn load_file_config(options: &LoadOptions, cwd: &Path) -> Result<Config, ConfigError> {
    if let Some(ref path) = options.config_path {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);
        if !path.is_file() {
            return Err(ConfigError::NotFound(path));
        }
        return Config::load_from_path(&path);
    }

    match find_config_in(cwd) {
        Some(path) => {
            tracing::debug!("Found config file: {}", path.display());
            Config::load_from_path(&path)
        }
        None => Ok(Config::default()),
    }
}

/// Layer file config, environment and CLI flags into settings.
fn resolve_settings(
    config: &Config,
    options: &LoadOptions,
    env_database_url: Option<String>,
    cwd: &Path,
) -> Settings {
    let mut settings = Settings::default();
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.to_path_buf());
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(url) = env_database_url.filter(|s| !s.is_empty()) {
        tracing::debug!("Using DATABASE_URL from environment: {}", url);
        settings.database_url = Some(url);
    }

    if let Some(ref database) = options.database {
        let expanded = shellexpand::tilde(database).into_owned();
        settings.database_url = Some(expanded);
    }

    settings
}

/// Load settings with explicit options.
pub fn load_settings(options: &LoadOptions) -> Result<Settings, ConfigError> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = load_file_config(options, &cwd)?;
    Ok(resolve_settings(
        &config,
        options,
        std::env::var("DATABASE_URL").ok(),
        &cwd,
    ))
}
