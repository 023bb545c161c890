//! TOML-based configuration for formql.
//!
//! Supports a config file (formql.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [query]
//! read_only = true
//! max_errors = 50
//!
//! [schema]
//! preload = false
//! forms_path = "${FORMQL_HOME}/forms.json"
//!
//! [calculation]
//! aggregate_cache_enabled = true
//! aggregate_cache_ttl_seconds = 60
//!
//! [results]
//! default_page_size = 25
//!
//! [log]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::query::{ParseOptions, QueryMode};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub query: QuerySettings,
    pub schema: SchemaSettings,
    pub calculation: CalculationSettings,
    pub results: ResultSettings,
    pub log: LogSettings,
}

/// Query editor settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Reject anything but SELECT.
    pub read_only: bool,

    /// Cap on diagnostics collected per query.
    pub max_errors: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            read_only: true,
            max_errors: 50,
        }
    }
}

impl QuerySettings {
    pub fn mode(&self) -> QueryMode {
        if self.read_only {
            QueryMode::ReadOnly
        } else {
            QueryMode::ReadWrite
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            mode: self.mode(),
            max_errors: self.max_errors,
        }
    }
}

/// Schema cache settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaSettings {
    /// Load the cache as soon as the engine is built.
    pub preload: bool,

    /// Form definitions file for offline use (supports ${ENV_VAR} expansion).
    pub forms_path: Option<String>,
}

impl SchemaSettings {
    /// The forms file path with environment variables expanded.
    pub fn resolved_forms_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.forms_path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Calculation engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CalculationSettings {
    /// Memoize aggregate columns between evaluations.
    pub aggregate_cache_enabled: bool,

    /// How long a memoized column stays fresh.
    pub aggregate_cache_ttl_seconds: u64,
}

impl Default for CalculationSettings {
    fn default() -> Self {
        Self {
            aggregate_cache_enabled: true,
            aggregate_cache_ttl_seconds: 60,
        }
    }
}

/// Results grid settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResultSettings {
    pub default_page_size: usize,
}

impl Default for ResultSettings {
    fn default() -> Self {
        Self {
            default_page_size: 25,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive when `FORMQL_LOG`/`RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and check settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `FORMQL_CONFIG`
    /// 2. `./formql.toml`
    /// 3. `~/.config/formql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("FORMQL_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("formql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("formql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Reject values that would make the engine unusable.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.query.max_errors == 0 {
            return Err(SettingsError::InvalidConfig(
                "query.max_errors must be at least 1".to_string(),
            ));
        }
        if self.results.default_page_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "results.default_page_size must be at least 1".to_string(),
            ));
        }
        if self.log.level.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "log.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                // A lone `$` stays literal.
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
