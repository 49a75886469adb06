//! TOML-based configuration for querywright.
//!
//! Supports a config file (querywright.toml) with environment variable
//! expansion in every string value.
//!
//! Example configuration:
//! ```toml
//! [compiler]
//! dialect = "sqlite"
//! tie_break = "most_referenced"
//!
//! [security]
//! allowed_tables = ["companies"]
//! denied_columns = ["companies.ssn"]
//! max_rows = 1000
//! clamp_limit = true
//!
//! [security.allowed_columns]
//! companies = ["industry", "revenue"]
//!
//! [execution]
//! max_attempts = 2
//! timeout_ms = 30000
//!
//! [phase]
//! step_ceiling = 100
//! cost_warning_rows = 1000000
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::execution::RepairConfig;
use crate::phase::DEFAULT_STEP_CEILING;
use crate::planner::TieBreak;
use crate::security::SecurityPolicy;
use crate::sql::Dialect;

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
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Statement compilation.
    pub compiler: CompilerSettings,

    /// Security policy applied to every statement.
    pub security: SecurityPolicy,

    /// Execution and repair.
    pub execution: ExecutionSettings,

    /// Phase controller limits.
    pub phase: PhaseSettings,
}

/// Compiler configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Dialect statements are rendered in.
    pub dialect: Dialect,

    /// Rule for choosing between equally short join trees.
    pub tie_break: TieBreak,
}

/// Execution configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Attempts per statement, including the first.
    pub max_attempts: u32,

    /// Bound on each database call, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            timeout_ms: 30_000,
        }
    }
}

impl ExecutionSettings {
    pub fn repair_config(&self) -> RepairConfig {
        RepairConfig::new(self.max_attempts, Duration::from_millis(self.timeout_ms))
    }
}

/// Phase controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PhaseSettings {
    /// Operations and signals allowed per run.
    pub step_ceiling: u32,

    /// Estimated row count above which a run is flagged before execution.
    pub cost_warning_rows: u64,
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self {
            step_ceiling: DEFAULT_STEP_CEILING,
            cost_warning_rows: 1_000_000,
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
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text, expanding `${VAR}` references.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let mut table: toml::Table = toml::from_str(content)?;
        for (_, value) in table.iter_mut() {
            expand_value(value)?;
        }
        let settings: Settings = toml::Value::Table(table).try_into()?;
        settings.check()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `QUERYWRIGHT_CONFIG`
    /// 2. `./querywright.toml`
    /// 3. `~/.config/querywright/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("QUERYWRIGHT_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("querywright.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("querywright").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn check(&self) -> Result<(), SettingsError> {
        if self.execution.max_attempts == 0 {
            return Err(SettingsError::InvalidConfig(
                "execution.max_attempts must be at least 1".into(),
            ));
        }
        if self.execution.timeout_ms == 0 {
            return Err(SettingsError::InvalidConfig(
                "execution.timeout_ms must be positive".into(),
            ));
        }
        if self.phase.step_ceiling == 0 {
            return Err(SettingsError::InvalidConfig(
                "phase.step_ceiling must be at least 1".into(),
            ));
        }
        if let Some(bad) = self
            .security
            .denied_columns
            .iter()
            .find(|c| c.split_once('.').is_none())
        {
            return Err(SettingsError::InvalidConfig(format!(
                "security.denied_columns entry '{bad}' must be table.column"
            )));
        }
        Ok(())
    }
}

fn expand_value(value: &mut toml::Value) -> Result<(), SettingsError> {
    match value {
        toml::Value::String(s) => *s = expand_env_vars(s)?,
        toml::Value::Array(items) => {
            for item in items {
                expand_value(item)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                expand_value(item)?;
            }
        }
        _ => {}
    }
    Ok(())
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
            chars.by_ref().take_while(|ch| *ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            name
        };

        if var_name.is_empty() {
            // Just a lone $, keep it
            result.push('$');
        } else {
            let value =
                env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
            result.push_str(&value);
        }
    }

    Ok(result)
}
