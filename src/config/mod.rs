//! Configuration module for querywright.
//!
//! Settings are read from TOML with environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CompilerSettings, ExecutionSettings, PhaseSettings, Settings, SettingsError,
};
