//! Runtime configuration: the keys named in §6, loaded from a TOML file via
//! `config`+`serde` (the idiomatic substitute for the original's embedded
//! Lua config table — Lua is out of scope, see SPEC_FULL.md §1).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

fn default_thread() -> usize {
    8
}

fn default_harbor() -> u8 {
    1
}

fn default_logger() -> Option<String> {
    None
}

fn default_logservice() -> String {
    "logger".to_string()
}

fn default_profile() -> bool {
    false
}

/// Mirrors `skynet_config.c`'s recognized keys. `bootstrap` is the service
/// launched once start-up is otherwise complete (§4.I); `module_path` is the
/// lookup key the `ModuleTable` substitutes for `cpath` search-path
/// resolution (no real path walk happens, but the key round-trips so config
/// files written against the original shape still parse).
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_thread")]
    pub thread: usize,
    #[serde(default = "default_harbor")]
    pub harbor: u8,
    #[serde(default)]
    pub module_path: String,
    #[serde(default = "default_bootstrap")]
    pub bootstrap: String,
    #[serde(default)]
    pub daemon: Option<PathBuf>,
    #[serde(default = "default_logger")]
    pub logger: Option<String>,
    #[serde(default = "default_logservice")]
    pub logservice: String,
    #[serde(default = "default_profile")]
    pub profile: bool,
}

fn default_bootstrap() -> String {
    "snlua bootstrap".to_string()
}

impl RuntimeConfig {
    pub fn load(path: &Path) -> Result<RuntimeConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable(path.to_path_buf(), e))?;
        let settings = config::Config::builder()
            .add_source(config::File::from_str(&raw, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

impl Default for RuntimeConfig {
    fn default() -> RuntimeConfig {
        RuntimeConfig {
            thread: default_thread(),
            harbor: default_harbor(),
            module_path: String::new(),
            bootstrap: default_bootstrap(),
            daemon: None,
            logger: default_logger(),
            logservice: default_logservice(),
            profile: default_profile(),
        }
    }
}
