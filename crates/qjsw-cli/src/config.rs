//! Configuration file parsing for qjsw.toml.

use qjsw_runtime::ContextConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Context limits and diagnostics
    #[serde(default)]
    pub context: ContextSettings,

    /// Module resolution settings
    #[serde(default)]
    pub modules: ModulesConfig,
}

/// Context configuration, mirroring [`ContextConfig`].
#[derive(Debug, Default, Deserialize)]
pub struct ContextSettings {
    /// Max stack size in bytes, 0 disables the check
    pub max_stack_size: Option<usize>,

    /// Memory limit in bytes
    pub memory_limit: Option<usize>,

    /// Record where leaked handles were acquired
    #[serde(default)]
    pub capture_stack_traces: bool,

    /// File name reported for `eval` sources
    pub default_file_name: Option<String>,
}

/// Module resolution configuration.
#[derive(Debug, Default, Deserialize)]
pub struct ModulesConfig {
    /// Directory bare specifiers resolve against (default: current directory)
    pub root: Option<PathBuf>,
}

impl Config {
    /// Context configuration without a console sink
    pub fn context_config(&self) -> ContextConfig {
        let settings = &self.context;
        let mut config =
            ContextConfig::new().capture_stack_traces(settings.capture_stack_traces);
        if let Some(size) = settings.max_stack_size {
            config = config.max_stack_size(size);
        }
        if let Some(limit) = settings.memory_limit {
            config = config.memory_limit(limit);
        }
        if let Some(name) = &settings.default_file_name {
            config = config.default_file_name(name.clone());
        }
        config
    }
}

/// Load configuration from a file or search for default config files.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = match path {
        Some(path) if !path.exists() => {
            anyhow::bail!("Config file not found: {}", path.display())
        }
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

/// Config file names to search for
const CONFIG_NAMES: &[&str] = &["qjsw.toml", ".qjswrc.toml"];

/// Search for a configuration file in the current directory and its parents.
fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;

    let mut dir = Some(cwd.as_path());
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir = current.parent();
    }

    None
}
