//! # mirrorfs-config
//!
//! Configuration management for mirrorfs.
//!
//! Loads configuration from:
//! 1. `~/.mirrorfs/config.toml` (global)
//! 2. `.mirrorfs/config.toml` (project-local, overrides global)
//! 3. An explicit file passed on the command line
//! 4. Environment variables (highest priority)

pub mod logging;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub use logging::{init_logging, Component, LogLevel};

/// Default `[mount] max_file_size`: 1 GiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

/// Project-local config location, relative to the working directory
pub const PROJECT_CONFIG_PATH: &str = ".mirrorfs/config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mount: MountConfig,
    pub mirror: MirrorConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load config from standard locations, then layer `explicit` on top
    pub fn load_with(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                layers.push(global_path);
            }
        }

        let project_path = PathBuf::from(PROJECT_CONFIG_PATH);
        if project_path.exists() {
            debug!("Loading project config from {:?}", project_path);
            layers.push(project_path);
        }

        if let Some(path) = explicit {
            debug!("Loading config from {:?}", path);
            layers.push(path.to_path_buf());
        }

        let mut config = Self::from_layers(&layers)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Parse a single TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_layers(&[path])
    }

    /// Parse each file and merge them in order. A key set in a later file
    /// wins even when it names the default value; keys a file leaves out
    /// keep whatever an earlier file said.
    pub fn from_layers<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();
        for path in paths {
            let contents = std::fs::read_to_string(path.as_ref())?;
            merge_tables(&mut merged, contents.parse::<toml::Table>()?);
        }
        Ok(toml::Value::Table(merged).try_into()?)
    }

    /// Global config path: ~/.mirrorfs/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".mirrorfs/config.toml"))
    }

    /// Apply environment variable overrides. `lookup` resolves a variable name.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(fsname) = lookup("MIRRORFS_FSNAME") {
            self.mount.fsname = fsname;
        }
        if let Some(level) = lookup("MIRRORFS_LOG_LEVEL") {
            if let Ok(level) = level.parse() {
                self.log.level = level;
            }
        }
        if let Some(mirror) = lookup("MIRRORFS_MIRROR") {
            match mirror.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => self.mirror.enabled = true,
                "0" | "false" | "off" | "no" => self.mirror.enabled = false,
                other => debug!("Ignoring MIRRORFS_MIRROR={:?}", other),
            }
        }
    }

    /// Render this config as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        Config::default().to_toml()
    }
}

/// Recursive table merge; scalars and arrays in `overlay` replace ours
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(theirs) => match base.get_mut(&key) {
                Some(toml::Value::Table(ours)) => merge_tables(ours, theirs),
                _ => {
                    base.insert(key, toml::Value::Table(theirs));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Mount configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Filesystem name shown in the mount table
    pub fsname: String,
    /// How long the kernel may cache attributes and entries
    pub attr_ttl_secs: u64,
    /// Unmount automatically when the process exits
    pub auto_unmount: bool,
    /// Let users other than the mounting one access the tree
    pub allow_other: bool,
    /// Keep file data in the kernel page cache across opens
    pub kernel_cache: bool,
    /// Largest size a file may grow to, in bytes
    pub max_file_size: u64,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            fsname: "mirrorfs".to_string(),
            attr_ttl_secs: 1,
            auto_unmount: false,
            allow_other: false,
            kernel_cache: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Path mirroring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Maintain a rotated copy of every created or written file
    pub enabled: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
}
