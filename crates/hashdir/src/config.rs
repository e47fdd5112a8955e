//! Store configuration with environment variable and file-based loading.
//!
//! Environment variables:
//! - `HASHDIR_ROOT`: Root directory of the store
//! - `HASHDIR_MOVE_SOURCE`: Set to "true" to move named files into the store
//! - `HASHDIR_ALGORITHM`: `sha1` (default) or `sha256`
//! - `HASHDIR_BUFFER_SIZE`: Chunk size in bytes for hashing, copying and comparing
//!
//! Default root: `~/.hashdir`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::hash::DigestAlgorithm;

/// Chunk size used when no buffer size is configured.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Configuration for a hash directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the shard subdirectories. Must already exist.
    pub root: PathBuf,

    /// Move named source files into the store instead of copying them,
    /// when source and root share a filesystem.
    #[serde(default)]
    pub move_source: bool,

    #[serde(default)]
    pub algorithm: DigestAlgorithm,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::with_root(default_root())
    }
}

/// Get the default root (~/.hashdir).
fn default_root() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".hashdir"))
        .unwrap_or_else(|| PathBuf::from(".hashdir"))
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

impl StoreConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay any `HASHDIR_*` environment variables onto this config.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(root) = env::var("HASHDIR_ROOT") {
            self.root = PathBuf::from(root);
        }
        if let Some(move_source) = env_flag("HASHDIR_MOVE_SOURCE") {
            self.move_source = move_source;
        }
        if let Ok(algorithm) = env::var("HASHDIR_ALGORITHM") {
            self.algorithm = algorithm
                .parse()
                .context("invalid HASHDIR_ALGORITHM")?;
        }
        if let Ok(size) = env::var("HASHDIR_BUFFER_SIZE") {
            self.buffer_size = size
                .parse()
                .with_context(|| format!("invalid HASHDIR_BUFFER_SIZE: {}", size))?;
        }
        Ok(())
    }

    /// Load configuration from a TOML file, falling back to environment.
    ///
    /// The file should contain a `[hashdir]` section:
    /// ```toml
    /// [hashdir]
    /// root = "/srv/hashdir"
    /// move_source = false
    /// algorithm = "sha1"
    /// buffer_size = 65536
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let table: toml::Table = contents
            .parse()
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;

        if let Some(section) = table.get("hashdir") {
            let config: StoreConfig = section
                .clone()
                .try_into()
                .context("failed to parse [hashdir] section")?;
            Ok(config)
        } else {
            Self::from_env()
        }
    }

    /// Create a config with a specific root and default options.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            move_source: false,
            algorithm: DigestAlgorithm::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn move_source(mut self, enabled: bool) -> Self {
        self.move_source = enabled;
        self
    }

    pub fn algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Chunk size actually used; zero means the default.
    pub fn effective_buffer_size(&self) -> usize {
        if self.buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            self.buffer_size
        }
    }
}
