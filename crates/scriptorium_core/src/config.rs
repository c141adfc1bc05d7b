//! Library configuration.
//!
//! # Responsibility
//! - Describe where the vault and pattern namespaces live and how hard
//!   writes try to reach stable storage.
//! - Load that description from TOML.
//!
//! # Invariants
//! - Namespace directories are non-empty and resolve to distinct paths.
//! - Relative namespace directories resolve against `root`.

use crate::repo::fs_store::WriteDurability;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_VAULT_DIR: &str = "vault";
pub const DEFAULT_PATTERNS_DIR: &str = "patterns";

/// Configuration failures.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config text is not valid TOML for this shape.
    Parse(toml::de::Error),
    /// Config parsed but describes an unusable layout.
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    root: PathBuf,
    #[serde(default)]
    vault_dir: Option<PathBuf>,
    #[serde(default)]
    patterns_dir: Option<PathBuf>,
    #[serde(default)]
    durability: WriteDurability,
}

/// Storage layout and write policy for one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    pub root: PathBuf,
    pub vault_dir: PathBuf,
    pub patterns_dir: PathBuf,
    pub durability: WriteDurability,
}

impl VaultConfig {
    /// Defaults: `<root>/vault`, `<root>/patterns`, best-effort writes.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            vault_dir: PathBuf::from(DEFAULT_VAULT_DIR),
            patterns_dir: PathBuf::from(DEFAULT_PATTERNS_DIR),
            durability: WriteDurability::default(),
        }
    }

    pub fn with_vault_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.vault_dir = dir.into();
        self
    }

    pub fn with_patterns_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.patterns_dir = dir.into();
        self
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    /// Parses TOML with a required `root` and optional `vault_dir`,
    /// `patterns_dir` and `durability` (`best_effort` | `durable`).
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(raw).map_err(ConfigError::Parse)?;
        let mut config = Self::new(raw.root).with_durability(raw.durability);
        if let Some(dir) = raw.vault_dir {
            config.vault_dir = dir;
        }
        if let Some(dir) = raw.patterns_dir {
            config.patterns_dir = dir;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file; a relative `root` resolves against the file's
    /// directory.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        if config.root.is_relative() {
            if let Some(base) = path.parent() {
                config.root = base.join(&config.root);
            }
        }
        Ok(config)
    }

    /// Absolute-or-root-relative location of the vault namespace.
    pub fn vault_path(&self) -> PathBuf {
        self.root.join(&self.vault_dir)
    }

    /// Absolute-or-root-relative location of the pattern namespace.
    pub fn patterns_path(&self) -> PathBuf {
        self.root.join(&self.patterns_dir)
    }

    /// Checks the namespace layout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("root must not be empty".to_string()));
        }
        for (label, dir) in [
            ("vault_dir", &self.vault_dir),
            ("patterns_dir", &self.patterns_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("{label} must not be empty")));
            }
        }
        if self.vault_path() == self.patterns_path() {
            return Err(ConfigError::Invalid(
                "vault_dir and patterns_dir must differ".to_string(),
            ));
        }
        Ok(())
    }
}
