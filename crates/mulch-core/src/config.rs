//! Project configuration (`.mulch/mulch.config.toml`).
//!
//! Pure data plus parse/serialize helpers. Nothing here is process-global:
//! the loaded [`MulchConfig`] is owned by [`crate::Mulch`] and passed down
//! explicitly.

use crate::error::{MulchError, Result};
use crate::record::Classification;
use crate::safe_io::atomic_write_text;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Centralized default values.
pub struct ConfigDefaults;

impl ConfigDefaults {
    pub const VERSION: u32 = 1;
    pub const MAX_ENTRIES: usize = 100;
    pub const WARN_ENTRIES: usize = 150;
    pub const HARD_LIMIT: usize = 200;
    pub const TACTICAL_SHELF_LIFE_DAYS: i64 = 14;
    pub const OBSERVATIONAL_SHELF_LIFE_DAYS: i64 = 30;
}

// Thin wrappers for serde's #[serde(default = "...")] requirement
fn default_version() -> u32 {
    ConfigDefaults::VERSION
}
fn default_max_entries() -> usize {
    ConfigDefaults::MAX_ENTRIES
}
fn default_warn_entries() -> usize {
    ConfigDefaults::WARN_ENTRIES
}
fn default_hard_limit() -> usize {
    ConfigDefaults::HARD_LIMIT
}
fn default_tactical() -> i64 {
    ConfigDefaults::TACTICAL_SHELF_LIFE_DAYS
}
fn default_observational() -> i64 {
    ConfigDefaults::OBSERVATIONAL_SHELF_LIFE_DAYS
}

/// Entry-count thresholds for a single domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Domains at or above this size should be reviewed.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Domains at or above this size should be compacted.
    #[serde(default = "default_warn_entries")]
    pub warn_entries: usize,
    /// Domains at or above this size need splitting.
    #[serde(default = "default_hard_limit")]
    pub hard_limit: usize,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            max_entries: ConfigDefaults::MAX_ENTRIES,
            warn_entries: ConfigDefaults::WARN_ENTRIES,
            hard_limit: ConfigDefaults::HARD_LIMIT,
        }
    }
}

/// Where a domain sits relative to its governance thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainHealth {
    Ok,
    Warn,
    Over,
    Hard,
}

impl DomainHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainHealth::Ok => "ok",
            DomainHealth::Warn => "warn",
            DomainHealth::Over => "over",
            DomainHealth::Hard => "hard",
        }
    }
}

impl GovernanceConfig {
    pub fn health(&self, count: usize) -> DomainHealth {
        if count >= self.hard_limit {
            DomainHealth::Hard
        } else if count >= self.warn_entries {
            DomainHealth::Over
        } else if count >= self.max_entries {
            DomainHealth::Warn
        } else {
            DomainHealth::Ok
        }
    }
}

/// Days before records of each expiring classification go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfLife {
    #[serde(default = "default_tactical")]
    pub tactical: i64,
    #[serde(default = "default_observational")]
    pub observational: i64,
}

impl Default for ShelfLife {
    fn default() -> Self {
        Self {
            tactical: ConfigDefaults::TACTICAL_SHELF_LIFE_DAYS,
            observational: ConfigDefaults::OBSERVATIONAL_SHELF_LIFE_DAYS,
        }
    }
}

impl ShelfLife {
    /// Shelf life in days, or `None` for classifications that never expire.
    pub fn days_for(&self, classification: Classification) -> Option<i64> {
        match classification {
            Classification::Foundational => None,
            Classification::Tactical => Some(self.tactical),
            Classification::Observational => Some(self.observational),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationDefaults {
    #[serde(default)]
    pub shelf_life: ShelfLife,
}

/// Top-level project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulchConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub classification_defaults: ClassificationDefaults,
}

impl Default for MulchConfig {
    fn default() -> Self {
        Self {
            version: ConfigDefaults::VERSION,
            domains: Vec::new(),
            governance: GovernanceConfig::default(),
            classification_defaults: ClassificationDefaults::default(),
        }
    }
}

impl MulchConfig {
    pub fn shelf_life(&self) -> &ShelfLife {
        &self.classification_defaults.shelf_life
    }

    pub fn has_domain(&self, name: &str) -> bool {
        self.domains.iter().any(|d| d == name)
    }

    /// Parse a config file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&content).map_err(|e| MulchError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Serialize and atomically replace the config file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| MulchError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        atomic_write_text(path, &content)?;
        Ok(())
    }
}
