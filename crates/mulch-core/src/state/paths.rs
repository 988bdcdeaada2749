//! Path computation for a mulch project.
//!
//! All path methods are pure computations with no I/O.

use crate::error::{MulchError, Result};
use std::path::{Path, PathBuf};

pub const MULCH_DIR: &str = ".mulch";
pub const CONFIG_FILE: &str = "mulch.config.toml";
pub const EXPERTISE_DIR: &str = "expertise";
pub const DOMAIN_FILE_EXT: &str = "jsonl";

/// Trait providing path computation for the project layout:
///
/// ```text
/// <root>/.mulch/
/// ├── mulch.config.toml
/// └── expertise/
///     ├── <domain>.jsonl
///     └── <domain>.jsonl.lock   (only while a writer holds it)
/// ```
pub trait StatePaths {
    /// Project root (the directory containing `.mulch`).
    fn project_root(&self) -> &Path;

    fn mulch_dir(&self) -> PathBuf {
        self.project_root().join(MULCH_DIR)
    }

    fn config_file(&self) -> PathBuf {
        self.mulch_dir().join(CONFIG_FILE)
    }

    fn expertise_dir(&self) -> PathBuf {
        self.mulch_dir().join(EXPERTISE_DIR)
    }

    /// Record log for one domain. The name must already be validated.
    fn domain_file(&self, domain: &str) -> PathBuf {
        self.expertise_dir()
            .join(format!("{}.{}", domain, DOMAIN_FILE_EXT))
    }
}

/// Domain names become file names: alphanumerics, dashes and underscores only.
pub fn is_valid_domain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn validate_domain_name(name: &str) -> Result<()> {
    if !is_valid_domain_name(name) {
        return Err(MulchError::InvalidInput(format!(
            "Invalid domain name '{}'. Names must be alphanumeric with dashes and underscores only.",
            name
        )));
    }
    Ok(())
}
