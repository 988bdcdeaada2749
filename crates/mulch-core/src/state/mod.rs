//! Project state and domain operations.
//!
//! [`Mulch`] owns a project root and its loaded configuration. Operations are
//! split by concern:
//! - `record_ops`: record, edit, delete, outcome, compact
//! - `maintenance`: prune, status, validate, compaction analysis
//! - `retrieval`: query, search, ready
//!
//! Every mutation runs inside [`Mulch::mutate_domain`], which holds the
//! domain's file lock from before the read until after the write.

mod maintenance;
mod paths;
mod record_ops;
mod retrieval;

pub use maintenance::{
    CompactionGroup, DomainStatus, DomainValidation, PruneReport, is_stale,
};
pub use paths::{
    CONFIG_FILE, DOMAIN_FILE_EXT, EXPERTISE_DIR, MULCH_DIR, StatePaths, is_valid_domain_name,
    validate_domain_name,
};
pub use record_ops::{CompactResult, OutcomeResult, RecordAction, RecordPatch, RecordResult};
pub use retrieval::{RecordFilter, SearchHit};

use crate::config::MulchConfig;
use crate::error::{MulchError, Result};
use crate::lock::{LockOptions, with_file_lock_opts};
use crate::record::ExpertiseRecord;
use crate::store;
use std::fs;
use std::path::{Path, PathBuf};

/// How a mutation wants its result persisted.
pub(crate) enum WriteBack {
    /// Nothing changed; leave the file alone.
    Unchanged,
    /// Append the last record of the list as one new line.
    AppendLast,
    /// Replace the whole file.
    Rewrite,
}

/// A mulch project rooted at a directory containing `.mulch/`.
pub struct Mulch {
    pub config: MulchConfig,
    root: PathBuf,
    lock_options: LockOptions,
}

impl StatePaths for Mulch {
    fn project_root(&self) -> &Path {
        &self.root
    }
}

impl Mulch {
    /// Open an initialized project.
    ///
    /// Fails with [`MulchError::NotInitialized`] when `.mulch/` is missing so
    /// callers can offer to run `init`.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let mut mulch = Self {
            config: MulchConfig::default(),
            root: root.into(),
            lock_options: LockOptions::default(),
        };
        if !mulch.mulch_dir().is_dir() {
            return Err(MulchError::NotInitialized { root: mulch.root });
        }
        mulch.config = MulchConfig::load(&mulch.config_file())?;
        Ok(mulch)
    }

    /// Create `.mulch/`, the expertise directory, and a default config.
    ///
    /// Idempotent: an existing config is kept as-is. Returns the loaded
    /// project and whether anything was created.
    pub fn init(root: impl Into<PathBuf>) -> Result<(Self, bool)> {
        let mut mulch = Self {
            config: MulchConfig::default(),
            root: root.into(),
            lock_options: LockOptions::default(),
        };
        let mut created = false;

        let expertise_dir = mulch.expertise_dir();
        if !expertise_dir.is_dir() {
            fs::create_dir_all(&expertise_dir)?;
            created = true;
        }

        let config_file = mulch.config_file();
        if config_file.exists() {
            mulch.config = MulchConfig::load(&config_file)?;
        } else {
            mulch.config.save(&config_file)?;
            created = true;
        }
        Ok((mulch, created))
    }

    /// Replace the lock timings used by mutating operations.
    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.lock_options = options;
        self
    }

    pub fn lock_options(&self) -> &LockOptions {
        &self.lock_options
    }

    pub fn domains(&self) -> &[String] {
        &self.config.domains
    }

    /// Register a new domain and create its empty record file.
    ///
    /// Returns false if the domain already existed.
    pub fn add_domain(&mut self, name: &str) -> Result<bool> {
        validate_domain_name(name)?;
        self.require_initialized()?;

        let config_file = self.config_file();
        let (added, config) = with_file_lock_opts(&config_file, &self.lock_options, || {
            // Re-read under the lock so a concurrent add isn't lost
            let mut config = MulchConfig::load(&config_file)?;
            let added = !config.has_domain(name);
            if added {
                config.domains.push(name.to_string());
                config.save(&config_file)?;
            }
            Ok((added, config))
        })?;
        self.config = config;

        let domain_file = self.domain_file(name);
        if !domain_file.exists() {
            store::write(&domain_file, &mut [])?;
        }
        if added {
            log::debug!("added domain '{}'", name);
        }
        Ok(added)
    }

    fn require_initialized(&self) -> Result<()> {
        if self.expertise_dir().is_dir() {
            Ok(())
        } else {
            Err(MulchError::NotInitialized {
                root: self.root.clone(),
            })
        }
    }

    /// Validated path of a registered domain's record file.
    pub(crate) fn domain_path(&self, domain: &str) -> Result<PathBuf> {
        validate_domain_name(domain)?;
        if !self.config.has_domain(domain) {
            return Err(MulchError::not_found(format!("domain '{}'", domain)));
        }
        Ok(self.domain_file(domain))
    }

    /// Read a domain's records without locking.
    pub fn read_domain(&self, domain: &str) -> Result<Vec<ExpertiseRecord>> {
        let path = self.domain_path(domain)?;
        self.require_initialized()?;
        store::read(&path)
    }

    /// Run one locked read-modify-write cycle on a domain file.
    ///
    /// `mutate` sees the current records and says how to persist them. Any
    /// error it returns aborts before the write step, leaving the file as it
    /// was.
    pub(crate) fn mutate_domain<T, F>(&self, domain: &str, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<ExpertiseRecord>) -> Result<(T, WriteBack)>,
    {
        let path = self.domain_path(domain)?;
        self.require_initialized()?;

        with_file_lock_opts(&path, &self.lock_options, || {
            let mut records = store::read(&path)?;
            let (value, write_back) = mutate(&mut records)?;
            match write_back {
                WriteBack::Unchanged => {}
                WriteBack::AppendLast => {
                    if let Some(last) = records.last_mut() {
                        store::append(&path, last)?;
                    }
                }
                WriteBack::Rewrite => {
                    store::write(&path, &mut records)?;
                }
            }
            Ok(value)
        })
    }
}
