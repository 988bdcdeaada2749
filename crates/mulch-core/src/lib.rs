//! mulch-core: file-backed expertise records for a project
//!
//! Records live in `.mulch/expertise/<domain>.jsonl`, one JSON object per
//! line. Every mutation runs under a per-domain marker-file lock and rewrites
//! go through an atomic rename, so independent processes can share a project.
//!
//! # Quick Start
//!
//! ```no_run
//! use mulch_core::{Classification, ExpertiseRecord, Mulch, RecordBody, RecordFilter};
//!
//! fn main() -> mulch_core::Result<()> {
//!     let (mut mulch, _) = Mulch::init(".")?;
//!     mulch.add_domain("testing")?;
//!
//!     let record = ExpertiseRecord::new(
//!         RecordBody::Convention {
//!             content: "Use tempfile for filesystem tests".to_string(),
//!         },
//!         Classification::Foundational,
//!     );
//!     let result = mulch.record("testing", record, false)?;
//!     println!("{} {}", result.action.as_str(), result.id);
//!
//!     for hit in mulch.search("tempfile", &[], &RecordFilter::default())? {
//!         println!("{:.3} {}", hit.score, hit.record.headline());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The lower-level modules ([`store`], [`lock`], [`id`], [`search`],
//! [`scoring`]) are usable on their own.

pub mod config;
pub mod error;
pub mod id;
pub mod lock;
pub mod record;
pub mod safe_io;
pub mod scoring;
pub mod search;
pub mod state;
pub mod store;

pub use config::{DomainHealth, GovernanceConfig, MulchConfig, ShelfLife};
pub use error::{MulchError, Result};
pub use lock::{LockOptions, LockStatus};
pub use record::{
    Classification, Evidence, ExpertiseRecord, Outcome, OutcomeStatus, RecordBody, RecordMeta,
    RecordType,
};
pub use state::{
    CompactResult, CompactionGroup, DomainStatus, DomainValidation, Mulch, OutcomeResult,
    PruneReport, RecordAction, RecordFilter, RecordPatch, RecordResult, SearchHit, StatePaths,
};
