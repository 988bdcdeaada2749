//! Housekeeping over whole domains: staleness, pruning, status, validation.

use crate::config::{DomainHealth, ShelfLife};
use crate::error::Result;
use crate::lock::{LockStatus, lock_status};
use crate::record::{ExpertiseRecord, RecordType};
use crate::store::{self, ScanProblem};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::{Mulch, StatePaths, WriteBack};

/// A record is stale once its age in whole days exceeds the shelf life for
/// its classification. Foundational records never are.
pub fn is_stale(record: &ExpertiseRecord, shelf_life: &ShelfLife, now: DateTime<Utc>) -> bool {
    match shelf_life.days_for(record.classification()) {
        Some(days) => (now - record.meta.recorded_at).num_days() > days,
        None => false,
    }
}

/// Records removed (or that would be removed) from one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct PruneReport {
    pub domain: String,
    pub pruned: Vec<ExpertiseRecord>,
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainStatus {
    pub domain: String,
    pub count: usize,
    pub health: DomainHealth,
    pub stale: usize,
    pub last_modified: Option<DateTime<Utc>>,
    pub lock: Option<LockStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainValidation {
    pub domain: String,
    pub records: usize,
    pub problems: Vec<ScanProblem>,
}

/// Same-typed expiring records that are candidates for a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionGroup {
    pub record_type: RecordType,
    pub ids: Vec<String>,
    pub stale: usize,
}

impl Mulch {
    /// Remove stale records from every domain.
    ///
    /// Each domain is its own locked cycle; with `dry_run` nothing is
    /// written. Domains with nothing to prune are left out of the report.
    pub fn prune(&self, now: DateTime<Utc>, dry_run: bool) -> Result<Vec<PruneReport>> {
        let shelf_life = *self.config.shelf_life();
        let mut reports = Vec::new();

        for domain in self.domains() {
            let report = self.mutate_domain(domain, |records| {
                let pruned: Vec<ExpertiseRecord> = records
                    .iter()
                    .filter(|r| is_stale(r, &shelf_life, now))
                    .cloned()
                    .collect();
                let report = PruneReport {
                    domain: domain.clone(),
                    remaining: records.len() - pruned.len(),
                    pruned,
                };
                if dry_run || report.pruned.is_empty() {
                    return Ok((report, WriteBack::Unchanged));
                }
                records.retain(|r| !is_stale(r, &shelf_life, now));
                Ok((report, WriteBack::Rewrite))
            })?;

            if !report.pruned.is_empty() {
                log::debug!(
                    "{} {} stale record(s) from '{}'",
                    if dry_run { "would prune" } else { "pruned" },
                    report.pruned.len(),
                    domain
                );
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Per-domain summary. Takes no locks.
    pub fn status(&self, now: DateTime<Utc>) -> Result<Vec<DomainStatus>> {
        let shelf_life = self.config.shelf_life();
        let stale_after = self.lock_options().stale_after;

        self.domains()
            .iter()
            .map(|domain| {
                let records = self.read_domain(domain)?;
                let path = self.domain_file(domain);
                Ok(DomainStatus {
                    domain: domain.clone(),
                    count: records.len(),
                    health: self.config.governance.health(records.len()),
                    stale: records
                        .iter()
                        .filter(|r| is_stale(r, shelf_life, now))
                        .count(),
                    last_modified: store::get_mod_time(&path)?,
                    lock: lock_status(&path, stale_after),
                })
            })
            .collect()
    }

    /// Scan every domain file and collect every problem in one pass.
    pub fn validate(&self) -> Result<Vec<DomainValidation>> {
        self.domains()
            .iter()
            .map(|domain| {
                let report = store::scan(&self.domain_path(domain)?)?;
                Ok(DomainValidation {
                    domain: domain.clone(),
                    records: report.records.len(),
                    problems: report.problems,
                })
            })
            .collect()
    }

    /// Groups of two or more expiring records of the same type where at least
    /// one has gone stale. Read-only.
    pub fn compact_candidates(
        &self,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<CompactionGroup>> {
        let shelf_life = self.config.shelf_life();
        let records = self.read_domain(domain)?;

        let mut order: Vec<RecordType> = Vec::new();
        let mut groups: HashMap<RecordType, CompactionGroup> = HashMap::new();
        let expiring = records
            .iter()
            .filter(|r| shelf_life.days_for(r.classification()).is_some());
        for record in expiring {
            let record_type = record.record_type();
            let group = groups.entry(record_type).or_insert_with(|| {
                order.push(record_type);
                CompactionGroup {
                    record_type,
                    ids: Vec::new(),
                    stale: 0,
                }
            });
            if let Some(id) = record.id() {
                group.ids.push(id.to_string());
            }
            if is_stale(record, shelf_life, now) {
                group.stale += 1;
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|t| groups.remove(&t))
            .filter(|g| g.ids.len() >= 2 && g.stale > 0)
            .collect())
    }
}
