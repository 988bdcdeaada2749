//! Read-side operations: filtered listing, ranked search, recent records.
//!
//! None of these take a lock. Writers replace domain files atomically, so a
//! reader always sees either the old or the new contents.

use crate::error::Result;
use crate::record::{Classification, ExpertiseRecord, RecordType};
use crate::scoring::{DEFAULT_BOOST_FACTOR, apply_boost};
use crate::search;
use chrono::{DateTime, Utc};

use super::Mulch;

/// Conjunctive record filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub record_type: Option<RecordType>,
    pub classification: Option<Classification>,
    /// Exact tag match.
    pub tag: Option<String>,
    /// Substring of any entry in the record's `files`.
    pub file: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &ExpertiseRecord) -> bool {
        if self.record_type.is_some_and(|t| t != record.record_type()) {
            return false;
        }
        if self
            .classification
            .is_some_and(|c| c != record.classification())
        {
            return false;
        }
        if let Some(tag) = &self.tag
            && !record.meta.tags.iter().any(|t| t == tag)
        {
            return false;
        }
        if let Some(file) = &self.file
            && !record.body.files().iter().any(|f| f.contains(file.as_str()))
        {
            return false;
        }
        true
    }
}

/// A ranked search result with the domain it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub domain: String,
    pub record: ExpertiseRecord,
    /// BM25 score after the confirmation boost.
    pub score: f64,
    pub matched_fields: Vec<&'static str>,
}

impl Mulch {
    /// Records of one domain matching `filter`, in file order.
    pub fn query(&self, domain: &str, filter: &RecordFilter) -> Result<Vec<ExpertiseRecord>> {
        Ok(self
            .read_domain(domain)?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    /// Rank records across `domains` (every domain when empty).
    ///
    /// BM25 statistics are computed per domain over the filtered records, so
    /// a term that is common in one domain does not dilute another. Scores
    /// are then boosted by confirmations and merged; ties keep domain order
    /// followed by rank within the domain.
    pub fn search(
        &self,
        query: &str,
        domains: &[String],
        filter: &RecordFilter,
    ) -> Result<Vec<SearchHit>> {
        let domains = if domains.is_empty() {
            self.domains()
        } else {
            domains
        };

        let mut hits = Vec::new();
        for domain in domains {
            let records = self.query(domain, filter)?;
            for result in search::search(&records, query) {
                let record = &records[result.index];
                hits.push(SearchHit {
                    domain: domain.clone(),
                    score: apply_boost(result.score, record, DEFAULT_BOOST_FACTOR),
                    record: record.clone(),
                    matched_fields: result.matched_fields,
                });
            }
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        log::debug!("search '{}' matched {} record(s)", query, hits.len());
        Ok(hits)
    }

    /// Records written after `since` in every domain, newest first.
    pub fn ready(&self, since: DateTime<Utc>) -> Result<Vec<(String, ExpertiseRecord)>> {
        let mut recent = Vec::new();
        for domain in self.domains() {
            recent.extend(
                self.read_domain(domain)?
                    .into_iter()
                    .filter(|r| r.meta.recorded_at > since)
                    .map(|r| (domain.clone(), r)),
            );
        }
        recent.sort_by(|(_, a), (_, b)| b.meta.recorded_at.cmp(&a.meta.recorded_at));
        Ok(recent)
    }
}
