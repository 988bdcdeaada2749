//! Confirmation scoring: how often a record's guidance has worked.

use crate::record::{ExpertiseRecord, OutcomeStatus};

/// Default multiplier for [`apply_boost`].
pub const DEFAULT_BOOST_FACTOR: f64 = 0.1;

fn weighted_confirmations(record: &ExpertiseRecord) -> f64 {
    record
        .meta
        .outcomes
        .iter()
        .map(|o| match o.status {
            OutcomeStatus::Success => 1.0,
            OutcomeStatus::Partial => 0.5,
            OutcomeStatus::Failure => 0.0,
        })
        .sum()
}

/// Successes plus half-weighted partials. Failures count for nothing.
pub fn confirmation_score(record: &ExpertiseRecord) -> f64 {
    weighted_confirmations(record)
}

/// Weighted confirmations over total outcomes; 0 with no outcomes.
pub fn success_rate(record: &ExpertiseRecord) -> f64 {
    let total = record.meta.outcomes.len();
    if total == 0 {
        return 0.0;
    }
    weighted_confirmations(record) / total as f64
}

/// Scale a relevance score by the record's confirmations.
///
/// Unconfirmed records keep `base` exactly.
pub fn apply_boost(base: f64, record: &ExpertiseRecord, factor: f64) -> f64 {
    let confirmations = confirmation_score(record);
    if confirmations == 0.0 {
        base
    } else {
        base * (1.0 + factor * confirmations)
    }
}

/// Stable sort, most-confirmed first. Records with equal scores (including
/// the unconfirmed ones at the tail) keep their input order.
pub fn sort_by_score(records: &mut [ExpertiseRecord]) {
    records.sort_by(|a, b| confirmation_score(b).total_cmp(&confirmation_score(a)));
}
