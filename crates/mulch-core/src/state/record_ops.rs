//! Record mutations: record, edit, delete, outcome, compact.

use crate::config::DomainHealth;
use crate::error::{MulchError, Result};
use crate::id::{ensure_id, generate_id, resolve};
use crate::record::{Classification, Evidence, ExpertiseRecord, Outcome, RecordBody};
use crate::scoring::confirmation_score;

use super::{Mulch, WriteBack};

/// What [`Mulch::record`] did with an incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    /// Appended as a new record.
    Created,
    /// Replaced a named record with the same key.
    Updated,
    /// Identical unnamed record already present; nothing written.
    Skipped,
}

impl RecordAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordAction::Created => "created",
            RecordAction::Updated => "updated",
            RecordAction::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordResult {
    pub action: RecordAction,
    pub id: String,
    /// Domain size after the write.
    pub count: usize,
    pub health: DomainHealth,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeResult {
    pub id: String,
    pub outcome_count: usize,
    pub confirmation_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactResult {
    pub id: String,
    pub superseded: Vec<String>,
    pub count: usize,
}

/// Field changes for [`Mulch::edit`]. `None` leaves a field alone.
///
/// Variant fields are only accepted on variants that have them; setting
/// `resolution` on a pattern is an error rather than a silent no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub classification: Option<Classification>,
    pub tags: Option<Vec<String>>,
    pub relates_to: Option<Vec<String>>,
    pub supersedes: Option<Vec<String>>,
    pub evidence: Option<Evidence>,
    pub content: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub resolution: Option<String>,
    pub rationale: Option<String>,
    pub date: Option<String>,
    pub files: Option<Vec<String>>,
}

fn inapplicable(field: &str, body: &RecordBody) -> MulchError {
    MulchError::InvalidInput(format!(
        "field '{}' does not apply to {} records",
        field,
        body.record_type()
    ))
}

fn set_field<T: Clone>(
    slot: Option<&mut T>,
    value: &Option<T>,
    field: &str,
    body: &RecordBody,
) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    match slot {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(inapplicable(field, body)),
    }
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }

    fn apply_body(&self, body: &mut RecordBody) -> Result<()> {
        let snapshot = body.clone();
        let (content, name, title, description, resolution, rationale, date, files) = match body {
            RecordBody::Convention { content } => {
                (Some(content), None, None, None, None, None, None, None)
            }
            RecordBody::Pattern {
                name,
                description,
                files,
            }
            | RecordBody::Reference {
                name,
                description,
                files,
            } => (None, Some(name), None, Some(description), None, None, None, Some(files)),
            RecordBody::Failure {
                description,
                resolution,
            } => (None, None, None, Some(description), Some(resolution), None, None, None),
            RecordBody::Decision {
                title,
                rationale,
                date,
            } => (None, None, Some(title), None, None, Some(rationale), Some(date), None),
            RecordBody::Guide { name, description } => {
                (None, Some(name), None, Some(description), None, None, None, None)
            }
        };

        set_field(content, &self.content, "content", &snapshot)?;
        set_field(name, &self.name, "name", &snapshot)?;
        set_field(title, &self.title, "title", &snapshot)?;
        set_field(description, &self.description, "description", &snapshot)?;
        set_field(resolution, &self.resolution, "resolution", &snapshot)?;
        set_field(rationale, &self.rationale, "rationale", &snapshot)?;
        set_field(files, &self.files, "files", &snapshot)?;
        if let Some(d) = &self.date {
            match date {
                Some(slot) => *slot = Some(d.clone()),
                None => return Err(inapplicable("date", &snapshot)),
            }
        }
        Ok(())
    }

    /// Apply the patch to a record in place.
    pub fn apply(&self, record: &mut ExpertiseRecord) -> Result<()> {
        self.apply_body(&mut record.body)?;
        let meta = &mut record.meta;
        if let Some(c) = self.classification {
            meta.classification = c;
        }
        if let Some(tags) = &self.tags {
            meta.tags = tags.clone();
        }
        if let Some(relates_to) = &self.relates_to {
            meta.relates_to = relates_to.clone();
        }
        if let Some(supersedes) = &self.supersedes {
            meta.supersedes = supersedes.clone();
        }
        if let Some(evidence) = &self.evidence {
            meta.evidence = (!evidence.is_empty()).then(|| evidence.clone());
        }
        Ok(())
    }
}

/// Fold an incoming record into a domain's records.
///
/// Named variants replace the record with the same key, keeping its id and
/// its outcome history. Unnamed variants are skipped when one with the same
/// key exists, unless `force` is set.
pub(crate) fn merge_record(
    records: &mut Vec<ExpertiseRecord>,
    mut incoming: ExpertiseRecord,
    force: bool,
) -> (RecordAction, String) {
    let existing = records.iter().position(|r| r.same_subject(&incoming));

    match existing {
        Some(index) if incoming.body.is_named() => {
            let stored = &mut records[index];
            ensure_id(stored);
            incoming.meta.id = stored.meta.id.clone();
            let mut outcomes = std::mem::take(&mut stored.meta.outcomes);
            outcomes.append(&mut incoming.meta.outcomes);
            incoming.meta.outcomes = outcomes;
            let id = incoming.meta.id.clone().unwrap_or_else(|| generate_id(&incoming.body));
            *stored = incoming;
            (RecordAction::Updated, id)
        }
        Some(index) if !force => {
            let id = records[index]
                .meta
                .id
                .clone()
                .unwrap_or_else(|| generate_id(&records[index].body));
            (RecordAction::Skipped, id)
        }
        _ => {
            ensure_id(&mut incoming);
            let id = incoming.meta.id.clone().unwrap_or_default();
            records.push(incoming);
            (RecordAction::Created, id)
        }
    }
}

fn record_id(record: &ExpertiseRecord) -> String {
    record
        .meta
        .id
        .clone()
        .unwrap_or_else(|| generate_id(&record.body))
}

impl Mulch {
    /// Store a record in a domain, upserting or deduplicating as appropriate.
    pub fn record(
        &self,
        domain: &str,
        record: ExpertiseRecord,
        force: bool,
    ) -> Result<RecordResult> {
        let governance = self.config.governance;
        let result = self.mutate_domain(domain, |records| {
            let (action, id) = merge_record(records, record, force);
            let write_back = match action {
                RecordAction::Created => WriteBack::AppendLast,
                RecordAction::Updated => WriteBack::Rewrite,
                RecordAction::Skipped => WriteBack::Unchanged,
            };
            let count = records.len();
            Ok((
                RecordResult {
                    action,
                    id,
                    count,
                    health: governance.health(count),
                },
                write_back,
            ))
        })?;

        if result.health != DomainHealth::Ok {
            log::warn!(
                "domain '{}' has {} records ({})",
                domain,
                result.count,
                result.health.as_str()
            );
        }
        Ok(result)
    }

    /// Store several records in one locked cycle and one atomic write.
    ///
    /// Later records in the batch see earlier ones, so a batch containing the
    /// same named record twice ends with one updated record.
    pub fn record_batch(
        &self,
        domain: &str,
        records: Vec<ExpertiseRecord>,
        force: bool,
    ) -> Result<Vec<RecordResult>> {
        let governance = self.config.governance;
        self.mutate_domain(domain, |stored| {
            let mut results = Vec::with_capacity(records.len());
            for record in records {
                let (action, id) = merge_record(stored, record, force);
                results.push((action, id));
            }
            let count = stored.len();
            let health = governance.health(count);
            let changed = results.iter().any(|(a, _)| *a != RecordAction::Skipped);
            let results = results
                .into_iter()
                .map(|(action, id)| RecordResult {
                    action,
                    id,
                    count,
                    health,
                })
                .collect();
            let write_back = if changed {
                WriteBack::Rewrite
            } else {
                WriteBack::Unchanged
            };
            Ok((results, write_back))
        })
    }

    /// Patch the record named by `token`.
    ///
    /// Changing a defining field moves the record to a new content-derived
    /// id; that id must not already belong to another record.
    pub fn edit(&self, domain: &str, token: &str, patch: &RecordPatch) -> Result<ExpertiseRecord> {
        if patch.is_empty() {
            return Err(MulchError::InvalidInput("nothing to edit".to_string()));
        }
        self.mutate_domain(domain, |records| {
            let index = resolve(records, token)?;
            let mut updated = records[index].clone();
            let old_key = updated.body.defining_key().to_string();
            patch.apply(&mut updated)?;

            if updated.body.defining_key() != old_key || updated.meta.id.is_none() {
                let new_id = generate_id(&updated.body);
                let collides = records
                    .iter()
                    .enumerate()
                    .any(|(i, r)| i != index && r.id() == Some(new_id.as_str()));
                if collides {
                    return Err(MulchError::InvalidInput(format!(
                        "edit would give record the id {} which is already in use",
                        new_id
                    )));
                }
                updated.meta.id = Some(new_id);
            }

            records[index] = updated.clone();
            Ok((updated, WriteBack::Rewrite))
        })
    }

    /// Remove the record named by `token`, returning it.
    pub fn delete(&self, domain: &str, token: &str) -> Result<ExpertiseRecord> {
        self.mutate_domain(domain, |records| {
            let index = resolve(records, token)?;
            Ok((records.remove(index), WriteBack::Rewrite))
        })
    }

    /// Append an outcome to the record named by `token`.
    pub fn append_outcome(&self, domain: &str, token: &str, outcome: Outcome) -> Result<OutcomeResult> {
        self.mutate_domain(domain, |records| {
            let index = resolve(records, token)?;
            let record = &mut records[index];
            record.meta.outcomes.push(outcome);
            let result = OutcomeResult {
                id: record_id(record),
                outcome_count: record.meta.outcomes.len(),
                confirmation_score: confirmation_score(record),
            };
            Ok((result, WriteBack::Rewrite))
        })
    }

    /// Replace the records named by `tokens` with one summary record.
    ///
    /// The summary takes the position of the earliest replaced record and
    /// lists every replaced id in `supersedes`.
    pub fn compact(
        &self,
        domain: &str,
        tokens: &[String],
        mut summary: ExpertiseRecord,
    ) -> Result<CompactResult> {
        if tokens.len() < 2 {
            return Err(MulchError::InvalidInput(
                "compaction needs at least two records".to_string(),
            ));
        }
        self.mutate_domain(domain, |records| {
            let mut indices = Vec::with_capacity(tokens.len());
            for token in tokens {
                let index = resolve(records, token)?;
                if indices.contains(&index) {
                    return Err(MulchError::InvalidInput(format!(
                        "'{}' names a record that is already being compacted",
                        token
                    )));
                }
                indices.push(index);
            }
            indices.sort_unstable();

            let superseded: Vec<String> = indices.iter().map(|&i| record_id(&records[i])).collect();
            for id in &superseded {
                if !summary.meta.supersedes.contains(id) {
                    summary.meta.supersedes.push(id.clone());
                }
            }

            ensure_id(&mut summary);
            let summary_id = record_id(&summary);
            let collides = records
                .iter()
                .enumerate()
                .any(|(i, r)| !indices.contains(&i) && r.id() == Some(summary_id.as_str()));
            if collides {
                return Err(MulchError::InvalidInput(format!(
                    "summary id {} is already used by a record that is not being compacted",
                    summary_id
                )));
            }

            let position = indices[0];
            for &i in indices.iter().rev() {
                records.remove(i);
            }
            records.insert(position, summary);

            Ok((
                CompactResult {
                    id: summary_id,
                    superseded,
                    count: records.len(),
                },
                WriteBack::Rewrite,
            ))
        })
    }
}
