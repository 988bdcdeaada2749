//! Output handling for the CLI.
//!
//! `OutputHandler` renders every command result either as human text or as
//! one JSON document on stdout. The presentation flags live on the handler
//! and are passed in from `main`; nothing here reads global state.

use mulch_core::scoring::{confirmation_score, sort_by_score, success_rate};
use mulch_core::{
    CompactResult, CompactionGroup, DomainStatus, DomainValidation, ExpertiseRecord, MulchError,
    OutcomeResult, PruneReport, RecordBody, RecordResult, RecordType, SearchHit,
};
use serde_json::{Value, json};
use strum::IntoEnumIterator;

/// A completed mutation, reported once per command.
pub enum CommandEvent<'a> {
    Initialized {
        created: bool,
    },
    DomainAdded {
        domain: &'a str,
        added: bool,
    },
    Recorded {
        domain: &'a str,
        results: &'a [RecordResult],
    },
    Edited {
        domain: &'a str,
        record: &'a ExpertiseRecord,
    },
    Deleted {
        domain: &'a str,
        record: &'a ExpertiseRecord,
    },
    OutcomeAppended {
        domain: &'a str,
        result: &'a OutcomeResult,
    },
    Compacted {
        domain: &'a str,
        result: &'a CompactResult,
    },
    Pruned {
        reports: &'a [PruneReport],
        dry_run: bool,
    },
}

fn to_json(record: &ExpertiseRecord) -> Value {
    serde_json::to_value(record).unwrap_or_else(|e| {
        log::warn!("could not serialize record {}: {}", record_id(record), e);
        Value::Null
    })
}

fn record_id(record: &ExpertiseRecord) -> &str {
    record.id().unwrap_or("-")
}

/// One-line listing entry: `[mx-1a2b3c] pattern (tactical) name #tag`.
pub fn format_record(record: &ExpertiseRecord) -> String {
    let mut line = format!(
        "[{}] {} ({}) {}",
        record_id(record),
        record.record_type(),
        record.classification(),
        record.headline()
    );
    for tag in &record.meta.tags {
        line.push_str(" #");
        line.push_str(tag);
    }
    if !record.meta.outcomes.is_empty() {
        line.push_str(&format!(
            " [{} outcome(s), {:.0}% success]",
            record.meta.outcomes.len(),
            success_rate(record) * 100.0
        ));
    }
    line
}

fn heading(record_type: RecordType) -> &'static str {
    match record_type {
        RecordType::Convention => "Conventions",
        RecordType::Pattern => "Patterns",
        RecordType::Failure => "Known Failures",
        RecordType::Decision => "Decisions",
        RecordType::Reference => "References",
        RecordType::Guide => "Guides",
    }
}

fn prime_entry(record: &ExpertiseRecord) -> String {
    let id = record_id(record);
    match &record.body {
        RecordBody::Convention { content } => format!("- {} ({})", content, id),
        RecordBody::Pattern {
            name,
            description,
            files,
        }
        | RecordBody::Reference {
            name,
            description,
            files,
        } => {
            let mut entry = format!("- **{}**: {} ({})", name, description, id);
            if !files.is_empty() {
                entry.push_str(&format!("\n  Files: {}", files.join(", ")));
            }
            entry
        }
        RecordBody::Failure {
            description,
            resolution,
        } => format!("- {} ({})\n  Fix: {}", description, id, resolution),
        RecordBody::Decision {
            title, rationale, ..
        } => format!("- **{}**: {} ({})", title, rationale, id),
        RecordBody::Guide { name, description } => {
            format!("- **{}**: {} ({})", name, description, id)
        }
    }
}

/// Markdown for agent context: one section per domain, records grouped by
/// type, best-confirmed first within each group.
pub fn format_prime(domains: &[(String, Vec<ExpertiseRecord>)]) -> String {
    let mut out = String::from("# Project Expertise (via mulch)\n");
    for (domain, records) in domains {
        out.push_str(&format!("\n## {} ({} records)\n", domain, records.len()));
        for record_type in RecordType::iter() {
            let mut group: Vec<ExpertiseRecord> = records
                .iter()
                .filter(|r| r.record_type() == record_type)
                .cloned()
                .collect();
            if group.is_empty() {
                continue;
            }
            sort_by_score(&mut group);
            out.push_str(&format!("\n### {}\n", heading(record_type)));
            for record in &group {
                out.push_str(&prime_entry(record));
                out.push('\n');
            }
        }
    }
    out
}

/// CLI output handler: results to stdout, diagnostics to stderr.
pub struct OutputHandler {
    json: bool,
    quiet: bool,
}

impl OutputHandler {
    pub fn new(json: bool, quiet: bool) -> Self {
        Self { json, quiet }
    }

    /// Print a command's primary result. Shown even with `--quiet`.
    pub fn emit_result(&self, text: &str, value: Value) {
        if self.json {
            println!("{}", value);
        } else if !text.is_empty() {
            println!("{}", text);
        }
    }

    /// Report a completed mutation. In text mode `--quiet` hides it.
    pub fn emit_event(&self, event: CommandEvent) {
        let (text, value) = render_event(&event);
        if self.json {
            println!("{}", value);
        } else if !self.quiet {
            println!("{}", text);
        }
    }

    /// Advisory message on stderr, hidden by `--quiet` and in JSON mode.
    pub fn diagnostic(&self, message: &str) {
        if !self.quiet && !self.json {
            eprintln!("{}", message);
        }
    }

    pub fn emit_error(&self, err: &MulchError) {
        if self.json {
            let value = json!({
                "success": false,
                "error": { "kind": err.kind(), "message": err.to_string() },
            });
            println!("{}", value);
        } else {
            eprintln!("Error: {}", err);
        }
    }

    pub fn emit_records(&self, records: &[(String, ExpertiseRecord)]) {
        let text = records
            .iter()
            .map(|(domain, r)| format!("{}: {}", domain, format_record(r)))
            .collect::<Vec<_>>()
            .join("\n");
        let value = json!({
            "success": true,
            "records": records
                .iter()
                .map(|(domain, r)| json!({ "domain": domain, "record": to_json(r) }))
                .collect::<Vec<_>>(),
        });
        self.emit_result(&text, value);
    }

    pub fn emit_search(&self, query: &str, hits: &[SearchHit]) {
        let text = if hits.is_empty() {
            format!("No matches for '{}'", query)
        } else {
            hits.iter()
                .map(|h| {
                    format!(
                        "{:>7.3}  {}: {}  (matched: {})",
                        h.score,
                        h.domain,
                        format_record(&h.record),
                        h.matched_fields.join(", ")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        let value = json!({
            "success": true,
            "query": query,
            "hits": hits
                .iter()
                .map(|h| json!({
                    "domain": h.domain,
                    "score": h.score,
                    "matched_fields": h.matched_fields,
                    "confirmation_score": confirmation_score(&h.record),
                    "record": to_json(&h.record),
                }))
                .collect::<Vec<_>>(),
        });
        self.emit_result(&text, value);
    }

    pub fn emit_status(&self, statuses: &[DomainStatus]) {
        let text = if statuses.is_empty() {
            "No domains. Add one with `mulch add <domain>`.".to_string()
        } else {
            statuses
                .iter()
                .map(|s| {
                    let mut line = format!(
                        "{}: {} record(s), {}, {} stale",
                        s.domain,
                        s.count,
                        s.health.as_str(),
                        s.stale
                    );
                    if let Some(at) = s.last_modified {
                        line.push_str(&format!(", modified {}", at.format("%Y-%m-%d %H:%M")));
                    }
                    if let Some(lock) = s.lock {
                        line.push_str(&format!(", lock {}", lock.as_str()));
                    }
                    line
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        let value = json!({
            "success": true,
            "domains": statuses
                .iter()
                .map(|s| json!({
                    "domain": s.domain,
                    "count": s.count,
                    "health": s.health,
                    "stale": s.stale,
                    "last_modified": s.last_modified.map(|t| t.to_rfc3339()),
                    "lock": s.lock.map(|l| l.as_str()),
                }))
                .collect::<Vec<_>>(),
        });
        self.emit_result(&text, value);
    }

    /// Returns whether every domain was clean.
    pub fn emit_validation(&self, reports: &[DomainValidation]) -> bool {
        let valid = reports.iter().all(|r| r.problems.is_empty());
        let mut lines = Vec::new();
        for report in reports {
            if report.problems.is_empty() {
                lines.push(format!("{}: ok ({} records)", report.domain, report.records));
            }
            for problem in &report.problems {
                lines.push(format!(
                    "{}:{}: {}",
                    report.domain, problem.line, problem.message
                ));
            }
        }
        let value = json!({
            "success": true,
            "valid": valid,
            "domains": reports
                .iter()
                .map(|r| json!({
                    "domain": r.domain,
                    "records": r.records,
                    "problems": r.problems
                        .iter()
                        .map(|p| json!({ "line": p.line, "message": p.message }))
                        .collect::<Vec<_>>(),
                }))
                .collect::<Vec<_>>(),
        });
        self.emit_result(&lines.join("\n"), value);
        valid
    }

    pub fn emit_candidates(&self, domain: &str, groups: &[CompactionGroup]) {
        let text = if groups.is_empty() {
            format!("{}: nothing to compact", domain)
        } else {
            groups
                .iter()
                .map(|g| {
                    format!(
                        "{} x{} ({} stale): {}",
                        g.record_type,
                        g.ids.len(),
                        g.stale,
                        g.ids.join(" ")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        let value = json!({
            "success": true,
            "domain": domain,
            "candidates": groups
                .iter()
                .map(|g| json!({ "type": g.record_type, "ids": g.ids, "stale": g.stale }))
                .collect::<Vec<_>>(),
        });
        self.emit_result(&text, value);
    }

    pub fn emit_prime(&self, domains: &[(String, Vec<ExpertiseRecord>)]) {
        let value = json!({
            "success": true,
            "domains": domains
                .iter()
                .map(|(domain, records)| json!({
                    "domain": domain,
                    "records": records.iter().map(to_json).collect::<Vec<_>>(),
                }))
                .collect::<Vec<_>>(),
        });
        self.emit_result(&format_prime(domains), value);
    }
}

fn render_event(event: &CommandEvent) -> (String, Value) {
    match event {
        CommandEvent::Initialized { created } => (
            if *created {
                "Initialized .mulch/".to_string()
            } else {
                ".mulch/ already initialized".to_string()
            },
            json!({ "success": true, "created": created }),
        ),
        CommandEvent::DomainAdded { domain, added } => (
            if *added {
                format!("Added domain '{}'", domain)
            } else {
                format!("Domain '{}' already exists", domain)
            },
            json!({ "success": true, "domain": domain, "added": added }),
        ),
        CommandEvent::Recorded { domain, results } => {
            let text = results
                .iter()
                .map(|r| format!("{} {} in '{}'", r.action.as_str(), r.id, domain))
                .collect::<Vec<_>>()
                .join("\n");
            let value = json!({
                "success": true,
                "domain": domain,
                "results": results
                    .iter()
                    .map(|r| json!({
                        "action": r.action.as_str(),
                        "id": r.id,
                        "count": r.count,
                        "health": r.health,
                    }))
                    .collect::<Vec<_>>(),
            });
            (text, value)
        }
        CommandEvent::Edited { domain, record } => (
            format!("updated {} in '{}'", record_id(record), domain),
            json!({ "success": true, "domain": domain, "record": to_json(record) }),
        ),
        CommandEvent::Deleted { domain, record } => (
            format!("deleted {} from '{}'", record_id(record), domain),
            json!({ "success": true, "domain": domain, "record": to_json(record) }),
        ),
        CommandEvent::OutcomeAppended { domain, result } => (
            format!(
                "recorded outcome for {} ({} total, confirmation {:.1})",
                result.id, result.outcome_count, result.confirmation_score
            ),
            json!({
                "success": true,
                "domain": domain,
                "id": result.id,
                "outcome_count": result.outcome_count,
                "confirmation_score": result.confirmation_score,
            }),
        ),
        CommandEvent::Compacted { domain, result } => (
            format!(
                "compacted {} record(s) into {} ({} left in '{}')",
                result.superseded.len(),
                result.id,
                result.count,
                domain
            ),
            json!({
                "success": true,
                "domain": domain,
                "id": result.id,
                "superseded": result.superseded,
                "count": result.count,
            }),
        ),
        CommandEvent::Pruned { reports, dry_run } => {
            let verb = if *dry_run { "would prune" } else { "pruned" };
            let text = if reports.is_empty() {
                "Nothing stale".to_string()
            } else {
                reports
                    .iter()
                    .map(|r| {
                        format!(
                            "{} {} from '{}' ({} remaining)",
                            verb,
                            r.pruned.len(),
                            r.domain,
                            r.remaining
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            let value = json!({
                "success": true,
                "dry_run": dry_run,
                "domains": reports
                    .iter()
                    .map(|r| json!({
                        "domain": r.domain,
                        "pruned": r.pruned.iter().map(record_id).collect::<Vec<_>>(),
                        "remaining": r.remaining,
                    }))
                    .collect::<Vec<_>>(),
            });
            (text, value)
        }
    }
}
