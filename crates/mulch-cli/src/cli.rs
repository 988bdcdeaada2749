//! CLI argument parsing with clap.
//!
//! Subcommands map one-to-one onto [`mulch_core::Mulch`] operations. The
//! helpers here turn loose flag sets into core types (records, patches,
//! filters) and reject combinations that make no sense for a record type.

use chrono::{DateTime, TimeDelta, Utc};
use clap::{Args, Parser, Subcommand};
use mulch_core::{
    Classification, Evidence, ExpertiseRecord, MulchError, OutcomeStatus, RecordBody,
    RecordFilter, RecordPatch, RecordType, Result,
};
use std::path::PathBuf;
use std::str::FromStr;
use strum::IntoEnumIterator;

const CLI_AFTER_HELP: &str = "\
Project root: --root, else $MULCH_ROOT, else the current directory.
Logging: RUST_LOG overrides the default level (warn, or debug with --verbose).";

/// mulch - structured expertise records for a project
#[derive(Parser, Debug)]
#[command(
    name = "mulch",
    version,
    about = "Structured expertise records for a project",
    after_help = CLI_AFTER_HELP
)]
pub struct Cli {
    /// Emit structured JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress confirmations and diagnostics
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (directory containing .mulch)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create .mulch/ with a default config
    Init,

    /// Register a new domain
    Add { domain: String },

    /// Record an expertise entry (or a batch of JSON records from stdin)
    Record {
        domain: String,
        #[command(flatten)]
        fields: RecordFields,
        /// Read records from stdin as a JSON array or one object per line
        #[arg(long, conflicts_with = "record_type")]
        stdin: bool,
        /// Store unnamed records even when an identical one exists
        #[arg(long)]
        force: bool,
    },

    /// Change fields of an existing record
    Edit {
        domain: String,
        id: String,
        #[command(flatten)]
        fields: EditFields,
    },

    /// Remove a record
    Delete { domain: String, id: String },

    /// Report how applying a record's guidance went
    Outcome {
        domain: String,
        id: String,
        #[arg(long, value_parser = parse_choice::<OutcomeStatus>)]
        status: OutcomeStatus,
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Milliseconds spent
        #[arg(long)]
        duration: Option<f64>,
        #[arg(long)]
        test_results: Option<String>,
    },

    /// List records, optionally filtered
    Query {
        /// Domain to list (all domains when omitted)
        domain: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Ranked full-text search
    Search {
        query: String,
        /// Restrict to a domain (repeatable)
        #[arg(long = "domain", value_name = "DOMAIN")]
        domains: Vec<String>,
        #[arg(long = "type", value_parser = parse_choice::<RecordType>)]
        record_type: Option<RecordType>,
        #[arg(long)]
        tag: Option<String>,
    },

    /// Per-domain counts, health and staleness
    Status,

    /// Check every domain file for malformed lines and bad ids
    Validate,

    /// Remove records past their shelf life
    Prune {
        /// Report without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Replace several records with one summary, or list candidates
    Compact {
        domain: String,
        /// Records to replace
        ids: Vec<String>,
        /// List groups worth compacting instead of compacting
        #[arg(long, conflicts_with = "ids")]
        analyze: bool,
        #[command(flatten)]
        summary: RecordFields,
    },

    /// Records added recently
    Ready {
        /// Window such as 30m, 24h, 7d, or an RFC 3339 timestamp
        #[arg(long, default_value = "24h", value_parser = parse_since)]
        since: DateTime<Utc>,
    },

    /// Print all expertise as markdown for an agent's context
    Prime { domain: Option<String> },
}

/// Parse a strum enum, listing the accepted spellings on failure.
fn parse_choice<T>(s: &str) -> std::result::Result<T, String>
where
    T: FromStr + IntoEnumIterator + AsRef<str>,
{
    s.parse().map_err(|_| {
        let choices: Vec<String> = T::iter().map(|v| v.as_ref().to_string()).collect();
        format!("expected one of: {}", choices.join(", "))
    })
}

/// `--since` accepts a relative window or an absolute timestamp.
fn parse_since(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Ok(at.with_timezone(&Utc));
    }
    let Some((split, _)) = s.char_indices().last() else {
        return Err("empty window".to_string());
    };
    let (amount, unit) = s.split_at(split);
    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid window '{}' (try 24h or 7d)", s))?;
    let window = match unit {
        "m" => TimeDelta::try_minutes(amount),
        "h" => TimeDelta::try_hours(amount),
        "d" => TimeDelta::try_days(amount),
        _ => return Err(format!("unknown unit in '{}' (use m, h or d)", s)),
    };
    window
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| format!("window '{}' is out of range", s))
}

#[derive(Args, Debug, Default)]
pub struct EvidenceArgs {
    #[arg(id = "evidence_commit", long = "evidence-commit")]
    pub commit: Option<String>,
    #[arg(id = "evidence_date", long = "evidence-date")]
    pub date: Option<String>,
    #[arg(id = "evidence_issue", long = "evidence-issue")]
    pub issue: Option<String>,
    #[arg(id = "evidence_file", long = "evidence-file")]
    pub file: Option<String>,
    #[arg(id = "evidence_bead", long = "evidence-bead")]
    pub bead: Option<String>,
}

impl EvidenceArgs {
    /// `None` when no evidence flag was given.
    pub fn to_evidence(&self) -> Option<Evidence> {
        let evidence = Evidence {
            commit: self.commit.clone(),
            date: self.date.clone(),
            issue: self.issue.clone(),
            file: self.file.clone(),
            bead: self.bead.clone(),
        };
        (!evidence.is_empty()).then_some(evidence)
    }
}

/// Flags describing a new record.
#[derive(Args, Debug)]
pub struct RecordFields {
    #[arg(long = "type", value_parser = parse_choice::<RecordType>)]
    pub record_type: Option<RecordType>,
    #[arg(
        long,
        default_value = "tactical",
        value_parser = parse_choice::<Classification>
    )]
    pub classification: Classification,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub resolution: Option<String>,
    #[arg(long)]
    pub rationale: Option<String>,
    #[arg(long)]
    pub date: Option<String>,
    /// Comma-separated file paths
    #[arg(long, value_delimiter = ',')]
    pub files: Vec<String>,
    /// Comma-separated tags
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
    /// Comma-separated ids of related records
    #[arg(long, value_delimiter = ',')]
    pub relates_to: Vec<String>,
    /// Comma-separated ids this record replaces
    #[arg(long, value_delimiter = ',')]
    pub supersedes: Vec<String>,
    #[command(flatten)]
    pub evidence: EvidenceArgs,
}

fn required(value: &Option<String>, flag: &str, record_type: RecordType) -> Result<String> {
    value.clone().ok_or_else(|| {
        MulchError::InvalidInput(format!("{} records need --{}", record_type, flag))
    })
}

/// Variant flags each record type accepts.
fn accepted_flags(record_type: RecordType) -> &'static [&'static str] {
    match record_type {
        RecordType::Convention => &["content"],
        RecordType::Pattern | RecordType::Reference => &["name", "description", "files"],
        RecordType::Failure => &["description", "resolution"],
        RecordType::Decision => &["title", "rationale", "date"],
        RecordType::Guide => &["name", "description"],
    }
}

impl RecordFields {
    fn given_flags(&self) -> Vec<&'static str> {
        let options = [
            ("content", &self.content),
            ("name", &self.name),
            ("title", &self.title),
            ("description", &self.description),
            ("resolution", &self.resolution),
            ("rationale", &self.rationale),
            ("date", &self.date),
        ];
        let mut given: Vec<&'static str> = options
            .iter()
            .filter(|(_, v)| v.is_some())
            .map(|(flag, _)| *flag)
            .collect();
        if !self.files.is_empty() {
            given.push("files");
        }
        given
    }

    /// Build a record from the flags. `--type` is required here even though
    /// clap leaves it optional (so `compact --analyze` can omit it).
    pub fn to_record(&self) -> Result<ExpertiseRecord> {
        let record_type = self
            .record_type
            .ok_or_else(|| MulchError::InvalidInput("--type is required".to_string()))?;

        let accepted = accepted_flags(record_type);
        if let Some(flag) = self.given_flags().into_iter().find(|f| !accepted.contains(f)) {
            return Err(MulchError::InvalidInput(format!(
                "--{} does not apply to {} records",
                flag, record_type
            )));
        }

        let body = match record_type {
            RecordType::Convention => RecordBody::Convention {
                content: required(&self.content, "content", record_type)?,
            },
            RecordType::Pattern => RecordBody::Pattern {
                name: required(&self.name, "name", record_type)?,
                description: required(&self.description, "description", record_type)?,
                files: self.files.clone(),
            },
            RecordType::Reference => RecordBody::Reference {
                name: required(&self.name, "name", record_type)?,
                description: required(&self.description, "description", record_type)?,
                files: self.files.clone(),
            },
            RecordType::Failure => RecordBody::Failure {
                description: required(&self.description, "description", record_type)?,
                resolution: required(&self.resolution, "resolution", record_type)?,
            },
            RecordType::Decision => RecordBody::Decision {
                title: required(&self.title, "title", record_type)?,
                rationale: required(&self.rationale, "rationale", record_type)?,
                date: self.date.clone(),
            },
            RecordType::Guide => RecordBody::Guide {
                name: required(&self.name, "name", record_type)?,
                description: required(&self.description, "description", record_type)?,
            },
        };

        let mut record = ExpertiseRecord::new(body, self.classification);
        record.meta.tags = self.tags.clone();
        record.meta.relates_to = self.relates_to.clone();
        record.meta.supersedes = self.supersedes.clone();
        record.meta.evidence = self.evidence.to_evidence();
        Ok(record)
    }
}

/// Flags for `edit`. Unset flags leave the field alone.
#[derive(Args, Debug, Default)]
pub struct EditFields {
    #[arg(long, value_parser = parse_choice::<Classification>)]
    pub classification: Option<Classification>,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub resolution: Option<String>,
    #[arg(long)]
    pub rationale: Option<String>,
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long, value_delimiter = ',')]
    pub files: Option<Vec<String>>,
    #[arg(long, value_delimiter = ',')]
    pub tags: Option<Vec<String>>,
    #[arg(long, value_delimiter = ',')]
    pub relates_to: Option<Vec<String>>,
    #[arg(long, value_delimiter = ',')]
    pub supersedes: Option<Vec<String>>,
    #[command(flatten)]
    pub evidence: EvidenceArgs,
}

impl EditFields {
    pub fn to_patch(&self) -> RecordPatch {
        RecordPatch {
            classification: self.classification,
            tags: self.tags.clone(),
            relates_to: self.relates_to.clone(),
            supersedes: self.supersedes.clone(),
            evidence: self.evidence.to_evidence(),
            content: self.content.clone(),
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            resolution: self.resolution.clone(),
            rationale: self.rationale.clone(),
            date: self.date.clone(),
            files: self.files.clone(),
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    #[arg(long = "type", value_parser = parse_choice::<RecordType>)]
    pub record_type: Option<RecordType>,
    #[arg(long, value_parser = parse_choice::<Classification>)]
    pub classification: Option<Classification>,
    #[arg(long)]
    pub tag: Option<String>,
    /// Substring of a file path the record mentions
    #[arg(long)]
    pub file: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> RecordFilter {
        RecordFilter {
            record_type: self.record_type,
            classification: self.classification,
            tag: self.tag.clone(),
            file: self.file.clone(),
        }
    }
}
