//! Expertise record types.
//!
//! One JSON object per line on disk. The variant is carried in a `"type"`
//! field; the fields shared by every variant live in [`RecordMeta`] and are
//! flattened alongside the variant's own fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Durability tier controlling staleness.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
    Display,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Classification {
    /// Never goes stale.
    Foundational,
    Tactical,
    Observational,
}

/// Discriminant of [`RecordBody`], used for filters and id hashing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
    Display,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecordType {
    Convention,
    Pattern,
    Failure,
    Decision,
    Reference,
    Guide,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
    Display,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failure,
    Partial,
}

/// Result of applying a record's guidance. Appended, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub recorded_at: DateTime<Utc>,
    /// Wall-clock milliseconds spent applying the guidance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<String>,
}

impl Outcome {
    pub fn new(status: OutcomeStatus) -> Self {
        Self {
            status,
            recorded_at: Utc::now(),
            duration: None,
            agent: None,
            notes: None,
            test_results: None,
        }
    }
}

/// Pointers to the work that produced a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bead: Option<String>,
}

impl Evidence {
    pub fn is_empty(&self) -> bool {
        self.commit.is_none()
            && self.date.is_none()
            && self.issue.is_none()
            && self.file.is_none()
            && self.bead.is_none()
    }
}

/// Variant-specific payload. The serde tag doubles as the on-disk `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecordBody {
    Convention {
        content: String,
    },
    Pattern {
        name: String,
        description: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files: Vec<String>,
    },
    Failure {
        description: String,
        resolution: String,
    },
    Decision {
        title: String,
        rationale: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date: Option<String>,
    },
    Reference {
        name: String,
        description: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files: Vec<String>,
    },
    Guide {
        name: String,
        description: String,
    },
}

impl RecordBody {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordBody::Convention { .. } => RecordType::Convention,
            RecordBody::Pattern { .. } => RecordType::Pattern,
            RecordBody::Failure { .. } => RecordType::Failure,
            RecordBody::Decision { .. } => RecordType::Decision,
            RecordBody::Reference { .. } => RecordType::Reference,
            RecordBody::Guide { .. } => RecordType::Guide,
        }
    }

    /// The field the id is derived from.
    pub fn defining_key(&self) -> &str {
        match self {
            RecordBody::Convention { content } => content,
            RecordBody::Failure { description, .. } => description,
            RecordBody::Decision { title, .. } => title,
            RecordBody::Pattern { name, .. }
            | RecordBody::Reference { name, .. }
            | RecordBody::Guide { name, .. } => name,
        }
    }

    /// Named variants are upserted on their key; unnamed ones are skipped
    /// when their key is already stored.
    pub fn is_named(&self) -> bool {
        match self {
            RecordBody::Convention { .. } | RecordBody::Failure { .. } => false,
            RecordBody::Pattern { .. }
            | RecordBody::Decision { .. }
            | RecordBody::Reference { .. }
            | RecordBody::Guide { .. } => true,
        }
    }

    pub fn files(&self) -> &[String] {
        match self {
            RecordBody::Pattern { files, .. } | RecordBody::Reference { files, .. } => files,
            RecordBody::Convention { .. }
            | RecordBody::Failure { .. }
            | RecordBody::Decision { .. }
            | RecordBody::Guide { .. } => &[],
        }
    }

    /// Searchable text per field name, excluding tags.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            RecordBody::Convention { content } => vec![("content", content.clone())],
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
                let mut fields = vec![("name", name.clone()), ("description", description.clone())];
                if !files.is_empty() {
                    fields.push(("files", files.join(" ")));
                }
                fields
            }
            RecordBody::Failure {
                description,
                resolution,
            } => vec![
                ("description", description.clone()),
                ("resolution", resolution.clone()),
            ],
            RecordBody::Decision {
                title, rationale, ..
            } => vec![("title", title.clone()), ("rationale", rationale.clone())],
            RecordBody::Guide { name, description } => {
                vec![("name", name.clone()), ("description", description.clone())]
            }
        }
    }
}

/// Fields common to every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub classification: Classification,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Opaque ids, resolved on demand; never followed eagerly.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relates_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supersedes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<Outcome>,
}

impl RecordMeta {
    pub fn new(classification: Classification) -> Self {
        Self {
            id: None,
            classification,
            recorded_at: Utc::now(),
            evidence: None,
            tags: Vec::new(),
            relates_to: Vec::new(),
            supersedes: Vec::new(),
            outcomes: Vec::new(),
        }
    }
}

/// A single expertise entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertiseRecord {
    #[serde(flatten)]
    pub body: RecordBody,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl ExpertiseRecord {
    pub fn new(body: RecordBody, classification: Classification) -> Self {
        Self {
            body,
            meta: RecordMeta::new(classification),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.meta.id.as_deref()
    }

    pub fn record_type(&self) -> RecordType {
        self.body.record_type()
    }

    pub fn classification(&self) -> Classification {
        self.meta.classification
    }

    /// One-line label for listings: the name, title, or leading content.
    pub fn headline(&self) -> &str {
        self.body.defining_key()
    }

    /// Same variant and same defining field, so the two would share an id.
    pub fn same_subject(&self, other: &ExpertiseRecord) -> bool {
        self.record_type() == other.record_type()
            && self.body.defining_key() == other.body.defining_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(name: &str) -> ExpertiseRecord {
        ExpertiseRecord::new(
            RecordBody::Pattern {
                name: name.to_string(),
                description: "use a guard".to_string(),
                files: vec!["src/lock.rs".to_string()],
            },
            Classification::Foundational,
        )
    }

    #[test]
    fn test_serializes_flat_with_type_tag() {
        let mut record = pattern("lock-guard");
        record.meta.id = Some("mx-abc123".to_string());
        record.meta.tags = vec!["concurrency".to_string()];
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["type"], "pattern");
        assert_eq!(json["name"], "lock-guard");
        assert_eq!(json["id"], "mx-abc123");
        assert_eq!(json["classification"], "foundational");
        assert_eq!(json["tags"][0], "concurrency");
        // empty collections are omitted
        assert!(json.get("outcomes").is_none());
        assert!(json.get("supersedes").is_none());
    }

    #[test]
    fn test_deserializes_minimal_line() {
        let line = r#"{"type":"convention","content":"Use cargo fmt","classification":"tactical","recorded_at":"2025-01-02T03:04:05Z"}"#;
        let record: ExpertiseRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.record_type(), RecordType::Convention);
        assert_eq!(record.classification(), Classification::Tactical);
        assert!(record.id().is_none());
        assert!(record.meta.tags.is_empty());
        assert_eq!(record.headline(), "Use cargo fmt");
    }

    #[test]
    fn test_deserializes_outcomes() {
        let line = r#"{"type":"failure","description":"d","resolution":"r","classification":"observational","recorded_at":"2025-01-02T03:04:05Z","outcomes":[{"status":"partial","recorded_at":"2025-01-03T00:00:00Z","agent":"builder"}]}"#;
        let record: ExpertiseRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.meta.outcomes.len(), 1);
        assert_eq!(record.meta.outcomes[0].status, OutcomeStatus::Partial);
        assert_eq!(record.meta.outcomes[0].agent.as_deref(), Some("builder"));
    }

    #[test]
    fn test_rejects_unknown_type() {
        let line = r#"{"type":"rumor","content":"x","classification":"tactical","recorded_at":"2025-01-02T03:04:05Z"}"#;
        assert!(serde_json::from_str::<ExpertiseRecord>(line).is_err());
    }

    #[test]
    fn test_strum_names_match_serde_names() {
        use std::str::FromStr;
        assert_eq!(RecordType::from_str("decision").unwrap(), RecordType::Decision);
        assert_eq!(RecordType::Guide.as_ref(), "guide");
        assert_eq!(Classification::Observational.to_string(), "observational");
        assert!(OutcomeStatus::from_str("meh").is_err());
    }

    #[test]
    fn test_named_subjects_compare_by_key() {
        let a = pattern("lock-guard");
        let mut b = pattern("lock-guard");
        b.body = RecordBody::Pattern {
            name: "lock-guard".to_string(),
            description: "different".to_string(),
            files: vec![],
        };
        assert!(a.same_subject(&b));
        assert!(!a.same_subject(&pattern("other")));
    }

    #[test]
    fn test_unnamed_subjects_compare_by_key() {
        let a = ExpertiseRecord::new(
            RecordBody::Failure {
                description: "flaky".to_string(),
                resolution: "retry".to_string(),
            },
            Classification::Tactical,
        );
        let mut b = a.clone();
        assert!(a.same_subject(&b));
        b.body = RecordBody::Failure {
            description: "flaky".to_string(),
            resolution: "pin version".to_string(),
        };
        assert!(a.same_subject(&b));
        b.body = RecordBody::Failure {
            description: "slow".to_string(),
            resolution: "retry".to_string(),
        };
        assert!(!a.same_subject(&b));
    }

    #[test]
    fn test_text_fields_include_files_only_when_present() {
        let fields = pattern("x").body.text_fields();
        let names: Vec<&str> = fields.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["name", "description", "files"]);

        let guide = RecordBody::Guide {
            name: "g".to_string(),
            description: "d".to_string(),
        };
        assert_eq!(guide.text_fields().len(), 2);
    }
}
