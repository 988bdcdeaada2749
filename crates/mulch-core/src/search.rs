//! BM25 relevance ranking over expertise records.
//!
//! Corpus statistics are computed fresh on every call; domains are small
//! enough that an index would only add invalidation problems.

use crate::record::ExpertiseRecord;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Anything that is not a word character, whitespace, or a hyphen.
static NON_TOKEN_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("static pattern"));

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Length normalisation strength.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// One ranked record.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Position of the record in the searched slice.
    pub index: usize,
    pub score: f64,
    /// Fields containing at least one query token verbatim.
    pub matched_fields: Vec<&'static str>,
}

/// Lowercase, strip punctuation (hyphens survive), split on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    NON_TOKEN_CHARS
        .replace_all(&lowered, " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Per-field searchable text for a record: its variant fields plus tags.
pub fn extract_text(record: &ExpertiseRecord) -> Vec<(&'static str, String)> {
    let mut fields = record.body.text_fields();
    if !record.meta.tags.is_empty() {
        fields.push(("tags", record.meta.tags.join(" ")));
    }
    fields
}

struct Document {
    fields: Vec<(&'static str, Vec<String>)>,
    term_freq: HashMap<String, usize>,
    len: usize,
}

impl Document {
    fn from_record(record: &ExpertiseRecord) -> Self {
        let fields: Vec<(&'static str, Vec<String>)> = extract_text(record)
            .into_iter()
            .map(|(name, text)| (name, tokenize(&text)))
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect();

        let mut term_freq = HashMap::new();
        let mut len = 0;
        for token in fields.iter().flat_map(|(_, tokens)| tokens) {
            *term_freq.entry(token.clone()).or_insert(0) += 1;
            len += 1;
        }
        Self {
            fields,
            term_freq,
            len,
        }
    }

    fn matched_fields(&self, query: &[String]) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|(_, tokens)| tokens.iter().any(|t| query.contains(t)))
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Rank `records` against `query` with default parameters.
pub fn search(records: &[ExpertiseRecord], query: &str) -> Vec<SearchResult> {
    search_with(records, query, Bm25Params::default())
}

/// Rank `records` against `query`.
///
/// Records scoring exactly zero are left out. Results are sorted by score,
/// highest first; equal scores keep corpus order.
pub fn search_with(
    records: &[ExpertiseRecord],
    query: &str,
    params: Bm25Params,
) -> Vec<SearchResult> {
    let query_tokens = tokenize(query);
    if records.is_empty() || query_tokens.is_empty() {
        return Vec::new();
    }

    let docs: Vec<Document> = records.iter().map(Document::from_record).collect();
    let n = docs.len() as f64;
    let avg_len = docs.iter().map(|d| d.len).sum::<usize>() as f64 / n;

    let idf: HashMap<&str, f64> = query_tokens
        .iter()
        .map(|term| {
            let df = docs
                .iter()
                .filter(|d| d.term_freq.contains_key(term))
                .count() as f64;
            (term.as_str(), ((n - df + 0.5) / (df + 0.5) + 1.0).ln())
        })
        .collect();

    let mut results: Vec<SearchResult> = docs
        .iter()
        .enumerate()
        .filter_map(|(index, doc)| {
            let length_ratio = if avg_len > 0.0 {
                doc.len as f64 / avg_len
            } else {
                0.0
            };
            let score: f64 = query_tokens
                .iter()
                .map(|term| {
                    let tf = doc.term_freq.get(term).copied().unwrap_or(0) as f64;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let norm = tf + params.k1 * (1.0 - params.b + params.b * length_ratio);
                    idf[term.as_str()] * (tf * (params.k1 + 1.0)) / norm
                })
                .sum();

            (score != 0.0).then(|| SearchResult {
                index,
                score,
                matched_fields: doc.matched_fields(&query_tokens),
            })
        })
        .collect();

    // sort_by is stable: ties keep corpus order
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Classification, RecordBody};

    fn pattern(name: &str, description: &str) -> ExpertiseRecord {
        ExpertiseRecord::new(
            RecordBody::Pattern {
                name: name.to_string(),
                description: description.to_string(),
                files: vec![],
            },
            Classification::Tactical,
        )
    }

    #[test]
    fn test_tokenize_keeps_hyphenated_compounds() {
        assert_eq!(
            tokenize("Use file-locking, NOT mutexes!"),
            vec!["use", "file-locking", "not", "mutexes"]
        );
        assert_eq!(tokenize("snake_case stays"), vec!["snake_case", "stays"]);
        assert!(tokenize("  ... !!! ").is_empty());
    }

    #[test]
    fn test_extract_text_includes_tags() {
        let mut record = pattern("n", "d");
        record.meta.tags = vec!["io".to_string(), "fs".to_string()];
        let fields = extract_text(&record);
        assert_eq!(fields.last().unwrap(), &("tags", "io fs".to_string()));
    }

    #[test]
    fn test_repeated_term_ranks_higher() {
        let records = vec![
            pattern("single", "locking once"),
            pattern("unrelated", "formatting rules"),
            pattern("triple", "locking locking locking"),
        ];
        let results = search(&records, "locking");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 2);
        assert_eq!(results[1].index, 0);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_zero_scores_excluded() {
        let records = vec![pattern("a", "alpha"), pattern("b", "beta")];
        let results = search(&records, "gamma");
        assert!(results.is_empty());
    }

    #[test]
    fn test_single_document_corpus() {
        let records = vec![pattern("only", "locking guide")];
        let results = search(&records, "locking");
        assert_eq!(results.len(), 1);
        assert!(results[0].score.is_finite());
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(search(&[], "anything").is_empty());
        assert!(search(&[pattern("a", "b")], "  ?! ").is_empty());
    }

    #[test]
    fn test_matched_fields_attribution() {
        let mut record = pattern("cache-layer", "read-through cache");
        record.meta.tags = vec!["perf".to_string()];
        let results = search(&[record], "cache-layer perf");
        assert_eq!(results[0].matched_fields, vec!["name", "tags"]);
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let records = vec![
            pattern("first", "retry"),
            pattern("second", "retry"),
            pattern("third", "retry"),
        ];
        let results = search(&records, "retry");
        let order: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_custom_params_change_saturation() {
        let records = vec![
            pattern("a", "cache cache cache cache"),
            pattern("b", "cache"),
            pattern("c", "other"),
        ];
        let saturated = search_with(&records, "cache", Bm25Params { k1: 0.0, b: 0.0 });
        // k1 = 0 ignores term frequency entirely
        assert!((saturated[0].score - saturated[1].score).abs() < 1e-12);
    }
}
