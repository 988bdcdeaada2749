//! Content-derived record ids and prefix resolution.
//!
//! Ids look like `mx-1a2b3c`: the first three bytes of a SHA-256 over the
//! record type and its defining field. Users may refer to a record by the full
//! id, the bare hash, or any prefix of the hash.

use crate::error::{MulchError, Result};
use crate::record::{ExpertiseRecord, RecordBody};
use sha2::{Digest, Sha256};

pub const ID_PREFIX: &str = "mx-";

/// Hex characters kept from the digest.
const ID_HASH_LEN: usize = 6;

/// Compute the id for a record body. Only the type and defining field are
/// hashed, so descriptions, tags and classification never move an id.
pub fn generate_id(body: &RecordBody) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.record_type().as_ref().as_bytes());
    hasher.update(b":");
    hasher.update(body.defining_key().as_bytes());
    let hash = hasher.finalize();
    let hex: String = hash[..ID_HASH_LEN / 2]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    format!("{ID_PREFIX}{hex}")
}

/// Assign an id if the record has none. Existing ids are never rewritten.
///
/// Returns true when an id was assigned.
pub fn ensure_id(record: &mut ExpertiseRecord) -> bool {
    if record.meta.id.is_some() {
        return false;
    }
    record.meta.id = Some(generate_id(&record.body));
    true
}

/// Check the on-disk id shape: `mx-` followed by six lowercase hex digits.
pub fn is_valid_id(id: &str) -> bool {
    id.strip_prefix(ID_PREFIX).is_some_and(|hash| {
        hash.len() == ID_HASH_LEN
            && hash
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    })
}

fn strip_prefix(s: &str) -> &str {
    s.strip_prefix(ID_PREFIX).unwrap_or(s)
}

/// Resolve an id token to the index of the single record it names.
///
/// Zero matches is `NotFound`; more than one is `Ambiguous` and lists every
/// matching id so the caller can retry with a longer prefix.
pub fn resolve(records: &[ExpertiseRecord], token: &str) -> Result<usize> {
    let needle = strip_prefix(token.trim()).to_lowercase();
    if needle.is_empty() {
        return Err(MulchError::InvalidInput("empty id".to_string()));
    }

    let matches: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            r.id()
                .is_some_and(|id| strip_prefix(id).starts_with(needle.as_str()))
        })
        .map(|(i, _)| i)
        .collect();

    match matches.as_slice() {
        [] => Err(MulchError::not_found(format!("record '{token}'"))),
        [only] => Ok(*only),
        many => Err(MulchError::Ambiguous {
            token: token.to_string(),
            candidates: many
                .iter()
                .filter_map(|&i| records[i].id().map(str::to_string))
                .collect(),
        }),
    }
}
