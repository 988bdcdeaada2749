//! Newline-delimited JSON record files.
//!
//! One domain is one file; each non-blank line is a compact JSON
//! [`ExpertiseRecord`]. Reads take no lock. Writers must hold the domain lock
//! (see [`crate::lock`]) and either append a single line or replace the whole
//! file atomically.

use crate::error::{MulchError, Result};
use crate::id::{ensure_id, is_valid_id};
use crate::record::ExpertiseRecord;
use crate::safe_io::atomic_write;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

fn serialize_line(record: &ExpertiseRecord) -> Result<String> {
    serde_json::to_string(record)
        .map_err(|e| io::Error::other(format!("JSON serialize: {}", e)).into())
}

/// Open `path` for line reading, mapping "absent" to `None`.
fn open_lines(path: &Path) -> Result<Option<io::Lines<BufReader<File>>>> {
    match File::open(path) {
        Ok(file) => Ok(Some(BufReader::new(file).lines())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read every record in a domain file.
///
/// A missing file is an empty domain. Blank lines are skipped. The first line
/// that fails to parse aborts the read with [`MulchError::MalformedRecord`].
pub fn read(path: &Path) -> Result<Vec<ExpertiseRecord>> {
    let Some(lines) = open_lines(path)? else {
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    for (line_num, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| MulchError::MalformedRecord {
            path: path.to_path_buf(),
            line: line_num + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Whether a non-empty file is missing its final newline.
fn lacks_trailing_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Append one record as a single line, assigning its id first if missing.
///
/// A hand-edited file whose last line has no newline gets one first, so the
/// new record never lands on the same line. Callers hold the domain lock so
/// the append cannot interleave with an atomic rewrite.
pub fn append(path: &Path, record: &mut ExpertiseRecord) -> Result<()> {
    ensure_id(record);
    let json = serialize_line(record)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    if lacks_trailing_newline(&mut file)? {
        log::debug!("{} has no trailing newline, adding one", path.display());
        writeln!(file)?;
    }
    writeln!(file, "{}", json)?;
    file.sync_all()?;
    Ok(())
}

/// Replace the whole file with `records`.
///
/// Records still missing an id get one (lazy migration); existing ids are
/// kept. Returns how many ids were assigned.
pub fn write(path: &Path, records: &mut [ExpertiseRecord]) -> Result<usize> {
    let mut migrated = 0;
    let mut content = String::new();
    for record in records.iter_mut() {
        if ensure_id(record) {
            migrated += 1;
        }
        content.push_str(&serialize_line(record)?);
        content.push('\n');
    }
    if migrated > 0 {
        log::debug!("assigned {} missing id(s) in {}", migrated, path.display());
    }
    atomic_write(path, content.as_bytes())?;
    Ok(migrated)
}

/// Last modification time, or `None` if the file doesn't exist.
pub fn get_mod_time(path: &Path) -> Result<Option<DateTime<Utc>>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified()?.into())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// One problem found by [`scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProblem {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

/// Result of a validation pass over one file.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Records that parsed, with their 1-based line numbers.
    pub records: Vec<(usize, ExpertiseRecord)>,
    pub problems: Vec<ScanProblem>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Validation read: unlike [`read`], keeps going past bad lines and reports
/// every problem in one pass. Also flags malformed and duplicate ids.
pub fn scan(path: &Path) -> Result<ScanReport> {
    let mut report = ScanReport::default();
    let Some(lines) = open_lines(path)? else {
        return Ok(report);
    };

    let mut seen_ids = HashSet::new();
    for (line_num, line) in lines.enumerate() {
        let line_no = line_num + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ExpertiseRecord>(&line) {
            Ok(record) => {
                if let Some(id) = record.id() {
                    if !is_valid_id(id) {
                        report.problems.push(ScanProblem {
                            line: line_no,
                            message: format!("invalid id '{}'", id),
                        });
                    } else if !seen_ids.insert(id.to_string()) {
                        report.problems.push(ScanProblem {
                            line: line_no,
                            message: format!("duplicate id '{}'", id),
                        });
                    }
                }
                report.records.push((line_no, record));
            }
            Err(e) => report.problems.push(ScanProblem {
                line: line_no,
                message: e.to_string(),
            }),
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Classification, RecordBody};
    use tempfile::TempDir;

    fn convention(content: &str) -> ExpertiseRecord {
        ExpertiseRecord::new(
            RecordBody::Convention {
                content: content.to_string(),
            },
            Classification::Foundational,
        )
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let records = read(&temp_dir.path().join("absent.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_write_then_read_roundtrip_assigns_ids() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("testing.jsonl");
        let mut records = vec![convention("one"), convention("two")];

        let migrated = write(&path, &mut records).unwrap();
        assert_eq!(migrated, 2);

        let loaded = read(&path).unwrap();
        assert_eq!(loaded, records);
        assert!(loaded.iter().all(|r| r.id().is_some_and(is_valid_id)));
    }

    #[test]
    fn test_write_is_idempotent_for_identified_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("testing.jsonl");
        let mut records = vec![convention("one")];
        records[0].meta.id = Some("mx-123abc".to_string());

        assert_eq!(write(&path, &mut records).unwrap(), 0);
        let first = fs::read_to_string(&path).unwrap();
        let mut reloaded = read(&path).unwrap();
        assert_eq!(write(&path, &mut reloaded).unwrap(), 0);
        let second = fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(reloaded[0].id(), Some("mx-123abc"));
    }

    #[test]
    fn test_file_format_one_compact_line_per_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("testing.jsonl");
        write(&path, &mut [convention("a"), convention("b")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with('\n'));
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().all(|l| l.starts_with('{') && l.ends_with('}')));
    }

    #[test]
    fn test_write_empty_produces_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("testing.jsonl");
        write(&path, &mut []).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_append_assigns_id_and_adds_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("testing.jsonl");
        write(&path, &mut [convention("first")]).unwrap();

        let mut record = convention("second");
        append(&path, &mut record).unwrap();
        assert!(record.id().is_some());

        let loaded = read(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1], record);
    }

    #[test]
    fn test_append_after_missing_trailing_newline() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("testing.jsonl");
        write(&path, &mut [convention("first")]).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.trim_end()).unwrap();
        assert_eq!(read(&path).unwrap().len(), 1);

        append(&path, &mut convention("second")).unwrap();

        let loaded = read(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].headline(), "second");
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_read_skips_blank_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("testing.jsonl");
        let line = serde_json::to_string(&convention("x")).unwrap();
        fs::write(&path, format!("\n{line}\n   \n{line}\n")).unwrap();
        assert_eq!(read(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_read_reports_malformed_line_number() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("testing.jsonl");
        let line = serde_json::to_string(&convention("x")).unwrap();
        fs::write(&path, format!("{line}\n{{not json\n")).unwrap();

        match read(&path) {
            Err(MulchError::MalformedRecord { line, path: p, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(p, path);
            }
            other => panic!("expected malformed record, got {other:?}"),
        }
    }

    #[test]
    fn test_scan_reports_every_problem() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("testing.jsonl");
        let mut good = convention("ok");
        good.meta.id = Some("mx-aaaaaa".to_string());
        let mut bad_id = convention("bad id");
        bad_id.meta.id = Some("nope".to_string());
        let good_line = serde_json::to_string(&good).unwrap();
        let bad_id_line = serde_json::to_string(&bad_id).unwrap();
        fs::write(
            &path,
            format!("{good_line}\nbroken\n{bad_id_line}\n{good_line}\n{{\"type\":\"x\"}}\n"),
        )
        .unwrap();

        let report = scan(&path).unwrap();
        assert!(!report.is_clean());
        let lines: Vec<usize> = report.problems.iter().map(|p| p.line).collect();
        assert_eq!(lines, vec![2, 3, 4, 5]);
        assert!(report.problems[2].message.contains("duplicate"));
        assert_eq!(report.records.len(), 3);
    }

    #[test]
    fn test_get_mod_time() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("testing.jsonl");
        assert!(get_mod_time(&path).unwrap().is_none());
        write(&path, &mut [convention("x")]).unwrap();
        let modified = get_mod_time(&path).unwrap().unwrap();
        assert!((Utc::now() - modified).num_seconds() < 60);
    }
}
