//! Run reports and their on-disk forms.
//!
//! The structured report is pretty JSON with sorted keys. A flat CSV with one
//! `scope,name` row per unique file is written next to it for downstream
//! tooling. Both are replaced atomically, so writing the same report twice
//! leaves the same files behind.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::{AuditSnapshot, ReportError, RunStats};

/// Final (or partial) result of an audit run.
///
/// Field order is alphabetical so the JSON form has sorted keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Endpoint under audit.
    pub rse: String,
    /// Counters at the time the report was taken.
    pub statistics: RunStats,
    /// When the report was taken.
    pub timestamp: DateTime<Utc>,
    /// Scope to sorted unique file names.
    pub unique_files: BTreeMap<String, Vec<String>>,
}

impl RunReport {
    /// Build a report from an aggregator snapshot, stamped now.
    #[must_use]
    pub fn from_snapshot(rse: impl Into<String>, snapshot: &AuditSnapshot) -> Self {
        Self {
            rse: rse.into(),
            statistics: snapshot.stats,
            timestamp: Utc::now(),
            unique_files: snapshot
                .unique_files
                .iter()
                .map(|(scope, names)| (scope.clone(), names.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Every `(scope, name)` pair, sorted.
    #[must_use]
    pub fn pairs(&self) -> BTreeSet<(String, String)> {
        self.unique_files
            .iter()
            .flat_map(|(scope, names)| names.iter().map(move |name| (scope.clone(), name.clone())))
            .collect()
    }

    /// Per-scope counts.
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let scopes: Vec<ScopeCount> = self
            .unique_files
            .iter()
            .map(|(scope, names)| ScopeCount {
                scope: scope.clone(),
                files: names.len(),
            })
            .collect();
        ReportSummary {
            rse: self.rse.clone(),
            timestamp: self.timestamp,
            total: scopes.iter().map(|s| s.files).sum(),
            scopes,
            statistics: self.statistics,
        }
    }
}

/// Unique files per scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeCount {
    pub scope: String,
    pub files: usize,
}

/// Condensed view of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub rse: String,
    pub timestamp: DateTime<Utc>,
    pub statistics: RunStats,
    pub scopes: Vec<ScopeCount>,
    pub total: usize,
}

/// Destination for run reports.
pub trait ReportSink: Send + Sync {
    /// Persist `report`, replacing anything written before.
    ///
    /// # Errors
    ///
    /// Returns a [`ReportError`] if the report cannot be stored.
    fn write(&self, report: &RunReport) -> Result<(), ReportError>;
}

/// Writes `<path>` as JSON and `<path>` with a `.csv` extension as CSV.
///
/// A path that already ends in `.csv` keeps it for the JSON and gets a second
/// `.csv` appended for the CSV, so the two never share a file.
#[derive(Debug, Clone)]
pub struct FileReportWriter {
    json_path: PathBuf,
    csv_path: PathBuf,
}

impl FileReportWriter {
    /// Create a writer for the given JSON path.
    #[must_use]
    pub fn new(json_path: impl Into<PathBuf>) -> Self {
        let json_path = json_path.into();
        let csv_path = if json_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            let mut appended = json_path.clone().into_os_string();
            appended.push(".csv");
            PathBuf::from(appended)
        } else {
            json_path.with_extension("csv")
        };
        Self {
            json_path,
            csv_path,
        }
    }

    /// Path of the JSON report.
    #[must_use]
    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    /// Path of the CSV report.
    #[must_use]
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl ReportSink for FileReportWriter {
    fn write(&self, report: &RunReport) -> Result<(), ReportError> {
        let json = serde_json::to_vec_pretty(report)?;
        write_atomic(&self.json_path, &json)?;
        write_csv(&self.csv_path, report)?;
        info!(
            json = %self.json_path.display(),
            csv = %self.csv_path.display(),
            unique_files = report.statistics.unique_files_found,
            "Results saved"
        );
        Ok(())
    }
}

/// Load a JSON report.
///
/// # Errors
///
/// Returns [`ReportError::Io`] if the file cannot be read and
/// [`ReportError::Json`] if it is not a report.
pub fn load_report(path: &Path) -> Result<RunReport, ReportError> {
    let raw = fs::read(path).map_err(|e| ReportError::io(path, e))?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Write the flat `scope,name` form of `report` to `path`.
///
/// # Errors
///
/// Returns [`ReportError::Io`] if the file cannot be written.
pub fn write_csv(path: &Path, report: &RunReport) -> Result<(), ReportError> {
    let mut out = String::from("scope,name\n");
    for (scope, name) in report.pairs() {
        out.push_str(&csv_field(&scope));
        out.push(',');
        out.push_str(&csv_field(&name));
        out.push('\n');
    }
    write_atomic(path, out.as_bytes())
}

/// Parse the flat form back into `(scope, name)` pairs.
///
/// # Errors
///
/// Returns [`ReportError::Csv`] for a missing or wrong header, a row without
/// exactly two fields, or an unterminated quoted field.
pub fn read_csv_pairs(input: &str) -> Result<BTreeSet<(String, String)>, ReportError> {
    let rows = parse_csv(input)?;
    let mut rows = rows.into_iter();

    match rows.next() {
        Some((_, header)) if header == ["scope", "name"] => {}
        Some((line, header)) => {
            return Err(ReportError::Csv {
                line,
                message: format!("expected header scope,name, got {}", header.join(",")),
            });
        }
        None => {
            return Err(ReportError::Csv {
                line: 1,
                message: "missing header".into(),
            });
        }
    }

    rows.map(|(line, fields)| match <[String; 2]>::try_from(fields) {
        Ok([scope, name]) => Ok((scope, name)),
        Err(fields) => Err(ReportError::Csv {
            line,
            message: format!("expected 2 fields, got {}", fields.len()),
        }),
    })
    .collect()
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// RFC 4180 records with their starting line numbers. Blank lines are ignored.
fn parse_csv(input: &str) -> Result<Vec<(usize, Vec<String>)>, ReportError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                if !(fields.len() == 1 && fields[0].is_empty()) {
                    records.push((record_line, std::mem::take(&mut fields)));
                }
                fields.clear();
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ReportError::Csv {
            line: record_line,
            message: "unterminated quoted field".into(),
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((record_line, fields));
    }
    Ok(records)
}

/// Replace `path` with `contents` via a temp file in the same directory.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| ReportError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ReportError::io(dir, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| ReportError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| ReportError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Aggregator;

    fn sample() -> RunReport {
        let agg = Aggregator::new();
        agg.record_unique("mc16", "b.root");
        agg.record_unique("mc16", "a.root");
        agg.record_unique("data18", "x,y");
        RunReport::from_snapshot("CERN-PROD", &agg.snapshot())
    }

    #[test]
    fn json_keys_are_sorted() {
        let json = serde_json::to_string(&sample()).unwrap();
        let rse = json.find("\"rse\"").unwrap();
        let stats = json.find("\"statistics\"").unwrap();
        let ts = json.find("\"timestamp\"").unwrap();
        let files = json.find("\"unique_files\"").unwrap();
        assert!(rse < stats && stats < ts && ts < files);
        assert!(json.find("\"datasets_found\"").unwrap() < json.find("\"skipped\"").unwrap());
    }

    #[test]
    fn names_are_sorted_per_scope() {
        let report = sample();
        assert_eq!(report.unique_files["mc16"], vec!["a.root", "b.root"]);
        let summary = report.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.scopes[0].scope, "data18");
    }

    #[test]
    fn csv_quotes_special_characters() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("x,y"), "\"x,y\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn csv_parser_handles_quotes_and_crlf() {
        let input = "scope,name\r\ns,\"a,b\"\r\ns,\"multi\nline\"\r\n\r\nt,\"q\"\"q\"\r\n";
        let pairs = read_csv_pairs(input).unwrap();
        assert!(pairs.contains(&("s".into(), "a,b".into())));
        assert!(pairs.contains(&("s".into(), "multi\nline".into())));
        assert!(pairs.contains(&("t".into(), "q\"q".into())));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn csv_parser_rejects_bad_input() {
        assert!(matches!(read_csv_pairs(""), Err(ReportError::Csv { line: 1, .. })));
        assert!(read_csv_pairs("a,b\n").is_err());
        assert!(matches!(
            read_csv_pairs("scope,name\ns,a,extra\n"),
            Err(ReportError::Csv { line: 2, .. })
        ));
        assert!(read_csv_pairs("scope,name\ns,\"open\n").is_err());
    }

    #[test]
    fn writes_both_forms_and_reads_them_back() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileReportWriter::new(dir.path().join("nested/out.json"));
        let report = sample();

        writer.write(&report).unwrap();

        let loaded = load_report(writer.json_path()).unwrap();
        assert_eq!(loaded, report);
        let csv = fs::read_to_string(writer.csv_path()).unwrap();
        assert!(csv.starts_with("scope,name\n"));
        assert_eq!(read_csv_pairs(&csv).unwrap(), report.pairs());
    }

    #[test]
    fn csv_named_output_keeps_the_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileReportWriter::new(dir.path().join("report.CSV"));
        assert_eq!(writer.json_path(), dir.path().join("report.CSV"));
        assert_eq!(writer.csv_path(), dir.path().join("report.CSV.csv"));

        let report = sample();
        writer.write(&report).unwrap();

        assert_eq!(load_report(writer.json_path()).unwrap(), report);
        let csv = fs::read_to_string(writer.csv_path()).unwrap();
        assert_eq!(read_csv_pairs(&csv).unwrap(), report.pairs());
    }
}
