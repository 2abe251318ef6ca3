//! Aggregated results: ordering, rendering and binary snapshots.

pub mod summary;

pub use summary::ReportSummary;

use std::cmp::Ordering;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

use bincode::Options;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::result::{ExecutionError, ExecutionResult, Outcome};

const SNAPSHOT_MAGIC: [u8; 4] = *b"K2RP";
const SNAPSHOT_VERSION: u32 = 1;
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
/// Upper bound on the encoded snapshot body; length prefixes beyond it are rejected
/// before anything is allocated.
pub const MAX_SNAPSHOT_BYTES: u64 = 1 << 30;

fn snapshot_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_SNAPSHOT_BYTES)
}

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("{0}")]
    Codec(#[from] bincode::Error),
    #[error("not a report snapshot")]
    BadMagic,
    #[error("truncated header")]
    Truncated,
    #[error("unsupported version {0}")]
    UnsupportedVersion(u32),
    #[error("sort field {0} is not in the stored allowed set")]
    SortFieldNotAllowed(SortField),
}

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("{field:?} is not sortable; allowed fields are {allowed}")]
    InvalidSortField { field: String, allowed: String },
    #[error("snapshot: {0}")]
    Serialization(#[from] SnapshotError),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("histogram: {0}")]
    Histogram(String),
}

impl From<bincode::Error> for ReportError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(SnapshotError::Codec(e))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    Date,
    ElapsedTime,
    Hits,
    DocumentsSearched,
    Query,
    SourceQuery,
}

impl SortField {
    pub const ALL: [SortField; 6] = [
        Self::Date,
        Self::ElapsedTime,
        Self::Hits,
        Self::DocumentsSearched,
        Self::Query,
        Self::SourceQuery,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::ElapsedTime => "elapsed_time",
            Self::Hits => "hits",
            Self::DocumentsSearched => "documents_searched",
            Self::Query => "query",
            Self::SourceQuery => "source_query",
        }
    }

    fn compare(self, a: &ReportItem, b: &ReportItem) -> Ordering {
        match self {
            Self::Date => a.date.cmp(&b.date),
            Self::ElapsedTime => a.elapsed_ms.cmp(&b.elapsed_ms),
            Self::Hits => a.hits.cmp(&b.hits),
            Self::DocumentsSearched => a.documents_searched.cmp(&b.documents_searched),
            Self::Query => a.query.cmp(&b.query),
            Self::SourceQuery => a.source_query.cmp(&b.source_query),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn field_list(fields: &[SortField]) -> String {
    fields
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for SortField {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(Self::Date),
            "elapsed_time" | "time" => Ok(Self::ElapsedTime),
            "hits" => Ok(Self::Hits),
            "documents_searched" | "searched" | "results" => Ok(Self::DocumentsSearched),
            "query" => Ok(Self::Query),
            "source_query" => Ok(Self::SourceQuery),
            _ => Err(ReportError::InvalidSortField {
                field: s.to_string(),
                allowed: field_list(&Self::ALL),
            }),
        }
    }
}

/// Rendered columns, in output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Date,
    Query,
    SourceQuery,
    Time,
    Searched,
    Hits,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Self::Date,
        Self::Query,
        Self::SourceQuery,
        Self::Time,
        Self::Searched,
        Self::Hits,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Query => "query",
            Self::SourceQuery => "source_query",
            Self::Time => "time",
            Self::Searched => "searched",
            Self::Hits => "hits",
        }
    }

    /// Fixed-width column size for text rendering.
    pub fn width(self) -> usize {
        match self {
            Self::Date => 28,
            Self::Query | Self::SourceQuery => 50,
            Self::Time | Self::Searched | Self::Hits => 10,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderFormat {
    /// One comma-terminated value per column
    Csv,
    /// Values left-aligned in fixed-width columns
    #[default]
    Text,
}

/// One row of a report: a completed run, or a failed one with its numeric fields absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportItem {
    pub date: DateTime<Utc>,
    pub query: String,
    pub source_query: Option<String>,
    pub elapsed_ms: Option<u64>,
    pub documents_searched: Option<u64>,
    pub hits: Option<u64>,
    /// Some value came from a parse default rather than the tool output
    pub defaulted: bool,
    pub failure: Option<String>,
    pub output: String,
}

impl ReportItem {
    pub fn from_outcome(outcome: Outcome) -> Self {
        match outcome {
            Ok(result) => result.into(),
            Err(err) => err.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    fn value(&self, column: Column) -> Option<String> {
        match column {
            Column::Date => Some(self.date.format(DATE_FORMAT).to_string()),
            Column::Query => Some(self.query.clone()),
            Column::SourceQuery => self.source_query.clone(),
            Column::Time => self.elapsed_ms.map(|v| v.to_string()),
            Column::Searched => self.documents_searched.map(|v| v.to_string()),
            Column::Hits => self.hits.map(|v| v.to_string()),
        }
    }

    pub fn as_csv(&self) -> String {
        Column::ALL
            .iter()
            .map(|&c| format!("{},", self.value(c).unwrap_or_else(|| "-".into())))
            .collect()
    }

    pub fn as_text(&self) -> String {
        Column::ALL
            .iter()
            .map(|&c| {
                let value = self.value(c).unwrap_or_else(|| "-".into());
                format!("{:<width$}", value, width = c.width())
            })
            .collect()
    }

    pub fn render(&self, format: RenderFormat) -> String {
        match format {
            RenderFormat::Csv => self.as_csv(),
            RenderFormat::Text => self.as_text(),
        }
    }
}

impl From<ExecutionResult> for ReportItem {
    fn from(r: ExecutionResult) -> Self {
        let defaulted = r.is_defaulted();
        Self {
            date: r.timestamp,
            query: r.query,
            source_query: r.source_query,
            elapsed_ms: Some(r.elapsed_ms),
            documents_searched: Some(r.documents_searched),
            hits: Some(r.hits),
            defaulted,
            failure: None,
            output: r.raw_output,
        }
    }
}

impl From<ExecutionError> for ReportItem {
    fn from(e: ExecutionError) -> Self {
        let failure = e.cause.to_string();
        let output = e.cause.output().unwrap_or_default().to_string();
        Self {
            date: e.timestamp,
            query: e.query,
            source_query: e.source_query,
            elapsed_ms: None,
            documents_searched: None,
            hits: None,
            defaulted: false,
            failure: Some(failure),
            output,
        }
    }
}

// Snapshot layout: magic, little-endian u32 version, then the bincode body.
#[derive(Serialize)]
struct SnapshotBodyRef<'a> {
    items: &'a [ReportItem],
    sort_by: SortField,
    sortable_fields: &'a [SortField],
}

#[derive(Deserialize)]
struct SnapshotBody {
    items: Vec<ReportItem>,
    sort_by: SortField,
    sortable_fields: Vec<SortField>,
}

fn read_header<R: Read>(reader: &mut R) -> Result<(), ReportError> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ReportError::Serialization(SnapshotError::Truncated),
        _ => ReportError::Io(e),
    })?;
    if header[..4] != SNAPSHOT_MAGIC {
        return Err(SnapshotError::BadMagic.into());
    }
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version).into());
    }
    Ok(())
}

/// Ordered collection of report rows with a current sort field.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    items: Vec<ReportItem>,
    sort_by: SortField,
    sortable_fields: Vec<SortField>,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            sort_by: SortField::Date,
            sortable_fields: SortField::ALL.to_vec(),
        }
    }

    pub fn add(&mut self, item: impl Into<ReportItem>) {
        self.items.push(item.into());
    }

    pub fn extend_outcomes(&mut self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.items
            .extend(outcomes.into_iter().map(ReportItem::from_outcome));
    }

    pub fn items(&self) -> &[ReportItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn sort_by(&self) -> SortField {
        self.sort_by
    }

    pub fn sortable_fields(&self) -> &[SortField] {
        &self.sortable_fields
    }

    /// Set the sort field by name. Unknown or disallowed names leave it unchanged.
    pub fn set_sort_field(&mut self, name: &str) -> Result<(), ReportError> {
        let field = name.parse::<SortField>()?;
        self.set_sort(field)
    }

    pub fn set_sort(&mut self, field: SortField) -> Result<(), ReportError> {
        if !self.sortable_fields.contains(&field) {
            return Err(ReportError::InvalidSortField {
                field: field.name().to_string(),
                allowed: field_list(&self.sortable_fields),
            });
        }
        self.sort_by = field;
        Ok(())
    }

    /// Stable sort by the current field.
    pub fn sort(&mut self) {
        let field = self.sort_by;
        self.items.sort_by(|a, b| field.compare(a, b));
    }

    pub fn header(format: RenderFormat) -> String {
        match format {
            RenderFormat::Csv => Column::ALL.iter().map(|c| format!("{},", c.name())).collect(),
            RenderFormat::Text => Column::ALL
                .iter()
                .map(|c| format!("{:<width$}", c.name(), width = c.width()))
                .collect(),
        }
    }

    /// One rendered line per item, header excluded.
    pub fn render(&self, format: RenderFormat) -> Vec<String> {
        self.items.iter().map(|item| item.render(format)).collect()
    }

    pub fn save<W: Write>(&self, mut writer: W) -> Result<(), ReportError> {
        writer.write_all(&SNAPSHOT_MAGIC)?;
        writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
        let body = SnapshotBodyRef {
            items: &self.items,
            sort_by: self.sort_by,
            sortable_fields: &self.sortable_fields,
        };
        snapshot_options().serialize_into(writer, &body)?;
        Ok(())
    }

    /// Replace this report with a saved snapshot. On error nothing changes.
    pub fn load<R: Read>(&mut self, mut reader: R) -> Result<(), ReportError> {
        read_header(&mut reader)?;
        let body: SnapshotBody = snapshot_options().deserialize_from(reader)?;
        if !body.sortable_fields.contains(&body.sort_by) {
            return Err(SnapshotError::SortFieldNotAllowed(body.sort_by).into());
        }
        self.items = body.items;
        self.sort_by = body.sort_by;
        self.sortable_fields = body.sortable_fields;
        Ok(())
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), items = self.items.len(), "Report saved");
        Ok(())
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let mut report = Self::new();
        report.load(BufReader::new(File::open(path)?))?;
        info!(path = %path.display(), items = report.items.len(), "Report loaded");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::CommandError;
    use chrono::TimeZone;

    fn item(second: u32, query: &str, hits: u64) -> ReportItem {
        ReportItem {
            date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, second).unwrap(),
            query: query.into(),
            source_query: None,
            elapsed_ms: Some(100 - hits),
            documents_searched: Some(500),
            hits: Some(hits),
            defaulted: false,
            failure: None,
            output: String::new(),
        }
    }

    fn sample() -> Report {
        let mut report = Report::new();
        report.add(item(3, "pear", 9));
        report.add(item(1, "apple", 42));
        report.add(item(2, "fig", 9));
        report
    }

    #[test]
    fn invalid_sort_field_leaves_state_unchanged() {
        let mut report = sample();
        report.set_sort_field("hits").expect("valid");
        let err = report.set_sort_field("bogus").unwrap_err();
        assert!(matches!(err, ReportError::InvalidSortField { .. }));
        assert_eq!(report.sort_by(), SortField::Hits);
    }

    #[test]
    fn disallowed_field_is_rejected() {
        let mut report = sample();
        report.sortable_fields = vec![SortField::Date];
        assert!(report.set_sort(SortField::Hits).is_err());
        assert_eq!(report.sort_by(), SortField::Date);
    }

    #[test]
    fn sort_is_stable_and_idempotent() {
        let mut report = sample();
        report.set_sort_field("hits").expect("valid");
        report.sort();
        let once: Vec<String> = report.items().iter().map(|i| i.query.clone()).collect();
        assert_eq!(once, vec!["pear", "fig", "apple"]);
        report.sort();
        let twice: Vec<String> = report.items().iter().map(|i| i.query.clone()).collect();
        assert_eq!(once, twice);

        report.set_sort_field("date").expect("valid");
        report.sort();
        assert_eq!(report.items()[0].query, "apple");
        report.set_sort_field("query").expect("valid");
        report.sort();
        assert_eq!(report.items()[2].query, "pear");
    }

    #[test]
    fn csv_keeps_trailing_comma() {
        let report = sample();
        assert_eq!(
            Report::header(RenderFormat::Csv),
            "date,query,source_query,time,searched,hits,"
        );
        assert_eq!(
            report.render(RenderFormat::Csv)[1],
            "2024-05-01 12:00:01.000000,apple,-,58,500,42,"
        );
    }

    #[test]
    fn text_pads_columns_and_dashes_missing_values() {
        let failed = ReportItem::from(ExecutionError {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            query: "kiwi".into(),
            source_query: Some("scope".into()),
            cause: CommandError::ProcessExecution {
                argv: vec!["rck2".into()],
                status: 1,
                output: "bad".into(),
            },
        });
        let line = failed.as_text();
        assert_eq!(line.len(), 28 + 50 + 50 + 10 + 10 + 10);
        assert_eq!(&line[78..83], "scope");
        assert_eq!(line[128..].trim_end(), "-         -         -");
        assert!(failed.is_failure());
        assert_eq!(failed.output, "bad");
        assert_eq!(failed.as_csv(), "2024-05-01 00:00:00.000000,kiwi,scope,-,-,-,");
    }

    #[test]
    fn snapshot_round_trip() {
        let mut report = sample();
        report.set_sort_field("documents_searched").expect("valid");
        let mut blob = Vec::new();
        report.save(&mut blob).expect("save");

        let mut restored = Report::new();
        restored.load(blob.as_slice()).expect("load");
        assert_eq!(restored, report);
    }

    #[test]
    fn corrupt_snapshot_leaves_report_untouched() {
        let mut report = sample();
        let before = report.clone();
        assert!(report.load(&b"not a snapshot"[..]).is_err());
        assert_eq!(report, before);

        let mut blob = Vec::new();
        Report::new().save(&mut blob).expect("save");
        blob[0] = b'X';
        let err = report.load(blob.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Serialization(SnapshotError::BadMagic)
        ));
        assert_eq!(report, before);

        let mut blob = Vec::new();
        Report::new().save(&mut blob).expect("save");
        blob[4] = 7;
        let err = report.load(blob.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Serialization(SnapshotError::UnsupportedVersion(7))
        ));
        assert!(matches!(
            report.load(&b"K2"[..]).unwrap_err(),
            ReportError::Serialization(SnapshotError::Truncated)
        ));
        assert_eq!(report, before);
    }

    #[test]
    fn oversized_length_prefix_is_rejected_without_allocating() {
        let mut report = sample();
        let before = report.clone();
        let mut blob = Vec::new();
        blob.extend_from_slice(b"K2RP");
        blob.extend_from_slice(&1u32.to_le_bytes());
        // one item whose date string claims to be a terabyte long
        blob.extend_from_slice(&1u64.to_le_bytes());
        blob.extend_from_slice(&(1u64 << 40).to_le_bytes());
        blob.extend_from_slice(b"2024");
        let err = report.load(blob.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Serialization(SnapshotError::Codec(_))
        ));
        assert_eq!(report, before);
    }

    #[test]
    fn csv_text_is_not_a_snapshot() {
        let mut report = sample();
        let before = report.clone();
        let mut csv = Report::header(RenderFormat::Csv);
        csv.push('\n');
        for line in report.render(RenderFormat::Csv) {
            csv.push_str(&line);
            csv.push('\n');
        }
        assert!(matches!(
            report.load(csv.as_bytes()).unwrap_err(),
            ReportError::Serialization(_)
        ));
        assert_eq!(report, before);
    }

    #[test]
    fn disallowed_stored_sort_field_is_rejected() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&SNAPSHOT_MAGIC);
        blob.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        let body = SnapshotBodyRef {
            items: &[],
            sort_by: SortField::Hits,
            sortable_fields: &[SortField::Date],
        };
        snapshot_options()
            .serialize_into(&mut blob, &body)
            .expect("encode");
        let mut report = Report::new();
        assert!(matches!(
            report.load(blob.as_slice()).unwrap_err(),
            ReportError::Serialization(SnapshotError::SortFieldNotAllowed(SortField::Hits))
        ));
        assert_eq!(report, Report::new());
    }

    #[test]
    fn save_and_load_through_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.bin");
        let report = sample();
        report.save_to_path(&path).expect("save");
        assert_eq!(Report::load_from_path(&path).expect("load"), report);
    }
}
