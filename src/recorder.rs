use chrono::{DateTime, Local, NaiveDate, SecondsFormat};
use rand::{distributions::Alphanumeric, Rng};
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::RecordError;
use crate::metrics::Metrics;
use crate::session::SessionState;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const EXTENSION: &str = "csv";
/// Stand-in for a label that sanitises to nothing
pub const UNKNOWN_LABEL: &str = "unknown";

pub const HEADER: [&str; 12] = [
    "SessionId",
    "Site",
    "Outlet",
    "StartTime(ISO-8601)",
    "EndTime(ISO-8601)",
    "Success",
    "Fail",
    "Total",
    "SuccessRate(%)",
    "ItemsPerMinute",
    "Duration(HH:MM:SS)",
    "AppVersion",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One saved session, exactly as it is written to the log
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub session_id: String,
    pub site: String,
    pub outlet: String,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    pub success: u64,
    pub fail: u64,
    pub total: u64,
    pub success_rate: String,
    pub items_per_minute: String,
    pub duration: String,
    pub app_version: String,
}

impl SessionRecord {
    /// Summarises `state`, using `ended_at` as the reference time or `now`
    /// when the session never finished. Returns `None` when the session has
    /// no start time or either label is unselected.
    pub fn from_session(
        state: &SessionState,
        now: DateTime<Local>,
        session_id: String,
    ) -> Option<Self> {
        let started_at = state.started_at?;
        let ended_at = state.ended_at.unwrap_or(now);
        let metrics = Metrics::from_parts(state.success, state.fail, Some(started_at), ended_at);

        Some(Self {
            session_id,
            site: state.site.clone()?,
            outlet: state.outlet.clone()?,
            started_at,
            ended_at,
            success: metrics.success,
            fail: metrics.fail,
            total: metrics.total,
            success_rate: metrics.success_rate_text(),
            items_per_minute: metrics.items_per_minute_text(),
            duration: metrics.duration_text(),
            app_version: APP_VERSION.to_string(),
        })
    }

    /// Derives the metrics again from the record's own timestamps and counts
    pub fn recompute(&self) -> Metrics {
        Metrics::from_parts(self.success, self.fail, Some(self.started_at), self.ended_at)
    }

    pub fn to_row(&self) -> [String; 12] {
        [
            self.session_id.clone(),
            self.site.clone(),
            self.outlet.clone(),
            format_timestamp(&self.started_at),
            format_timestamp(&self.ended_at),
            self.success.to_string(),
            self.fail.to_string(),
            self.total.to_string(),
            self.success_rate.clone(),
            self.items_per_minute.clone(),
            self.duration.clone(),
            self.app_version.clone(),
        ]
    }

    pub fn from_row(row: &csv::StringRecord) -> Result<Self, RecordError> {
        if row.len() != HEADER.len() {
            return Err(RecordError::Malformed(format!(
                "expected {} fields, found {}",
                HEADER.len(),
                row.len()
            )));
        }
        let field = |idx: usize| row.get(idx).unwrap_or_default().to_string();
        let count = |idx: usize| {
            row.get(idx)
                .unwrap_or_default()
                .parse::<u64>()
                .map_err(|e| RecordError::Malformed(format!("{}: {e}", HEADER[idx])))
        };

        Ok(Self {
            session_id: field(0),
            site: field(1),
            outlet: field(2),
            started_at: parse_timestamp(row.get(3).unwrap_or_default())?,
            ended_at: parse_timestamp(row.get(4).unwrap_or_default())?,
            success: count(5)?,
            fail: count(6)?,
            total: count(7)?,
            success_rate: field(8),
            items_per_minute: field(9),
            duration: field(10),
            app_version: field(11),
        })
    }
}

/// ISO-8601 with offset; sub-second digits are kept so the record
/// recomputes to the same values.
pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Local>, RecordError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| RecordError::Malformed(format!("timestamp {raw:?}: {e}")))
}

/// `yyyyMMdd-HHmmss-xxxxxx` with a random alphanumeric suffix
pub fn new_session_id(at: DateTime<Local>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{}-{}", at.format("%Y%m%d-%H%M%S"), suffix)
}

/// Makes a label safe to use as a single path segment
pub fn sanitize_label(label: &str) -> String {
    let replaced: String = label
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_end_matches('.');

    if trimmed.is_empty() {
        UNKNOWN_LABEL.to_string()
    } else if is_reserved_device_name(trimmed) {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Windows device names stay reserved whatever the case or extension
fn is_reserved_device_name(segment: &str) -> bool {
    let stem = segment.split('.').next().unwrap_or(segment).trim_end();
    let upper = stem.to_ascii_uppercase();
    match upper.as_str() {
        "CON" | "PRN" | "AUX" | "NUL" => true,
        _ => match upper.strip_prefix("COM").or_else(|| upper.strip_prefix("LPT")) {
            Some(digit) => matches!(digit, "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9"),
            None => false,
        },
    }
}

/// Appends session records to `<root>/<site>/<yyyy>/<yyyyMM>/<yyyyMMdd>_<site>.csv`
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    root: PathBuf,
    utf8_bom: bool,
}

impl SessionRecorder {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            utf8_bom: true,
        }
    }

    /// Prefix new files with a UTF-8 byte order mark so spreadsheet tools
    /// pick the right encoding for non-ASCII labels.
    pub fn with_utf8_bom(mut self, enabled: bool) -> Self {
        self.utf8_bom = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, site: &str, date: NaiveDate) -> PathBuf {
        let site = sanitize_label(site);
        self.root
            .join(&site)
            .join(date.format("%Y").to_string())
            .join(date.format("%Y%m").to_string())
            .join(format!("{}_{}.{}", date.format("%Y%m%d"), site, EXTENSION))
    }

    /// Writes `record` as one line, preceded by the header if the file is new
    /// or empty. The whole chunk goes out in a single append.
    pub fn append(&self, record: &SessionRecord) -> Result<PathBuf, RecordError> {
        let path = self.path_for(&record.site, record.ended_at.date_naive());
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| RecordError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let needs_header = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let chunk = encode(record, needs_header, needs_header && self.utf8_bom)?;

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|source| RecordError::Open {
                path: path.clone(),
                source,
            })?;
        file.write_all(&chunk)
            .and_then(|_| file.flush())
            .map_err(|source| RecordError::Write {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), header = needs_header, "appended session record");
        Ok(path)
    }

    /// Reads every record back from a log file written by [`append`](Self::append)
    pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<SessionRecord>, RecordError> {
        let path = path.as_ref();
        let mut raw = Vec::new();
        fs::File::open(path)
            .and_then(|mut f| f.read_to_end(&mut raw))
            .map_err(|source| RecordError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let body = raw.strip_prefix(UTF8_BOM).unwrap_or(&raw);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(body);
        reader
            .records()
            .map(|row| SessionRecord::from_row(&row?))
            .collect()
    }
}

fn encode(record: &SessionRecord, header: bool, bom: bool) -> Result<Vec<u8>, RecordError> {
    let mut buf = Vec::new();
    if bom {
        buf.extend_from_slice(UTF8_BOM);
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(buf);
    if header {
        writer.write_record(HEADER)?;
    }
    writer.write_record(record.to_row())?;

    writer
        .into_inner()
        .map_err(|e| RecordError::Encode(csv::Error::from(e.into_error())))
}
