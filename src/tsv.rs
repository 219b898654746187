//! Tab-separated training exports.
//!
//! Issues are written as `Label, Title, Body`; pull requests add
//! space-joined `FileNames` and `FolderNames`. The first row is a header and
//! blank trailing rows are ignored on read.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{DataError, MIN_TRAINING_RECORDS};
use crate::forge::{ItemKind, Record};

/// Rows written between explicit flushes.
pub const FLUSH_EVERY: usize = 100;

const ISSUE_COLUMNS: &[&str] = &["Label", "Title", "Body"];
const PULL_COLUMNS: &[&str] = &["Label", "Title", "Body", "FileNames", "FolderNames"];

pub fn columns(kind: ItemKind) -> &'static [&'static str] {
    match kind {
        ItemKind::Issue => ISSUE_COLUMNS,
        ItemKind::PullRequest => PULL_COLUMNS,
    }
}

/// Makes free text safe for a single tab-separated field.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\r' | '\n' | '\t' => ' ',
            '"' => '`',
            other => other,
        })
        .collect()
}

/// One exported row for `record` labeled `label`.
pub fn format_row(label: &str, record: &Record) -> String {
    let mut fields = vec![sanitize(label), sanitize(&record.title), sanitize(&record.body)];
    if record.kind == ItemKind::PullRequest {
        fields.push(sanitize(&record.file_names().join(" ")));
        fields.push(sanitize(&record.folder_names().join(" ")));
    }
    fields.join("\t")
}

/// Streams export rows to a file, flushing every [`FLUSH_EVERY`] rows.
pub struct ExportWriter<W: Write> {
    inner: W,
    pending: usize,
    written: usize,
}

impl ExportWriter<BufWriter<File>> {
    /// Creates the file (and its directory) and writes the header row.
    pub fn create(path: &Path, kind: ItemKind) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        info!("{kind} data path: {}", path.display());
        Self::new(BufWriter::new(file), kind)
    }
}

impl<W: Write> ExportWriter<W> {
    pub fn new(mut inner: W, kind: ItemKind) -> io::Result<Self> {
        writeln!(inner, "{}", columns(kind).join("\t"))?;
        Ok(Self {
            inner,
            pending: 0,
            written: 0,
        })
    }

    pub fn write_record(&mut self, label: &str, record: &Record) -> io::Result<()> {
        writeln!(self.inner, "{}", format_row(label, record))?;
        self.written += 1;
        self.pending += 1;
        if self.pending == FLUSH_EVERY {
            self.inner.flush()?;
            self.pending = 0;
        }
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes and returns the number of data rows written.
    pub fn finish(mut self) -> io::Result<usize> {
        self.inner.flush()?;
        Ok(self.written)
    }
}

/// A record read back from an export together with its label column.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    pub label: Option<String>,
    pub record: Record,
}

/// Reads up to `limit` data rows. Records are numbered by row, starting at 1.
pub fn read_rows(
    path: &Path,
    kind: ItemKind,
    limit: Option<usize>,
) -> Result<Vec<LabeledRecord>, DataError> {
    let rows = load(path, kind)?;
    let take = limit.unwrap_or(usize::MAX);
    Ok(rows
        .into_iter()
        .take(take)
        .enumerate()
        .map(|(index, fields)| to_record(kind, index as u64 + 1, fields))
        .collect())
}

/// Checks that an export exists, is well formed, and has enough records to
/// train on. Returns the record count.
pub fn validate(path: &Path, kind: ItemKind) -> Result<usize, DataError> {
    let count = load(path, kind)?.len();
    if count < MIN_TRAINING_RECORDS {
        return Err(DataError::InsufficientRecords {
            path: path.to_path_buf(),
            found: count,
            minimum: MIN_TRAINING_RECORDS,
        });
    }
    debug!(records = count, "{} is valid", path.display());
    Ok(count)
}

/// Data rows split into fields, header and trailing blank rows removed.
fn load(path: &Path, kind: ItemKind) -> Result<Vec<Vec<String>>, DataError> {
    if !path.exists() {
        return Err(DataError::MissingFile(path.to_path_buf()));
    }
    let io_error = |source| DataError::Io {
        path: PathBuf::from(path),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    let mut lines = BufReader::new(file)
        .lines()
        .collect::<Result<Vec<String>, _>>()
        .map_err(io_error)?;

    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }

    let expected = columns(kind).len();
    lines
        .into_iter()
        .enumerate()
        .skip(1)
        .map(|(index, line)| {
            let fields: Vec<String> = line.split('\t').map(str::to_string).collect();
            if fields.len() == expected {
                Ok(fields)
            } else {
                Err(DataError::MalformedRow {
                    line: index + 1,
                    expected,
                    found: fields.len(),
                })
            }
        })
        .collect()
}

fn to_record(kind: ItemKind, number: u64, fields: Vec<String>) -> LabeledRecord {
    let mut fields = fields.into_iter();
    let mut next = || fields.next().unwrap_or_default();
    let label = Some(next()).filter(|l| !l.is_empty());
    let title = next();
    let body = next();
    let (files, folders) = match kind {
        ItemKind::Issue => (Vec::new(), Vec::new()),
        ItemKind::PullRequest => (split_names(&next()), split_names(&next())),
    };

    LabeledRecord {
        record: Record {
            kind,
            number,
            title,
            body,
            author: None,
            labels: label.iter().cloned().collect(),
            has_more_labels: false,
            files,
            folders,
        },
        label,
    }
}

fn split_names(field: &str) -> Vec<String> {
    field.split_whitespace().map(str::to_string).collect()
}
