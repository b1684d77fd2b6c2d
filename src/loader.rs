use std::{fmt, path::Path};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::csv_transactions;
use crate::date::{DateError, DatePolicy};
use crate::json_transactions;
use crate::ledger::Ledger;
use crate::record::{Location, RawRecord, RecordParser};

/// Failures that stop a whole file from being imported. Record-level problems
/// never end up here; they are counted and reported as [`Diagnostic`]s.
#[derive(Debug, Error)]
pub(crate) enum LoadError {
    #[error("file '{0}' has already been imported")]
    AlreadyImported(String),
    #[error("file '{0}' is neither a .csv nor a .json file")]
    UnknownFormat(String),
    #[error("file '{0}' was not found or is not a readable file")]
    FileNotFound(String),
    #[error("could not read '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("could not read '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Format {
    Delimited,
    Object,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Format> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(Format::Delimited),
            "json" => Some(Format::Object),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Severity {
    /// The record was dropped.
    Error,
    /// The record was kept despite the problem.
    Warning,
}

/// One human-readable line about a single record.
#[derive(Debug, PartialEq)]
pub(crate) struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    pub location: Option<Location>,
    pub raw: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = self.location {
            write!(f, "{} ", location)?;
        }
        write!(f, "in file '{}': {}. ", self.file, self.message)?;
        match self.severity {
            Severity::Error => write!(f, "Record is ignored")?,
            Severity::Warning => write!(f, "Record is kept")?,
        }
        if self.raw.is_empty() {
            Ok(())
        } else {
            write!(f, ": {}", self.raw)
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct LoadSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadSummary {
    fn report(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

/// Imports transaction files into a ledger, each file at most once.
pub(crate) struct FileLoader {
    today: NaiveDate,
    policy: DatePolicy,
}

impl FileLoader {
    pub fn new(today: NaiveDate, policy: DatePolicy) -> FileLoader {
        FileLoader { today, policy }
    }

    /// Imports every valid record of `path` into `ledger`.
    ///
    /// A file that was imported before is refused without touching the file
    /// system. The whole file is read before any record is applied, so a read
    /// failure leaves the ledger untouched. Bad records are skipped, counted
    /// and reported; they never abort the rest of the file. The path is marked
    /// as imported once all records have been processed.
    pub fn load<L: Ledger>(&self, ledger: &mut L, path: &Path) -> Result<LoadSummary, LoadError> {
        let file = path.display().to_string();

        if ledger.is_imported(path) {
            return Err(LoadError::AlreadyImported(file));
        }
        let format = Format::from_path(path).ok_or_else(|| LoadError::UnknownFormat(file.clone()))?;
        if !path.is_file() {
            return Err(LoadError::FileNotFound(file));
        }

        debug!(file = %file, ?format, "importing");
        let parser = RecordParser::new(self.today, self.policy, file.clone());
        let mut summary = LoadSummary::default();

        match format {
            Format::Delimited => {
                let mut reader = csv_transactions::Reader::from_path(path).map_err(|source| LoadError::Csv {
                    path: file.clone(),
                    source,
                })?;
                let records = buffer_delimited(reader.iter()).map_err(|source| LoadError::Csv {
                    path: file.clone(),
                    source,
                })?;
                for next in records {
                    match next {
                        Ok(raw) => process(ledger, &parser, raw, &mut summary),
                        Err(err) => {
                            summary.rejected += 1;
                            summary.report(Diagnostic {
                                severity: Severity::Error,
                                file: file.clone(),
                                location: err.position().map(|position| Location::Line(position.line())),
                                raw: String::new(),
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }
            Format::Object => {
                let reader = json_transactions::Reader::from_path(path).map_err(|source| LoadError::Json {
                    path: file.clone(),
                    source,
                })?;
                for raw in reader.into_records() {
                    process(ledger, &parser, raw, &mut summary);
                }
            }
        }

        ledger.mark_imported(path.to_path_buf());
        if let Err(err) = ledger.reconcile() {
            error!("ledger out of balance after importing '{}': {}", file, err);
        }
        info!(
            file = %file,
            accepted = summary.accepted,
            rejected = summary.rejected,
            transactions = ledger.transaction_count(),
            "import finished"
        );

        Ok(summary)
    }
}

/// Reads every delimited record up front. Records the csv crate can't decode
/// are kept as errors for the caller to report; an I/O failure ends the read.
fn buffer_delimited<I>(records: I) -> Result<Vec<Result<RawRecord, csv::Error>>, csv::Error>
where
    I: Iterator<Item = Result<RawRecord, csv::Error>>,
{
    let mut buffered = Vec::new();
    for next in records {
        match next {
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => return Err(err),
            next => buffered.push(next),
        }
    }
    Ok(buffered)
}

fn process<L: Ledger>(ledger: &mut L, parser: &RecordParser, raw: RawRecord, summary: &mut LoadSummary) {
    let location = Some(raw.location);
    let raw_text = raw.to_string();
    let reject = |summary: &mut LoadSummary, raw: String, message: String| {
        summary.rejected += 1;
        summary.report(Diagnostic {
            severity: Severity::Error,
            file: parser.origin_file().to_string(),
            location,
            raw,
            message,
        });
    };

    let parsed = match parser.parse(raw) {
        Ok(parsed) => parsed,
        Err(err) => return reject(summary, raw_text, err.to_string()),
    };
    if let Err(err) = ledger.apply(parsed.transaction) {
        return reject(summary, raw_text, err.to_string());
    }

    summary.accepted += 1;
    if !parsed.date_warnings.is_empty() {
        summary.report(Diagnostic {
            severity: Severity::Warning,
            file: parser.origin_file().to_string(),
            location,
            raw: raw_text,
            message: DateError::OutOfRange(parsed.date_warnings).to_string(),
        });
    }
}
