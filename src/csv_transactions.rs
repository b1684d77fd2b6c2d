use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecordsIter};

use crate::record::{Location, RawRecord, Shape};

/// Reads delimited transaction files: one header line, then
/// `date,origin,recipient,narrative,amount` per line. Fields are never
/// quoted, so a comma always separates fields and the column count is left
/// for the record parser to check.
pub(crate) struct Reader(csv::Reader<File>);

impl Reader {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Reader, csv::Error> {
        let underlying_reader = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .quoting(false)
            .from_path(path)?;

        Ok(Reader(underlying_reader))
    }

    pub fn iter(&mut self) -> CsvRecordIterator<'_> {
        CsvRecordIterator(self.0.records())
    }
}

pub(crate) struct CsvRecordIterator<'r>(StringRecordsIter<'r, File>);

impl<'r> Iterator for CsvRecordIterator<'r> {
    type Item = Result<RawRecord, csv::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let next_result = self.0.next()?;
        Some(next_result.map(|record| RawRecord {
            location: Location::Line(record.position().map_or(0, |position| position.line())),
            shape: Shape::Delimited(record.iter().map(str::to_string).collect()),
        }))
    }
}
