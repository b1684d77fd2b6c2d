use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;

use crate::record::{Location, RawRecord, Shape};

/// Reads structured transaction files: a JSON array of objects. The array is
/// decoded up front; each element is only checked for shape by the record
/// parser, so one bad object never spoils the rest.
pub(crate) struct Reader(Vec<Value>);

impl Reader {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Reader, serde_json::Error> {
        let file = File::open(path).map_err(serde_json::Error::io)?;
        let elements = serde_json::from_reader(BufReader::new(file))?;

        Ok(Reader(elements))
    }

    pub fn into_records(self) -> impl Iterator<Item = RawRecord> {
        self.0
            .into_iter()
            .enumerate()
            .map(|(index, value)| RawRecord {
                location: Location::Element(index + 1),
                shape: Shape::Object(value),
            })
    }
}
