//! Reader for tab-separated sample shapes, one `id<TAB>name<TAB>wkt` record
//! per line.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use geo::Geometry;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::shape::parse_wkt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleData {
    pub id: String,
    pub name: String,
    /// WKT text of the shape.
    pub shape: String,
}

impl SampleData {
    pub fn geometry(&self) -> Result<Geometry<f64>> {
        parse_wkt(&self.shape)
    }
}

pub struct SampleDataReader<R: Read> {
    records: csv::DeserializeRecordsIntoIter<R, SampleData>,
}

impl SampleDataReader<File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_reader(File::open(path)?))
    }
}

impl<R: Read> SampleDataReader<R> {
    pub fn from_reader(reader: R) -> Self {
        let records = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .quoting(false)
            .flexible(true)
            .from_reader(reader)
            .into_deserialize();
        Self { records }
    }

    /// First record whose id equals `id`, ignoring case.
    pub fn find(self, id: &str) -> Result<Option<SampleData>> {
        for record in self {
            let record = record?;
            if record.id.eq_ignore_ascii_case(id) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

impl<R: Read> Iterator for SampleDataReader<R> {
    type Item = Result<SampleData>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next().map(|r| r.map_err(Into::into))
    }
}
