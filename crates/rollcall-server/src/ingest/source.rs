//! Delimited record source
//!
//! A file is read twice: [`CsvSource::count`] walks it once to size the run,
//! then [`CsvSource::stream`] reopens it and yields rows lazily. Nothing from
//! the first pass is cached.

use csv_async::{AsyncReaderBuilder, ByteRecord, StringRecord};
use futures::Stream;
use rollcall_common::{Result, RollcallError};
use std::path::{Path, PathBuf};
use tokio::fs::File;

/// One data line from the input, fields in column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the source file, when known
    pub line: Option<u64>,
    pub fields: Vec<String>,
}

impl RawRow {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            line: None,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    fn from_record(record: &StringRecord) -> Self {
        Self {
            line: record.position().map(|p| p.line()),
            fields: record.iter().map(str::to_string).collect(),
        }
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Header-prefixed, comma-delimited input file
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count data rows, header excluded.
    ///
    /// Rows are counted regardless of their field count so that the total
    /// matches the number of lines the streaming pass will offer. Any read
    /// error fails the whole count.
    pub async fn count(&self) -> Result<u64> {
        let file = File::open(&self.path).await?;
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .create_reader(file);

        let mut record = ByteRecord::new();
        let mut count = 0u64;
        while reader.read_byte_record(&mut record).await? {
            count += 1;
        }

        Ok(count)
    }

    /// Stream data rows in file order, header skipped.
    ///
    /// Malformed rows (wrong field count, invalid UTF-8) come through as `Err`
    /// items and the stream continues; an IO error ends the stream after it is
    /// yielded.
    pub async fn stream(&self) -> Result<impl Stream<Item = Result<RawRow>> + Send + 'static> {
        let file = File::open(&self.path).await?;
        let reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .create_reader(file);

        Ok(futures::stream::unfold(Some(reader), |state| async move {
            let mut reader = state?;
            let mut record = StringRecord::new();

            match reader.read_record(&mut record).await {
                Ok(true) => Some((Ok(RawRow::from_record(&record)), Some(reader))),
                Ok(false) => None,
                Err(e) => {
                    let err = RollcallError::from(e);
                    let next = if err.is_io() { None } else { Some(reader) };
                    Some((Err(err), next))
                }
            }
        }))
    }
}
