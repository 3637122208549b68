// src/ingest/reader.rs

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::comments::CommentFilter;
use super::memory::MemoryProbe;
use crate::error::{IngestError, IngestResult, IngestWarning};
use crate::record::{decode, Record};

type Source = CommentFilter<BufReader<File>>;

/// One bounded slice of decoded rows, handed to the caller by value.
#[derive(Debug)]
pub struct Batch {
    pub index: usize,
    pub records: Vec<Record>,
    pub warnings: Vec<IngestWarning>,
}

/// Reads a CSV file as a sequence of record batches.
///
/// Every call to [`ChunkedCsvReader::batches`] reopens the file, so the
/// sequence can be restarted from scratch as often as needed.
#[derive(Debug, Clone)]
pub struct ChunkedCsvReader {
    path: PathBuf,
    batch_size: usize,
    max_rows: Option<usize>,
}

impl ChunkedCsvReader {
    pub fn new(path: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self {
            path: path.into(),
            batch_size: batch_size.max(1),
            max_rows: None,
        }
    }

    /// Stop after this many successfully decoded rows.
    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Open the file and read its header. Fails before yielding anything if the
    /// file is missing or unreadable.
    pub fn batches(&self) -> IngestResult<Batches> {
        if !self.path.exists() {
            return Err(IngestError::FileNotFound(self.path.clone()));
        }
        let source = CommentFilter::open(&self.path)
            .map_err(|e| IngestError::from_io(&self.path, e))?;
        if source.strips_comments() {
            info!(path = %self.path.display(), "comment lines detected, filtering them out");
        }

        let mut records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(source)
            .into_records();

        let header: Vec<String> = match records.next() {
            Some(first) => first?.iter().map(|h| h.trim().to_string()).collect(),
            None => {
                warn!(path = %self.path.display(), "no header line, file is empty");
                Vec::new()
            }
        };
        let done = header.is_empty();

        Ok(Batches {
            records,
            header: Arc::new(header),
            batch_size: self.batch_size,
            max_rows: self.max_rows,
            produced: 0,
            row_number: 0,
            batch_index: 0,
            done,
            truncated: false,
            probe: MemoryProbe::new(),
        })
    }
}

/// Lazy iterator over [`Batch`]es. Holds no reference to batches already returned.
pub struct Batches {
    records: StringRecordsIntoIter<Source>,
    header: Arc<Vec<String>>,
    batch_size: usize,
    max_rows: Option<usize>,
    produced: usize,
    row_number: u64,
    batch_index: usize,
    done: bool,
    truncated: bool,
    probe: MemoryProbe,
}

impl Batches {
    pub fn header(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.header)
    }

    /// True once the row cap stopped reading with data rows still left in the file.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn cap_reached(&self) -> bool {
        self.max_rows.is_some_and(|cap| self.produced >= cap)
    }

    fn decode_row(&mut self, row: &StringRecord, warnings: &mut Vec<IngestWarning>) -> Option<Record> {
        self.row_number += 1;
        if row.len() != self.header.len() {
            warn!(
                row = self.row_number,
                expected = self.header.len(),
                found = row.len(),
                "column count mismatch, skipping row"
            );
            warnings.push(IngestWarning::MalformedRow {
                row: self.row_number,
                expected: self.header.len(),
                found: row.len(),
            });
            return None;
        }
        let cells: Vec<&str> = row.iter().collect();
        let (record, row_warnings) = decode(&cells, &self.header);
        warnings.extend(row_warnings);
        Some(record)
    }
}

impl Iterator for Batches {
    type Item = IngestResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut records = Vec::with_capacity(self.batch_size);
        let mut warnings = Vec::new();

        while records.len() < self.batch_size {
            if self.cap_reached() {
                self.truncated = matches!(self.records.next(), Some(Ok(_)));
                info!(max_rows = ?self.max_rows, truncated = self.truncated, "row cap reached");
                self.done = true;
                break;
            }
            match self.records.next() {
                Some(Ok(row)) => {
                    if let Some(record) = self.decode_row(&row, &mut warnings) {
                        records.push(record);
                        self.produced += 1;
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if records.is_empty() && warnings.is_empty() {
            return None;
        }

        let batch = Batch {
            index: self.batch_index,
            records,
            warnings,
        };
        self.batch_index += 1;
        debug!(
            batch = batch.index,
            rows = batch.records.len(),
            total = self.produced,
            rss_bytes = ?self.probe.resident_bytes(),
            "batch decoded"
        );
        Some(Ok(batch))
    }
}
