// src/ingest/dataset.rs

use csv::ReaderBuilder;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument};

use super::comments::CommentFilter;
use super::reader::ChunkedCsvReader;
use crate::error::{IngestError, IngestResult, IngestWarning};
use crate::record::Record;

/// Decoded rows plus what is known about the file they came from.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub header: Vec<String>,
    pub records: Vec<Record>,
    /// Data rows in the file; exceeds `records.len()` when a row cap applied.
    pub total_rows: usize,
    pub sampled: bool,
    pub sample_size: Option<usize>,
    pub warnings: Vec<IngestWarning>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.header.iter().any(|h| h == column)
    }

    pub fn summary(&self) -> DataSummary {
        DataSummary {
            row_count: self.records.len(),
            column_count: self.header.len(),
            columns: self.header.clone(),
            total_rows: self.total_rows,
            sampled: self.sampled,
            warnings: self.warnings.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub total_rows: usize,
    pub sampled: bool,
    pub warnings: usize,
}

/// Read the whole file (up to `max_rows` valid rows) into a [`Dataset`].
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_dataset<P: AsRef<Path>>(
    path: P,
    max_rows: Option<usize>,
    batch_size: usize,
) -> IngestResult<Dataset> {
    let path = path.as_ref();
    let start = Instant::now();
    let reader = ChunkedCsvReader::new(path, batch_size).with_max_rows(max_rows);
    let mut batches = reader.batches()?;

    let mut dataset = Dataset {
        header: (*batches.header()).clone(),
        ..Dataset::default()
    };
    for batch in batches.by_ref() {
        let batch = batch?;
        dataset.records.extend(batch.records);
        dataset.warnings.extend(batch.warnings);
    }

    // only a cap that left rows unread needs the counting pass
    dataset.sampled = batches.truncated();
    if dataset.sampled {
        dataset.total_rows = count_data_rows(path)?;
        dataset.sample_size = max_rows;
    } else {
        dataset.total_rows = dataset.records.len() + malformed_rows(&dataset.warnings);
    }

    info!(
        rows = dataset.records.len(),
        total = dataset.total_rows,
        skipped = malformed_rows(&dataset.warnings),
        sampled = dataset.sampled,
        elapsed = ?start.elapsed(),
        "dataset loaded"
    );
    Ok(dataset)
}

pub(crate) fn malformed_rows(warnings: &[IngestWarning]) -> usize {
    warnings
        .iter()
        .filter(|w| matches!(w, IngestWarning::MalformedRow { .. }))
        .count()
}

/// Exact number of data rows (comment lines and header excluded), by a full pass.
pub fn count_data_rows(path: &Path) -> IngestResult<usize> {
    let source = CommentFilter::open(path).map_err(|e| IngestError::from_io(path, e))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source);

    let mut record = csv::ByteRecord::new();
    let mut lines = 0usize;
    while rdr.read_byte_record(&mut record)? {
        lines += 1;
    }
    Ok(lines.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> Result<NamedTempFile> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(content.as_bytes())?;
        Ok(tmp)
    }

    #[test]
    fn short_row_is_dropped_and_recorded() -> Result<()> {
        let tmp = csv_file("A,B,C,D,E\n1,2,3,4,5\n1,2,3,4\n6,7,8,9,10\n")?;
        let ds = load_dataset(tmp.path(), None, 2)?;
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.total_rows, 3);
        assert_eq!(
            ds.warnings,
            vec![IngestWarning::MalformedRow {
                row: 2,
                expected: 5,
                found: 4
            }]
        );
        Ok(())
    }

    #[test]
    fn row_cap_reports_true_total() -> Result<()> {
        let mut content = String::from("// generated\nID,Mark\n");
        for i in 0..10 {
            content.push_str(&format!("E{},{}\n", i, 10 + i));
        }
        let tmp = csv_file(&content)?;
        let ds = load_dataset(tmp.path(), Some(4), 3)?;
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.total_rows, 10);
        assert!(ds.sampled);
        assert_eq!(ds.sample_size, Some(4));
        assert_eq!(ds.header, vec!["ID", "Mark"]);
        Ok(())
    }

    #[test]
    fn cap_above_file_size_is_not_sampling() -> Result<()> {
        let tmp = csv_file("ID\nE1\nE2\n")?;
        let ds = load_dataset(tmp.path(), Some(50), 10)?;
        assert_eq!(ds.len(), 2);
        assert!(!ds.sampled);
        assert_eq!(ds.sample_size, None);
        Ok(())
    }

    #[test]
    fn malformed_row_under_a_roomy_cap_is_not_sampling() -> Result<()> {
        let tmp = csv_file("ID,Gender\nE1,Male\nbad\nE2,Female\n")?;
        let ds = load_dataset(tmp.path(), Some(50), 10)?;
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.total_rows, 3);
        assert!(!ds.sampled);
        assert_eq!(ds.sample_size, None);
        Ok(())
    }

    #[test]
    fn reader_warnings_of_both_kinds_reach_the_dataset() -> Result<()> {
        let tmp = csv_file("ID,Gender,S1\nE1,Male,not-json\nE2,Female\nE3,Male,\"{\"\"mark\"\":12}\"\n")?;
        let ds = load_dataset(tmp.path(), Some(10), 2)?;
        assert_eq!(ds.len(), 2);
        assert!(!ds.sampled);
        assert_eq!(
            ds.warnings,
            vec![
                IngestWarning::StructuredValue {
                    column: "S1".into(),
                    value: "not-json".into()
                },
                IngestWarning::MalformedRow {
                    row: 2,
                    expected: 3,
                    found: 2
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let err = load_dataset("/no/such/students.csv", None, 100).unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound(_)));
    }
}
