// src/schema/derive.rs

use csv::ReaderBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, instrument};

use super::types::{ColumnProfile, ColumnType, SchemaInfo};
use crate::error::{IngestError, IngestResult};
use crate::ingest::{count_data_rows, CommentFilter};
use crate::record::is_term_column;

/// Files above this size are analyzed on a prefix unless a cap is given.
pub const LARGE_FILE_BYTES: u64 = 50 * 1024 * 1024;
pub const LARGE_FILE_SAMPLE_ROWS: usize = 50_000;
const MAX_TRACKED_VALUES: usize = 1_000;
const MAX_SAMPLES: usize = 5;

static DATE_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+-[0-9]+-[0-9]+$").unwrap());

/// Classify one raw cell, `None` when it says nothing beyond "string".
fn classify(cell: &str) -> Option<ColumnType> {
    if cell.parse::<f64>().is_ok() {
        return Some(ColumnType::Number);
    }
    if cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false") {
        return Some(ColumnType::Boolean);
    }
    if cell.starts_with('{')
        && cell.ends_with('}')
        && serde_json::from_str::<serde_json::Value>(cell).is_ok()
    {
        return Some(ColumnType::Json);
    }
    if cell.len() >= 8 && DATE_SHAPE.is_match(cell) {
        return Some(ColumnType::Date);
    }
    None
}

struct ColumnState {
    ty: ColumnType,
    values: HashSet<String>,
    samples: Vec<String>,
}

impl ColumnState {
    fn new() -> Self {
        Self {
            ty: ColumnType::String,
            values: HashSet::new(),
            samples: Vec::with_capacity(MAX_SAMPLES),
        }
    }

    fn observe(&mut self, cell: &str) {
        if self.values.len() < MAX_TRACKED_VALUES {
            self.values.insert(cell.to_string());
        }
        if self.samples.len() < MAX_SAMPLES && !cell.is_empty() {
            self.samples.push(cell.to_string());
        }
        // the first non-string reading sticks
        if self.ty == ColumnType::String {
            if let Some(ty) = classify(cell) {
                self.ty = ty;
            }
        }
    }
}

/// Inspect (a prefix of) the CSV at `path` and profile each column.
///
/// - With no `sample_rows` and a file above 50 MB, only the first 50 000 rows
///   are analyzed.
/// - Rows with the wrong cell count are counted but not classified.
/// - When a cap applied, the exact data-row total comes from a second pass.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn analyze<P: AsRef<Path>>(path: P, sample_rows: Option<usize>) -> IngestResult<SchemaInfo> {
    let path = path.as_ref();
    let size = fs::metadata(path)
        .map_err(|e| IngestError::from_io(path, e))?
        .len();

    // 1) decide on the analysis cap
    let sample_rows = match sample_rows {
        None if size > LARGE_FILE_BYTES => {
            info!(
                size_mb = size / (1024 * 1024),
                cap = LARGE_FILE_SAMPLE_ROWS,
                "large file, sampling schema analysis"
            );
            Some(LARGE_FILE_SAMPLE_ROWS)
        }
        other => other,
    };

    // 2) header
    let source = CommentFilter::open(path).map_err(|e| IngestError::from_io(path, e))?;
    let mut rows = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source)
        .into_records();
    let headers: Vec<String> = match rows.next() {
        Some(first) => first?.iter().map(|h| h.trim().to_string()).collect(),
        None => Vec::new(),
    };

    // 3) walk rows, one state per column
    let mut states: Vec<ColumnState> = headers.iter().map(|_| ColumnState::new()).collect();
    let mut analyzed = 0usize;
    for row in rows {
        if sample_rows.is_some_and(|cap| analyzed >= cap) {
            break;
        }
        let row = row?;
        analyzed += 1;
        if row.len() != headers.len() {
            debug!(row = analyzed, "skipping row with wrong cell count");
            continue;
        }
        for (state, cell) in states.iter_mut().zip(row.iter()) {
            state.observe(cell);
        }
        if analyzed % 10_000 == 0 {
            debug!(rows = analyzed, "schema analysis progress");
        }
    }

    // 4) exact total when the walk was capped
    let row_count = match sample_rows {
        Some(_) => count_data_rows(path)?,
        None => analyzed,
    };

    let columns = headers
        .iter()
        .zip(states)
        .map(|(name, state)| {
            let unique_values = state.values.len();
            let cardinality = unique_values as f64 / analyzed.max(1) as f64;
            ColumnProfile {
                name: name.clone(),
                ty: state.ty,
                unique_values,
                cardinality: (cardinality * 1000.0).round() / 1000.0,
                samples: state.samples,
            }
        })
        .collect();

    let term_columns = headers
        .iter()
        .filter(|h| is_term_column(h))
        .cloned()
        .collect();

    Ok(SchemaInfo {
        headers,
        columns,
        term_columns,
        row_count,
        analyzed_rows: analyzed,
        is_sampled: sample_rows.is_some_and(|cap| analyzed >= cap),
    })
}

/// Serving-layer entry point: failures are logged and reported as `None`.
pub fn analyze_schema<P: AsRef<Path>>(path: P, sample_rows: Option<usize>) -> Option<SchemaInfo> {
    match analyze(path.as_ref(), sample_rows) {
        Ok(schema) => {
            info!(
                columns = schema.headers.len(),
                rows = schema.row_count,
                analyzed = schema.analyzed_rows,
                "schema analyzed"
            );
            Some(schema)
        }
        Err(e) => {
            error!("schema analysis of {} failed: {}", path.as_ref().display(), e);
            None
        }
    }
}
