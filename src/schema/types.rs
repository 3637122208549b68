// src/schema/types.rs

use serde::{Deserialize, Serialize};

/// Inferred kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Json,
    Date,
}

/// What the analyzer learned about one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub ty: ColumnType,
    pub unique_values: usize,
    pub cardinality: f64,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub headers: Vec<String>,
    pub columns: Vec<ColumnProfile>,
    /// Columns named like "S1", "S12": one academic period each.
    pub term_columns: Vec<String>,
    /// Data rows in the whole file, exact even when analysis was sampled.
    pub row_count: usize,
    pub analyzed_rows: usize,
    pub is_sampled: bool,
}

impl SchemaInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}
