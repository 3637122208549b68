// src/record/mod.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::IngestWarning;

/// Column names that hold one academic period each: a letter followed by digits ("S7").
static TERM_COLUMN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][0-9]+$").unwrap());

pub fn is_term_column(name: &str) -> bool {
    TERM_COLUMN.is_match(name)
}

/// The structured literal carried by term columns, `{"mark": 14.5}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermValue {
    pub mark: f64,
}

impl TermValue {
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str::<TermValue>(raw.trim())
            .ok()
            .filter(|t| t.mark.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Term(TermValue),
    Text(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric reading of a passthrough cell; `None` when it does not parse.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// The term mark, also accepting a string that still parses as a structured literal.
    pub fn term_mark(&self) -> Option<f64> {
        match self {
            Value::Term(t) => Some(t.mark),
            Value::Text(s) if !s.is_empty() => TermValue::parse(s).map(|t| t.mark),
            _ => None,
        }
    }
}

/// One decoded row. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    fields: HashMap<String, Value>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_text)
    }

    /// `true` only for a decoded boolean `true`.
    pub fn flag(&self, column: &str) -> bool {
        self.get(column).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Value::as_number)
    }

    /// Category label for grouping; absent, empty or non-text cells become "Unknown".
    pub fn category(&self, column: &str) -> String {
        match self.text(column) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => "Unknown".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Decode one already length-checked row against `header`.
///
/// Booleans are recognised case-insensitively, term columns are parsed as
/// `{"mark": n}` (falling back to the raw string with a warning), everything
/// else passes through as text.
pub fn decode<S: AsRef<str>>(cells: &[S], header: &[String]) -> (Record, Vec<IngestWarning>) {
    let mut fields = HashMap::with_capacity(header.len());
    let mut warnings = Vec::new();

    for (column, cell) in header.iter().zip(cells.iter()) {
        let v = cell.as_ref().trim();

        let value = if v.eq_ignore_ascii_case("true") {
            Value::Bool(true)
        } else if v.eq_ignore_ascii_case("false") {
            Value::Bool(false)
        } else if is_term_column(column) && !v.is_empty() {
            match TermValue::parse(v) {
                Some(t) => Value::Term(t),
                None => {
                    warn!(column = %column, value = %v, "unparseable term value, keeping raw string");
                    warnings.push(IngestWarning::StructuredValue {
                        column: column.clone(),
                        value: v.to_string(),
                    });
                    Value::Text(v.to_string())
                }
            }
        } else {
            Value::Text(v.to_string())
        };

        fields.insert(column.clone(), value);
    }

    (Record { fields }, warnings)
}

#[cfg(test)]
pub(crate) fn record_from(pairs: &[(&str, &str)]) -> Record {
    let header: Vec<String> = pairs.iter().map(|(k, _)| k.to_string()).collect();
    let cells: Vec<&str> = pairs.iter().map(|(_, v)| *v).collect();
    decode(&cells, &header).0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn booleans_are_case_insensitive() {
        let (rec, warnings) = decode(&["True", "false", "Maybe"], &header(&["A", "B", "C"]));
        assert!(warnings.is_empty());
        assert_eq!(rec.get("A"), Some(&Value::Bool(true)));
        assert_eq!(rec.get("B"), Some(&Value::Bool(false)));
        assert_eq!(rec.get("C"), Some(&Value::Text("Maybe".into())));
    }

    #[test]
    fn term_columns_decode_structured_marks() {
        let (rec, warnings) = decode(&[r#"{"mark": 14.5}"#], &header(&["S3"]));
        assert!(warnings.is_empty());
        assert_eq!(rec.get("S3"), Some(&Value::Term(TermValue { mark: 14.5 })));
    }

    #[test]
    fn bad_term_value_is_kept_with_warning() {
        let (rec, warnings) = decode(&["not-json"], &header(&["S3"]));
        assert_eq!(rec.get("S3"), Some(&Value::Text("not-json".into())));
        assert_eq!(
            warnings,
            vec![IngestWarning::StructuredValue {
                column: "S3".into(),
                value: "not-json".into()
            }]
        );
    }

    #[test]
    fn numbers_stay_text_and_empty_terms_are_not_parsed() {
        let (rec, warnings) = decode(&[" 16 ", ""], &header(&["Mark", "S1"]));
        assert!(warnings.is_empty());
        assert_eq!(rec.get("Mark"), Some(&Value::Text("16".into())));
        assert_eq!(rec.number("Mark"), Some(16.0));
        assert_eq!(rec.get("S1"), Some(&Value::Text(String::new())));
        assert_eq!(rec.get("S1").and_then(Value::term_mark), None);
    }

    #[test]
    fn term_pattern_needs_one_letter_then_digits() {
        assert!(is_term_column("S7"));
        assert!(is_term_column("t12"));
        assert!(!is_term_column("S"));
        assert!(!is_term_column("SS1"));
        assert!(!is_term_column("S1a"));
        assert!(!is_term_column("Start_Year"));
    }

    #[test]
    fn category_falls_back_to_unknown() {
        let rec = record_from(&[("Gender", ""), ("City", "Fes")]);
        assert_eq!(rec.category("Gender"), "Unknown");
        assert_eq!(rec.category("City"), "Fes");
        assert_eq!(rec.category("Nationality"), "Unknown");
    }
}
