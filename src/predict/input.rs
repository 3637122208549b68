// src/predict/input.rs

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{IngestError, IngestResult};

/// The partial record a prediction is asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub mark: f64,
    pub bac_type: String,
    pub scholarship: bool,
    pub interests: String,
}

fn invalid(msg: impl Into<String>) -> IngestError {
    IngestError::Validation(msg.into())
}

impl StudentProfile {
    pub fn new(mark: f64, bac_type: impl Into<String>) -> Self {
        Self {
            mark,
            bac_type: bac_type.into(),
            scholarship: false,
            interests: String::new(),
        }
    }

    pub fn with_scholarship(mut self, scholarship: bool) -> Self {
        self.scholarship = scholarship;
        self
    }

    pub fn with_interests(mut self, interests: impl Into<String>) -> Self {
        self.interests = interests.into();
        self
    }

    /// Validate a request body such as
    /// `{"Mark": 16, "Baccalaureat_Type": "Scientific", "Scholarship": true}`.
    pub fn from_json(body: &Json) -> IngestResult<Self> {
        let obj = body
            .as_object()
            .ok_or_else(|| invalid("request body must be a JSON object"))?;

        let mark = match obj.get("Mark") {
            None | Some(Json::Null) => return Err(invalid("Mark is required")),
            Some(Json::Number(n)) => n.as_f64(),
            Some(Json::String(s)) => s.trim().parse::<f64>().ok(),
            Some(other) => return Err(invalid(format!("Mark must be numeric, got {other}"))),
        }
        .filter(|m| m.is_finite())
        .ok_or_else(|| invalid("Mark must be a finite number"))?;

        let bac_type = match obj.get("Baccalaureat_Type") {
            None | Some(Json::Null) => String::new(),
            Some(Json::String(s)) => s.trim().to_string(),
            Some(other) => {
                return Err(invalid(format!("Baccalaureat_Type must be a string, got {other}")))
            }
        };

        let scholarship = match obj.get("Scholarship") {
            None | Some(Json::Null) => false,
            Some(Json::Bool(b)) => *b,
            Some(Json::String(s)) if s.eq_ignore_ascii_case("true") => true,
            Some(Json::String(s)) if s.eq_ignore_ascii_case("false") => false,
            Some(other) => return Err(invalid(format!("Scholarship must be a boolean, got {other}"))),
        };

        let interests = match obj.get("Interests") {
            None | Some(Json::Null) => String::new(),
            Some(Json::String(s)) => s.trim().to_string(),
            Some(other) => return Err(invalid(format!("Interests must be a string, got {other}"))),
        };

        Ok(Self {
            mark,
            bac_type,
            scholarship,
            interests,
        })
    }

    pub(crate) fn checked_mark(&self) -> IngestResult<f64> {
        if self.mark.is_finite() {
            Ok(self.mark)
        } else {
            Err(invalid("Mark must be a finite number"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_numbers_and_numeric_strings() -> anyhow::Result<()> {
        let p = StudentProfile::from_json(&json!({
            "Mark": 16, "Baccalaureat_Type": "Scientific", "Scholarship": true
        }))?;
        assert_eq!(p, StudentProfile::new(16.0, "Scientific").with_scholarship(true));

        let p = StudentProfile::from_json(&json!({"Mark": " 12.5 ", "Scholarship": "False"}))?;
        assert_eq!(p.mark, 12.5);
        assert!(!p.scholarship);
        assert_eq!(p.bac_type, "");
        Ok(())
    }

    #[test]
    fn rejects_bad_input() {
        for body in [
            json!({}),
            json!({"Mark": null}),
            json!({"Mark": "sixteen"}),
            json!({"Mark": [16]}),
            json!({"Mark": 16, "Scholarship": "maybe"}),
            json!({"Mark": 16, "Baccalaureat_Type": 3}),
            json!({"Mark": 16, "Interests": false}),
            json!("Mark=16"),
        ] {
            assert!(
                matches!(StudentProfile::from_json(&body), Err(IngestError::Validation(_))),
                "accepted {body}"
            );
        }
    }
}
