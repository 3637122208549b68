// src/schema/features.rs

use serde::{Deserialize, Serialize};

use super::types::SchemaInfo;

/// Statistics and predictions that can be served for a given set of columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    DataSummary,
    GenderStats,
    NationalityStats,
    CityStats,
    BacTypeStats,
    SchoolSpecialtyStats,
    ScholarshipStats,
    MarkCorrelations,
    GraduationPrediction,
    SpecialtyPrediction,
    FacultyRevenue,
    NextYearStudents,
    AverageFee,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::DataSummary => "data_summary",
            Feature::GenderStats => "gender_stats",
            Feature::NationalityStats => "nationality_stats",
            Feature::CityStats => "city_stats",
            Feature::BacTypeStats => "bac_type_stats",
            Feature::SchoolSpecialtyStats => "school_specialty_stats",
            Feature::ScholarshipStats => "scholarship_stats",
            Feature::MarkCorrelations => "mark_correlations",
            Feature::GraduationPrediction => "graduation_prediction",
            Feature::SpecialtyPrediction => "specialty_prediction",
            Feature::FacultyRevenue => "faculty_revenue",
            Feature::NextYearStudents => "next_year_students",
            Feature::AverageFee => "average_fee",
        }
    }

    /// Columns that must all be present for the feature to be meaningful.
    fn required_columns(&self) -> &'static [&'static str] {
        use crate::stats::columns::*;
        match self {
            Feature::DataSummary => &[],
            Feature::GenderStats => &[GENDER],
            Feature::NationalityStats => &[NATIONALITY],
            Feature::CityStats => &[CITY],
            Feature::BacTypeStats => &[BAC_TYPE],
            Feature::SchoolSpecialtyStats => &[SCHOOL, SPECIALTY],
            Feature::ScholarshipStats => &[SCHOLARSHIP],
            // also satisfied by term columns, see `available_features`
            Feature::MarkCorrelations => &[MARK],
            Feature::GraduationPrediction => &[MARK, GRADUATED],
            Feature::SpecialtyPrediction => &[MARK, BAC_TYPE, SPECIALTY],
            Feature::FacultyRevenue | Feature::NextYearStudents | Feature::AverageFee => {
                &[SCHOOL, START_YEAR]
            }
        }
    }

    pub const ALL: [Feature; 13] = [
        Feature::DataSummary,
        Feature::GenderStats,
        Feature::NationalityStats,
        Feature::CityStats,
        Feature::BacTypeStats,
        Feature::SchoolSpecialtyStats,
        Feature::ScholarshipStats,
        Feature::MarkCorrelations,
        Feature::GraduationPrediction,
        Feature::SpecialtyPrediction,
        Feature::FacultyRevenue,
        Feature::NextYearStudents,
        Feature::AverageFee,
    ];
}

/// Feature tags whose required columns are all present in `schema`.
pub fn available_features(schema: &SchemaInfo) -> Vec<Feature> {
    Feature::ALL
        .iter()
        .copied()
        .filter(|feature| match feature {
            Feature::MarkCorrelations => {
                schema.has_column(crate::stats::columns::MARK) || !schema.term_columns.is_empty()
            }
            other => other.required_columns().iter().all(|c| schema.has_column(c)),
        })
        .collect()
}
