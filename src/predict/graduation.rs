// src/predict/graduation.rs

use serde::Serialize;
use tracing::debug;

use super::input::StudentProfile;
use crate::error::IngestResult;
use crate::ingest::Dataset;
use crate::stats::columns::{BAC_TYPE, GRADUATED, MARK, SCHOLARSHIP};
use crate::stats::views::{factors, WeightedFactor};
use crate::stats::{round1, AggregateStatistics};

/// Records scoring above this are "similar" to the profile.
///
/// The similarity score tops out at 37, so with this cutoff every prediction
/// takes the mark-only path; pass a lower cutoff to
/// [`predict_graduation_with_cutoff`] to blend in similar students.
pub const DEFAULT_SIMILARITY_CUTOFF: f64 = 50.0;

pub const LIKELY: &str = "Likely to graduate";
pub const UNLIKELY: &str = "May not graduate";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraduationStats {
    pub currently_graduated: usize,
    pub currently_active: usize,
    pub predicted_to_graduate: usize,
    pub total_students: usize,
    pub similar_students_found: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraduationPrediction {
    /// Percent in [5, 98], one decimal.
    pub probability: f64,
    pub prediction: &'static str,
    pub important_factors: Vec<WeightedFactor>,
    pub graduation_stats: GraduationStats,
}

fn similarity(profile: &StudentProfile, mark: f64, bac: &str, scholarship: bool) -> f64 {
    let mark_term = (10.0 - (profile.mark - mark).abs().min(10.0)) * 0.7;
    let bac_term = if profile.bac_type == bac { 20.0 } else { 0.0 };
    let scholarship_term = if profile.scholarship == scholarship { 10.0 } else { 0.0 };
    mark_term + bac_term + scholarship_term
}

fn mark_factor(mark: f64, threshold: f64) -> f64 {
    if mark >= threshold + 2.0 {
        60.0
    } else if mark >= threshold {
        45.0
    } else if mark >= threshold - 2.0 {
        30.0
    } else {
        15.0
    }
}

fn bac_factor(success_rate: f64) -> f64 {
    if success_rate > 75.0 {
        15.0
    } else if success_rate > 60.0 {
        10.0
    } else if success_rate > 50.0 {
        5.0
    } else {
        0.0
    }
}

/// Graduation likelihood from historically similar students.
///
/// With no similar student the mark alone decides: `(mark / 20) * 80`,
/// clamped to [5, 95].
pub fn predict_graduation(
    dataset: &Dataset,
    stats: &AggregateStatistics,
    profile: &StudentProfile,
) -> IngestResult<GraduationPrediction> {
    predict_graduation_with_cutoff(dataset, stats, profile, DEFAULT_SIMILARITY_CUTOFF)
}

pub fn predict_graduation_with_cutoff(
    dataset: &Dataset,
    stats: &AggregateStatistics,
    profile: &StudentProfile,
    cutoff: f64,
) -> IngestResult<GraduationPrediction> {
    let mark = profile.checked_mark()?;
    let threshold = stats.graduation_threshold;

    // 1) similar historical records; unparseable marks cannot be compared
    let mut similar = 0usize;
    let mut similar_graduates = 0usize;
    for record in &dataset.records {
        let Some(record_mark) = record.number(MARK) else {
            continue;
        };
        let bac = record.text(BAC_TYPE).unwrap_or("");
        if similarity(profile, record_mark, bac, record.flag(SCHOLARSHIP)) > cutoff {
            similar += 1;
            if record.flag(GRADUATED) {
                similar_graduates += 1;
            }
        }
    }
    debug!(similar, similar_graduates, threshold, "similar students");

    // 2) blend observed outcome with threshold-based factors
    let probability = if similar > 0 {
        let mut base = similar_graduates as f64 / similar as f64 * 100.0;
        if base < 10.0 && similar_graduates > 0 {
            base = 10.0;
        }
        let bac_rate = stats
            .success_rate_by_bac
            .get(&profile.bac_type)
            .copied()
            .unwrap_or(0.0);
        let scholarship_helps = stats.graduation_by_scholarship.with_scholarship
            > stats.graduation_by_scholarship.without_scholarship;
        let factor_sum = mark_factor(mark, threshold)
            + bac_factor(bac_rate)
            + if scholarship_helps { 10.0 } else { 0.0 };
        (0.5 * base + 0.5 * factor_sum).clamp(5.0, 98.0)
    } else {
        (mark / 20.0 * 100.0 * 0.8).clamp(5.0, 95.0)
    };

    // 3) cohort context
    let graduated_flag = |r: &crate::record::Record| r.get(GRADUATED).and_then(|v| v.as_bool());
    let currently_active = dataset
        .records
        .iter()
        .filter(|r| graduated_flag(r) == Some(false))
        .count();
    let predicted_to_graduate = dataset
        .records
        .iter()
        .filter(|r| graduated_flag(r) == Some(false))
        .filter(|r| r.number(MARK).is_some_and(|m| m >= threshold))
        .count();

    Ok(GraduationPrediction {
        probability: round1(probability),
        prediction: if probability >= 50.0 { LIKELY } else { UNLIKELY },
        important_factors: factors(&[("Bac mark", 60), ("Bac type", 25), ("Scholarship", 15)]),
        graduation_stats: GraduationStats {
            currently_graduated: dataset.records.iter().filter(|r| r.flag(GRADUATED)).count(),
            currently_active,
            predicted_to_graduate,
            total_students: dataset.len(),
            similar_students_found: similar,
        },
    })
}
