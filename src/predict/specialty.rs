// src/predict/specialty.rs

use serde::Serialize;
use std::collections::BTreeMap;

use super::input::StudentProfile;
use crate::error::IngestResult;
use crate::ingest::Dataset;
use crate::record::Record;
use crate::stats::columns::{BAC_TYPE, GRADUATED, MARK, SPECIALTY};
use crate::stats::views::{factors, WeightedFactor};
use crate::stats::{percent, round1};

const MAX_RECOMMENDATIONS: usize = 3;
const MARK_WINDOW: f64 = 2.0;
const PADDING_PROBABILITY: f64 = 50.0;

/// Interest category → keywords looked for in specialty names.
const INTEREST_KEYWORDS: [(&str, &[&str]); 6] = [
    (
        "Technology",
        &["Computer Science", "Data Science", "Information Systems", "Software"],
    ),
    (
        "Business",
        &["Finance", "Marketing", "Management", "Business", "Accounting"],
    ),
    (
        "Medicine",
        &["Medicine", "Pharmacy", "Nursing", "Biotechnology", "Medical"],
    ),
    (
        "Engineering",
        &["Engineering", "Mechanical", "Civil", "Electrical", "Environmental", "Automotive"],
    ),
    ("Arts", &["Arts", "Visual", "Design", "Architecture"]),
    (
        "Law",
        &["Law", "Legal", "Corporate Law", "Public Law", "International Law"],
    ),
];

fn interest_matches(interests: &str, specialty: &str) -> bool {
    let specialty = specialty.to_lowercase();
    INTEREST_KEYWORDS
        .iter()
        .find(|(category, _)| category.eq_ignore_ascii_case(interests.trim()))
        .is_some_and(|(_, keywords)| {
            keywords
                .iter()
                .any(|k| specialty.contains(&k.to_lowercase()))
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialtyScore {
    pub specialty: String,
    /// Percent in [30, 95] for scored entries, 50 for padding.
    pub probability: f64,
    pub avg_mark: f64,
    pub success_rate: f64,
    pub based_on_real_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialtyRecommendation {
    pub recommendations: Vec<SpecialtyScore>,
    pub important_factors: Vec<WeightedFactor>,
}

struct Scored {
    name: String,
    score: f64,
    avg_mark: f64,
    success_rate: f64,
}

fn score(profile: &StudentProfile, name: &str, records: &[&Record]) -> Scored {
    let total = records.len();
    let bac = records
        .iter()
        .filter(|r| r.text(BAC_TYPE).unwrap_or("") == profile.bac_type)
        .count();
    let near_mark = records
        .iter()
        .filter_map(|r| r.number(MARK))
        .filter(|m| (m - profile.mark).abs() <= MARK_WINDOW)
        .count();
    let graduated = records.iter().filter(|r| r.flag(GRADUATED)).count();
    let marks: Vec<f64> = records.iter().filter_map(|r| r.number(MARK)).collect();

    let share = |n: usize| n as f64 / total.max(1) as f64;
    let interest = if interest_matches(&profile.interests, name) { 1.0 } else { 0.0 };
    Scored {
        name: name.to_string(),
        score: 30.0 * share(bac) + 30.0 * share(near_mark) + 20.0 * share(graduated) + 20.0 * interest,
        avg_mark: if marks.is_empty() {
            0.0
        } else {
            round1(marks.iter().sum::<f64>() / marks.len() as f64)
        },
        success_rate: round1(percent(graduated, total)),
    }
}

/// Up to three specialties ranked by how students like `profile` fared in them.
pub fn recommend_specialties(
    dataset: &Dataset,
    profile: &StudentProfile,
) -> IngestResult<SpecialtyRecommendation> {
    profile.checked_mark()?;

    let mut by_specialty: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
    for record in &dataset.records {
        if let Some(name) = record.text(SPECIALTY).filter(|s| !s.is_empty()) {
            by_specialty.entry(name).or_default().push(record);
        }
    }

    let mut scored: Vec<Scored> = by_specialty
        .iter()
        .map(|(name, records)| score(profile, name, records))
        .collect();
    // names break ties so equal scores rank the same way every time
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.name.cmp(&b.name)));

    let mut recommendations: Vec<SpecialtyScore> = scored
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|s| SpecialtyScore {
            specialty: s.name,
            probability: round1(s.score.clamp(30.0, 95.0)),
            avg_mark: s.avg_mark,
            success_rate: s.success_rate,
            based_on_real_data: true,
        })
        .collect();

    for name in by_specialty.keys() {
        if recommendations.len() >= MAX_RECOMMENDATIONS {
            break;
        }
        if recommendations.iter().all(|r| r.specialty != *name) {
            recommendations.push(SpecialtyScore {
                specialty: name.to_string(),
                probability: PADDING_PROBABILITY,
                avg_mark: 0.0,
                success_rate: 0.0,
                based_on_real_data: false,
            });
        }
    }

    Ok(SpecialtyRecommendation {
        recommendations,
        important_factors: factors(&[
            ("Bac type fit", 30),
            ("Mark fit", 30),
            ("Success rate", 20),
            ("Interest match", 20),
        ]),
    })
}
