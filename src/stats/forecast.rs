// src/stats/forecast.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::aggregate::AggregateStatistics;
use super::columns::START_YEAR;
use super::round1;
use super::views::{factors, WeightedFactor};
use crate::ingest::Dataset;

/// Keyword rule: a school whose lowercased name contains any keyword pays `fee`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeRule {
    pub keywords: Vec<&'static str>,
    pub fee: u64,
}

/// Annual fee per school, looked up by keywords in the school name.
///
/// Rules are tried in order; the first match wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchoolFees {
    pub rules: Vec<FeeRule>,
    pub default_fee: u64,
}

impl Default for SchoolFees {
    fn default() -> Self {
        let rule = |keywords: &[&'static str], fee| FeeRule {
            keywords: keywords.to_vec(),
            fee,
        };
        Self {
            rules: vec![
                rule(&["medic", "medec", "pharma"], 75_000),
                rule(&["business", "commerce", "management"], 60_000),
                rule(&["engine"], 55_000),
                rule(&["law", "droit"], 52_000),
                rule(&["it", "comput", "info"], 50_000),
                rule(&["art", "design"], 45_000),
            ],
            default_fee: 48_000,
        }
    }
}

impl SchoolFees {
    pub fn fee_for(&self, school: &str) -> u64 {
        let name = school.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.keywords.iter().any(|k| name.contains(k)))
            .map_or(self.default_fee, |r| r.fee)
    }

    fn per_school(&self, stats: &AggregateStatistics) -> BTreeMap<String, u64> {
        stats
            .schools
            .keys()
            .map(|s| (s.clone(), self.fee_for(s)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighestRevenue {
    pub faculty: String,
    pub amount: u64,
    pub student_count: usize,
    pub average_fee: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialtyRevenue {
    pub school: String,
    pub specialty: String,
    pub count: usize,
    pub fee: u64,
    pub revenue: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacultyRevenue {
    pub faculty_revenues: BTreeMap<String, u64>,
    pub highest_revenue: Option<HighestRevenue>,
    pub school_fees: BTreeMap<String, u64>,
    /// Keyed "<school> - <specialty>".
    pub revenue_per_specialty: BTreeMap<String, SpecialtyRevenue>,
}

/// Revenue per school and per school/specialty pair, students times fee.
pub fn faculty_revenue(stats: &AggregateStatistics, fees: &SchoolFees) -> FacultyRevenue {
    let school_fees = fees.per_school(stats);
    let faculty_revenues: BTreeMap<String, u64> = stats
        .schools
        .iter()
        .map(|(school, &count)| (school.clone(), count as u64 * school_fees[school]))
        .collect();

    // ties go to the alphabetically first school
    let mut highest: Option<(&String, u64)> = None;
    for (school, &amount) in &faculty_revenues {
        if highest.map_or(true, |(_, best)| amount > best) {
            highest = Some((school, amount));
        }
    }
    let highest_revenue = highest.map(|(school, amount)| HighestRevenue {
        faculty: school.clone(),
        amount,
        student_count: stats.schools[school],
        average_fee: school_fees[school],
    });

    let mut revenue_per_specialty = BTreeMap::new();
    for (school, specialties) in &stats.school_specialty_distribution {
        let fee = fees.fee_for(school);
        for (specialty, &count) in specialties {
            revenue_per_specialty.insert(
                format!("{school} - {specialty}"),
                SpecialtyRevenue {
                    school: school.clone(),
                    specialty: specialty.clone(),
                    count,
                    fee,
                    revenue: count as u64 * fee,
                },
            );
        }
    }

    FacultyRevenue {
        faculty_revenues,
        highest_revenue,
        school_fees,
        revenue_per_specialty,
    }
}

const DEFAULT_GROWTH: f64 = 0.07;
const MIN_GROWTH: f64 = -0.05;
const MAX_GROWTH: f64 = 0.15;
/// Below this many distinct start years the history is padded backwards.
const MIN_HISTORY_YEARS: usize = 3;
const PAD_DECAY: f64 = 0.95;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolForecast {
    pub school: String,
    pub predicted: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentForecast {
    pub current_year: i32,
    pub next_year: i32,
    pub historical_counts: BTreeMap<i32, u64>,
    /// Percent, one decimal.
    pub avg_growth_rate: f64,
    pub predicted_count: u64,
    /// Largest first.
    pub by_school: Vec<SchoolForecast>,
    pub growth_factors: Vec<WeightedFactor>,
}

fn start_year_counts(dataset: &Dataset) -> BTreeMap<i32, u64> {
    let mut counts = BTreeMap::new();
    for record in &dataset.records {
        let year = record
            .text(START_YEAR)
            .filter(|y| !y.is_empty() && y.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|y| y.parse::<i32>().ok());
        if let Some(year) = year {
            *counts.entry(year).or_insert(0) += 1;
        }
    }
    counts
}

fn enrollment_history(dataset: &Dataset, total: usize, reference_year: i32) -> BTreeMap<i32, u64> {
    let mut history = start_year_counts(dataset);
    let Some((&latest, &latest_count)) = history.iter().next_back() else {
        // no usable start years: a synthetic ramp ending at today's headcount
        let total = total as f64;
        return [(4, 0.7), (3, 0.8), (2, 0.9), (1, 0.95), (0, 1.0)]
            .into_iter()
            .map(|(back, share)| (reference_year - back, (total * share) as u64))
            .collect();
    };
    if history.len() < MIN_HISTORY_YEARS {
        for i in 1..=4 {
            history
                .entry(latest - i)
                .or_insert((latest_count as f64 * PAD_DECAY.powi(i)) as u64);
        }
    }
    history
}

/// Next intake, extrapolated from the `Start_Year` history.
pub fn next_year_students(
    dataset: &Dataset,
    stats: &AggregateStatistics,
    reference_year: i32,
) -> EnrollmentForecast {
    let history = enrollment_history(dataset, stats.total_students, reference_year);

    let counts: Vec<u64> = history.values().copied().collect();
    let rates: Vec<f64> = counts
        .windows(2)
        .filter(|w| w[0] > 0)
        .map(|w| (w[1] as f64 - w[0] as f64) / w[0] as f64)
        .collect();
    let growth = if rates.is_empty() {
        DEFAULT_GROWTH
    } else {
        (rates.iter().sum::<f64>() / rates.len() as f64).clamp(MIN_GROWTH, MAX_GROWTH)
    };

    let (current_year, current_count) = history
        .iter()
        .next_back()
        .map_or((reference_year, 0), |(&y, &c)| (y, c));
    let predicted_count = (current_count as f64 * (1.0 + growth)) as u64;

    let mut by_school: Vec<SchoolForecast> = stats
        .schools
        .iter()
        .map(|(school, &count)| SchoolForecast {
            school: school.clone(),
            predicted: (predicted_count as f64 * count as f64 / stats.total_students.max(1) as f64)
                as u64,
        })
        .collect();
    by_school.sort_by(|a, b| b.predicted.cmp(&a.predicted).then_with(|| a.school.cmp(&b.school)));

    EnrollmentForecast {
        current_year,
        next_year: current_year + 1,
        historical_counts: history,
        avg_growth_rate: round1(growth * 100.0),
        predicted_count,
        by_school,
        growth_factors: factors(&[
            ("Historical enrollment trend", 40),
            ("School academic performance", 25),
            ("Specialty popularity", 20),
            ("General economic factors", 15),
        ]),
    }
}

/// Yearly inflation used to deflate fees backwards from the reference year.
const INFLATION: [(i32, f64); 5] = [
    (2019, 0.035),
    (2020, 0.042),
    (2021, 0.038),
    (2022, 0.047),
    (2023, 0.052),
];
const DEFAULT_INFLATION: f64 = 0.04;
const PROJECTED_INFLATION: f64 = 0.052;
const MARKET_ADJUSTMENT: f64 = 0.01;
const COST_INCREASE: f64 = 0.008;
const FALLBACK_AVERAGE_FEE: u64 = 55_000;
const FEE_CONFIDENCE: u32 = 85;

fn inflation(year: i32) -> f64 {
    INFLATION
        .iter()
        .find(|(y, _)| *y == year)
        .map_or(DEFAULT_INFLATION, |(_, r)| *r)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeForecast {
    pub current_year: i32,
    pub next_year: i32,
    pub current_avg_fee: u64,
    pub historical_fees: BTreeMap<i32, u64>,
    pub predicted_fee: u64,
    pub increase_percentage: u32,
    pub confidence: u32,
    pub fee_factors: Vec<WeightedFactor>,
    pub predicted_fees_by_school: BTreeMap<String, u64>,
}

/// Student-weighted average fee, its deflated history and next year's projection.
pub fn average_fee(stats: &AggregateStatistics, fees: &SchoolFees, reference_year: i32) -> FeeForecast {
    let school_fees = fees.per_school(stats);

    let (weighted, students) = stats
        .schools
        .iter()
        .fold((0u64, 0u64), |(sum, n), (school, &count)| {
            (sum + school_fees[school] * count as u64, n + count as u64)
        });
    let current_avg_fee = if students > 0 {
        weighted / students
    } else {
        FALLBACK_AVERAGE_FEE
    };

    let mut historical_fees = BTreeMap::from([(reference_year, current_avg_fee)]);
    let mut fee = current_avg_fee;
    for back in 1..=4 {
        let year = reference_year - back;
        fee = (fee as f64 / (1.0 + inflation(year))) as u64;
        historical_fees.insert(year, fee);
    }

    let increase = PROJECTED_INFLATION + MARKET_ADJUSTMENT + COST_INCREASE;
    let bump = |fee: u64| (fee as f64 * (1.0 + increase)) as u64;

    FeeForecast {
        current_year: reference_year,
        next_year: reference_year + 1,
        current_avg_fee,
        historical_fees,
        predicted_fee: bump(current_avg_fee),
        increase_percentage: (increase * 100.0).round() as u32,
        confidence: FEE_CONFIDENCE,
        fee_factors: factors(&[
            ("Projected inflation", 52),
            ("Competitive adjustments", 28),
            ("Operating cost increase", 20),
        ]),
        predicted_fees_by_school: school_fees
            .iter()
            .map(|(school, &fee)| (school.clone(), bump(fee)))
            .collect(),
    }
}
