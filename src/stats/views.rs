// src/stats/views.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::aggregate::{AggregateStatistics, ScholarshipSuccess};
use super::partial::Counts;
use super::{percent, round1};
use crate::error::IngestError;

const TOP_CATEGORIES: usize = 5;

/// A named weight in a served explanation ("Bac mark": 60).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedFactor {
    pub name: String,
    pub weight: u32,
}

pub(crate) fn factors(pairs: &[(&str, u32)]) -> Vec<WeightedFactor> {
    pairs
        .iter()
        .map(|&(name, weight)| WeightedFactor {
            name: name.to_string(),
            weight,
        })
        .collect()
}

/// Categorical dimensions that have a served distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Gender,
    Nationality,
    City,
    School,
    Specialty,
    BacType,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Gender => "gender",
            Dimension::Nationality => "nationality",
            Dimension::City => "city",
            Dimension::School => "school",
            Dimension::Specialty => "specialty",
            Dimension::BacType => "bac_type",
        }
    }

    fn counts<'a>(&self, stats: &'a AggregateStatistics) -> &'a Counts {
        match self {
            Dimension::Gender => &stats.gender_distribution,
            Dimension::Nationality => &stats.nationalities,
            Dimension::City => &stats.cities,
            Dimension::School => &stats.schools,
            Dimension::Specialty => &stats.specialties,
            Dimension::BacType => &stats.bac_types,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "gender" => Ok(Dimension::Gender),
            "nationality" => Ok(Dimension::Nationality),
            "city" => Ok(Dimension::City),
            "school" => Ok(Dimension::School),
            "specialty" => Ok(Dimension::Specialty),
            "bac_type" | "bac" => Ok(Dimension::BacType),
            other => Err(IngestError::Validation(format!("unknown dimension {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

/// Counts, shares and the leading categories of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub dimension: Dimension,
    pub counts: Counts,
    pub percentages: BTreeMap<String, f64>,
    pub total: usize,
    pub distinct: usize,
    pub top: Vec<CategoryCount>,
}

impl Distribution {
    pub fn of(stats: &AggregateStatistics, dimension: Dimension) -> Self {
        let counts = dimension.counts(stats).clone();
        let total = stats.total_students;
        let percentages = counts
            .iter()
            .map(|(k, &n)| (k.clone(), round1(percent(n, total))))
            .collect();

        let mut ranked: Vec<CategoryCount> = counts
            .iter()
            .map(|(name, &count)| CategoryCount {
                name: name.clone(),
                count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        ranked.truncate(TOP_CATEGORIES);

        Distribution {
            dimension,
            distinct: counts.len(),
            counts,
            percentages,
            total,
            top: ranked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScholarshipBreakdown {
    pub holders: usize,
    pub non_holders: usize,
    pub percentage: f64,
    pub by_gender: BTreeMap<String, f64>,
    pub by_bac_type: BTreeMap<String, f64>,
    pub success_rate: ScholarshipSuccess,
}

impl ScholarshipBreakdown {
    pub fn of(stats: &AggregateStatistics) -> Self {
        Self {
            holders: stats.scholarship_count,
            non_holders: stats.total_students - stats.scholarship_count,
            percentage: stats.scholarship_percentage,
            by_gender: stats.scholarship_by_gender.clone(),
            by_bac_type: stats.scholarship_by_bac.clone(),
            success_rate: stats.graduation_by_scholarship,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacTypeBreakdown {
    pub counts: Counts,
    pub percentages: BTreeMap<String, f64>,
    pub success_rate: BTreeMap<String, f64>,
    pub avg_mark: BTreeMap<String, f64>,
    pub total: usize,
}

impl BacTypeBreakdown {
    pub fn of(stats: &AggregateStatistics) -> Self {
        let dist = Distribution::of(stats, Dimension::BacType);
        Self {
            counts: dist.counts,
            percentages: dist.percentages,
            success_rate: stats.success_rate_by_bac.clone(),
            avg_mark: stats.avg_marks_by_bac.clone(),
            total: stats.total_students,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolSpecialtyView {
    pub schools: Counts,
    pub specialties: Counts,
    pub school_specialty_distribution: BTreeMap<String, Counts>,
    pub avg_mark_by_specialty: BTreeMap<String, f64>,
}

impl SchoolSpecialtyView {
    pub fn of(stats: &AggregateStatistics) -> Self {
        Self {
            schools: stats.schools.clone(),
            specialties: stats.specialties.clone(),
            school_specialty_distribution: stats.school_specialty_distribution.clone(),
            avg_mark_by_specialty: stats.avg_marks_by_specialty.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkCorrelations {
    pub by_gender: BTreeMap<String, f64>,
    pub by_bac_type: BTreeMap<String, f64>,
    pub by_scholarship: BTreeMap<String, f64>,
    pub by_specialty: BTreeMap<String, f64>,
    pub by_graduation: BTreeMap<String, f64>,
    pub overall_avg: Option<f64>,
}

impl MarkCorrelations {
    pub fn of(stats: &AggregateStatistics) -> Self {
        Self {
            by_gender: stats.avg_marks_by_gender.clone(),
            by_bac_type: stats.avg_marks_by_bac.clone(),
            by_scholarship: stats.avg_marks_by_scholarship.clone(),
            by_specialty: stats.avg_marks_by_specialty.clone(),
            by_graduation: stats.avg_marks_by_graduation.clone(),
            overall_avg: stats.average_mark,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Dataset;
    use crate::record::record_from;
    use crate::stats::aggregate;
    use anyhow::Result;

    fn stats_for(cities: &[&str]) -> Result<AggregateStatistics> {
        let records = cities.iter().map(|c| record_from(&[("City", *c)])).collect();
        let dataset = Dataset {
            header: vec!["City".into()],
            records,
            total_rows: cities.len(),
            ..Dataset::default()
        };
        Ok(aggregate(&dataset)?)
    }

    #[test]
    fn distribution_ranks_top_five() -> Result<()> {
        let stats = stats_for(&[
            "Rabat", "Fes", "Fes", "Tanger", "Oujda", "Agadir", "Rabat", "Fes", "Meknes",
        ])?;
        let dist = Distribution::of(&stats, Dimension::City);
        assert_eq!(dist.total, 9);
        assert_eq!(dist.distinct, 6);
        assert_eq!(dist.percentages["Fes"], 33.3);
        let top: Vec<&str> = dist.top.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(top, vec!["Fes", "Rabat", "Agadir", "Meknes", "Oujda"]);
        Ok(())
    }

    #[test]
    fn dimension_names_parse() {
        assert_eq!("bac-type".parse::<Dimension>().ok(), Some(Dimension::BacType));
        assert_eq!("Gender".parse::<Dimension>().ok(), Some(Dimension::Gender));
        assert!("height".parse::<Dimension>().is_err());
    }

    #[test]
    fn breakdowns_on_empty_statistics() -> Result<()> {
        let stats = stats_for(&[])?;
        let scholarship = ScholarshipBreakdown::of(&stats);
        assert_eq!(scholarship.holders, 0);
        assert_eq!(scholarship.non_holders, 0);
        assert_eq!(MarkCorrelations::of(&stats).overall_avg, None);
        assert!(BacTypeBreakdown::of(&stats).counts.is_empty());
        Ok(())
    }
}
