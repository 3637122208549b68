// src/stats/partial.rs

use std::collections::BTreeMap;

use super::columns::*;
use crate::record::{is_term_column, Record};

pub(crate) type Counts = BTreeMap<String, usize>;

/// Running (sum, count) pair; the mean is only taken in `finish`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanAcc {
    pub sum: f64,
    pub count: usize,
}

impl MeanAcc {
    pub fn push(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &MeanAcc) {
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn bump(map: &mut Counts, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

fn add_counts(into: &mut Counts, from: &Counts) {
    for (k, v) in from {
        *into.entry(k.clone()).or_insert(0) += v;
    }
}

fn add_means(into: &mut BTreeMap<String, MeanAcc>, from: &BTreeMap<String, MeanAcc>) {
    for (k, v) in from {
        into.entry(k.clone()).or_default().merge(v);
    }
}

/// Term-column marks of one record, in header order.
fn term_marks(record: &Record, term_columns: &[String]) -> Vec<f64> {
    term_columns
        .iter()
        .filter_map(|c| record.get(c).and_then(|v| v.term_mark()))
        .collect()
}

/// Mergeable statistics over one slice of records.
///
/// Counters add, count maps add key-wise, means stay as (sum, count) pairs,
/// per-student term averages are keyed by `ID` with later records winning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialAggregate {
    pub rows: usize,
    pub gender: Counts,
    pub nationality: Counts,
    pub city: Counts,
    pub school: Counts,
    pub specialty: Counts,
    pub bac_type: Counts,

    pub scholarship_holders: usize,
    /// Records whose scholarship cell decoded to an explicit `false`.
    pub scholarship_declined: usize,
    pub graduated: usize,
    pub graduated_with_scholarship: usize,
    pub graduated_without_scholarship: usize,
    pub holders_by_gender: Counts,
    pub holders_by_bac: Counts,
    pub graduated_by_bac: Counts,
    pub graduated_by_specialty: Counts,
    pub school_specialty: BTreeMap<String, Counts>,

    pub mark: MeanAcc,
    pub mark_by_gender: BTreeMap<String, MeanAcc>,
    pub mark_by_bac: BTreeMap<String, MeanAcc>,
    pub mark_by_specialty: BTreeMap<String, MeanAcc>,
    pub mark_with_scholarship: MeanAcc,
    /// Explicit `false` only, like `scholarship_declined`.
    pub mark_without_scholarship: MeanAcc,
    pub mark_graduated: MeanAcc,
    pub mark_not_graduated: MeanAcc,

    pub term_averages: BTreeMap<String, f64>,
    pub graduated_term_average: MeanAcc,
}

/// Graduated students need this many term marks to count toward the semester threshold.
pub const SEMESTER_THRESHOLD_MIN_TERMS: usize = 6;

impl PartialAggregate {
    /// Fold `records` decoded against `header`; term columns are summed in header order.
    pub fn from_records(records: &[Record], header: &[String]) -> Self {
        let term_columns: Vec<String> = header
            .iter()
            .filter(|c| is_term_column(c))
            .cloned()
            .collect();
        let mut partial = PartialAggregate::default();
        for record in records {
            partial.observe(record, &term_columns);
        }
        partial
    }

    fn observe(&mut self, record: &Record, term_columns: &[String]) {
        self.rows += 1;

        let gender = record.category(GENDER);
        let bac = record.category(BAC_TYPE);
        let school = record.category(SCHOOL);
        let specialty = record.category(SPECIALTY);
        bump(&mut self.gender, &gender);
        bump(&mut self.nationality, &record.category(NATIONALITY));
        bump(&mut self.city, &record.category(CITY));
        bump(&mut self.school, &school);
        bump(&mut self.specialty, &specialty);
        bump(&mut self.bac_type, &bac);
        bump(self.school_specialty.entry(school).or_default(), &specialty);

        let holder = record.flag(SCHOLARSHIP);
        let declined = record.get(SCHOLARSHIP).and_then(|v| v.as_bool()) == Some(false);
        let graduated = record.flag(GRADUATED);

        if holder {
            self.scholarship_holders += 1;
            bump(&mut self.holders_by_gender, &gender);
            bump(&mut self.holders_by_bac, &bac);
        }
        if declined {
            self.scholarship_declined += 1;
        }
        if graduated {
            self.graduated += 1;
            bump(&mut self.graduated_by_bac, &bac);
            bump(&mut self.graduated_by_specialty, &specialty);
            if holder {
                self.graduated_with_scholarship += 1;
            }
            if declined {
                self.graduated_without_scholarship += 1;
            }
        }

        // unparseable marks stay out of every mean
        if let Some(mark) = record.number(MARK) {
            self.mark.push(mark);
            self.mark_by_gender.entry(gender).or_default().push(mark);
            self.mark_by_bac.entry(bac).or_default().push(mark);
            self.mark_by_specialty.entry(specialty).or_default().push(mark);
            if holder {
                self.mark_with_scholarship.push(mark);
            } else if declined {
                self.mark_without_scholarship.push(mark);
            }
            if graduated {
                self.mark_graduated.push(mark);
            } else {
                self.mark_not_graduated.push(mark);
            }
        }

        let marks = term_marks(record, term_columns);
        if marks.is_empty() {
            return;
        }
        let average = marks.iter().sum::<f64>() / marks.len() as f64;
        if let Some(id) = record.text(ID).filter(|id| !id.is_empty()) {
            self.term_averages.insert(id.to_string(), average);
        }
        if graduated && marks.len() >= SEMESTER_THRESHOLD_MIN_TERMS {
            self.graduated_term_average.push(average);
        }
    }

    /// Fold `other` (the later slice) into `self`.
    pub fn merge(mut self, other: PartialAggregate) -> Self {
        self.rows += other.rows;
        add_counts(&mut self.gender, &other.gender);
        add_counts(&mut self.nationality, &other.nationality);
        add_counts(&mut self.city, &other.city);
        add_counts(&mut self.school, &other.school);
        add_counts(&mut self.specialty, &other.specialty);
        add_counts(&mut self.bac_type, &other.bac_type);

        self.scholarship_holders += other.scholarship_holders;
        self.scholarship_declined += other.scholarship_declined;
        self.graduated += other.graduated;
        self.graduated_with_scholarship += other.graduated_with_scholarship;
        self.graduated_without_scholarship += other.graduated_without_scholarship;
        add_counts(&mut self.holders_by_gender, &other.holders_by_gender);
        add_counts(&mut self.holders_by_bac, &other.holders_by_bac);
        add_counts(&mut self.graduated_by_bac, &other.graduated_by_bac);
        add_counts(&mut self.graduated_by_specialty, &other.graduated_by_specialty);
        for (school, specialties) in &other.school_specialty {
            add_counts(self.school_specialty.entry(school.clone()).or_default(), specialties);
        }

        self.mark.merge(&other.mark);
        add_means(&mut self.mark_by_gender, &other.mark_by_gender);
        add_means(&mut self.mark_by_bac, &other.mark_by_bac);
        add_means(&mut self.mark_by_specialty, &other.mark_by_specialty);
        self.mark_with_scholarship.merge(&other.mark_with_scholarship);
        self.mark_without_scholarship.merge(&other.mark_without_scholarship);
        self.mark_graduated.merge(&other.mark_graduated);
        self.mark_not_graduated.merge(&other.mark_not_graduated);

        self.term_averages.extend(other.term_averages);
        self.graduated_term_average.merge(&other.graduated_term_average);
        self
    }

    /// Every running sum, for the finiteness check before means are taken.
    pub(crate) fn sums(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        let fixed = [
            ("mark", self.mark.sum),
            ("mark_with_scholarship", self.mark_with_scholarship.sum),
            ("mark_without_scholarship", self.mark_without_scholarship.sum),
            ("mark_graduated", self.mark_graduated.sum),
            ("mark_not_graduated", self.mark_not_graduated.sum),
            ("graduated_term_average", self.graduated_term_average.sum),
        ];
        fixed
            .into_iter()
            .chain(self.mark_by_gender.iter().map(|(k, m)| (k.as_str(), m.sum)))
            .chain(self.mark_by_bac.iter().map(|(k, m)| (k.as_str(), m.sum)))
            .chain(self.mark_by_specialty.iter().map(|(k, m)| (k.as_str(), m.sum)))
            .chain(self.term_averages.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}
