// src/stats/aggregate.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};

use super::partial::{Counts, MeanAcc, PartialAggregate};
use super::{percent, round1};
use crate::error::{IngestError, IngestResult};
use crate::ingest::dataset::malformed_rows;
use crate::ingest::{count_data_rows, ChunkedCsvReader, Dataset};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScholarshipSuccess {
    pub with_scholarship: f64,
    pub without_scholarship: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecialtySuccess {
    pub total: usize,
    pub graduated: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataInfo {
    pub is_sampled: bool,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub sampling_factor: f64,
}

/// Everything the serving layer reads, recomputed from scratch per dataset.
///
/// Rates are percentages and, like means, rounded to one decimal. Mean maps
/// only hold groups with at least one parseable mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    pub total_students: usize,
    pub gender_distribution: Counts,
    pub nationalities: Counts,
    pub cities: Counts,
    pub schools: Counts,
    pub specialties: Counts,
    pub bac_types: Counts,

    pub scholarship_count: usize,
    pub scholarship_percentage: f64,
    pub graduation_rate: f64,
    pub scholarship_by_gender: BTreeMap<String, f64>,
    pub scholarship_by_bac: BTreeMap<String, f64>,
    pub success_rate_by_bac: BTreeMap<String, f64>,
    pub graduation_by_scholarship: ScholarshipSuccess,

    pub average_mark: Option<f64>,
    pub avg_marks_by_gender: BTreeMap<String, f64>,
    pub avg_marks_by_bac: BTreeMap<String, f64>,
    pub avg_marks_by_scholarship: BTreeMap<String, f64>,
    pub avg_marks_by_specialty: BTreeMap<String, f64>,
    pub avg_marks_by_graduation: BTreeMap<String, f64>,

    pub school_specialty_distribution: BTreeMap<String, Counts>,
    pub specialty_success: BTreeMap<String, SpecialtySuccess>,

    /// Mean term mark per student `ID`, unrounded.
    pub semester_averages: BTreeMap<String, f64>,
    /// Mean parseable mark among graduates, 0 when there are none.
    pub graduation_threshold: f64,
    pub semester_graduation_threshold: f64,
    pub data_info: DataInfo,
}

fn rates(part: &Counts, whole: &Counts) -> BTreeMap<String, f64> {
    whole
        .iter()
        .map(|(k, n)| (k.clone(), round1(percent(part.get(k).copied().unwrap_or(0), *n))))
        .collect()
}

fn means(groups: &BTreeMap<String, MeanAcc>) -> BTreeMap<String, f64> {
    groups
        .iter()
        .filter_map(|(k, acc)| acc.mean().map(|m| (k.clone(), round1(m))))
        .collect()
}

fn labelled_means(pairs: &[(&str, &MeanAcc)]) -> BTreeMap<String, f64> {
    pairs
        .iter()
        .filter_map(|(label, acc)| acc.mean().map(|m| (label.to_string(), round1(m))))
        .collect()
}

impl PartialAggregate {
    /// Turn the running totals into served statistics.
    ///
    /// `total_rows` is the file's data-row count; it exceeds `self.rows` only
    /// when a row cap applied.
    pub fn finish(self, total_rows: usize, sampled: bool) -> IngestResult<AggregateStatistics> {
        if let Some((name, sum)) = self.sums().find(|(_, s)| !s.is_finite()) {
            return Err(IngestError::Computation(format!(
                "non-finite running sum for {name}: {sum}"
            )));
        }

        let n = self.rows;
        let specialty_success = self
            .specialty
            .iter()
            .map(|(name, &total)| {
                let graduated = self.graduated_by_specialty.get(name).copied().unwrap_or(0);
                let s = SpecialtySuccess {
                    total,
                    graduated,
                    success_rate: round1(percent(graduated, total)),
                };
                (name.clone(), s)
            })
            .collect();

        let data_info = DataInfo {
            is_sampled: sampled,
            total_rows: total_rows.max(n),
            processed_rows: n,
            sampling_factor: if sampled && total_rows > 0 {
                (n as f64 / total_rows as f64 * 100.0).round() / 100.0
            } else {
                1.0
            },
        };

        Ok(AggregateStatistics {
            total_students: n,
            scholarship_count: self.scholarship_holders,
            scholarship_percentage: round1(percent(self.scholarship_holders, n)),
            graduation_rate: round1(percent(self.graduated, n)),
            scholarship_by_gender: rates(&self.holders_by_gender, &self.gender),
            scholarship_by_bac: rates(&self.holders_by_bac, &self.bac_type),
            success_rate_by_bac: rates(&self.graduated_by_bac, &self.bac_type),
            graduation_by_scholarship: ScholarshipSuccess {
                with_scholarship: round1(percent(
                    self.graduated_with_scholarship,
                    self.scholarship_holders,
                )),
                without_scholarship: round1(percent(
                    self.graduated_without_scholarship,
                    self.scholarship_declined,
                )),
            },

            average_mark: self.mark.mean().map(round1),
            avg_marks_by_gender: means(&self.mark_by_gender),
            avg_marks_by_bac: means(&self.mark_by_bac),
            avg_marks_by_specialty: means(&self.mark_by_specialty),
            avg_marks_by_scholarship: labelled_means(&[
                ("with_scholarship", &self.mark_with_scholarship),
                ("without_scholarship", &self.mark_without_scholarship),
            ]),
            avg_marks_by_graduation: labelled_means(&[
                ("graduated", &self.mark_graduated),
                ("not_graduated", &self.mark_not_graduated),
            ]),

            school_specialty_distribution: self.school_specialty,
            specialty_success,
            graduation_threshold: self.mark_graduated.mean().unwrap_or(0.0),
            semester_graduation_threshold: self.graduated_term_average.mean().unwrap_or(0.0),
            semester_averages: self.term_averages,
            data_info,

            gender_distribution: self.gender,
            nationalities: self.nationality,
            cities: self.city,
            schools: self.school,
            specialties: self.specialty,
            bac_types: self.bac_type,
        })
    }
}

/// Aggregate an already loaded dataset.
#[instrument(level = "debug", skip(dataset), fields(records = dataset.len()))]
pub fn aggregate(dataset: &Dataset) -> IngestResult<AggregateStatistics> {
    PartialAggregate::from_records(&dataset.records, &dataset.header)
        .finish(dataset.total_rows, dataset.sampled)
}

/// Aggregate straight from the file, one batch at a time.
///
/// Each batch is folded into the running partial and dropped before the next
/// one is read, so only the totals stay resident.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn aggregate_file<P: AsRef<Path>>(
    path: P,
    max_rows: Option<usize>,
    batch_size: usize,
) -> IngestResult<AggregateStatistics> {
    let path = path.as_ref();
    let start = Instant::now();
    let reader = ChunkedCsvReader::new(path, batch_size).with_max_rows(max_rows);

    let mut batches = reader.batches()?;
    let header = batches.header();

    let mut running = PartialAggregate::default();
    let mut malformed = 0usize;
    for batch in batches.by_ref() {
        let batch = batch?;
        malformed += malformed_rows(&batch.warnings);
        running = running.merge(PartialAggregate::from_records(&batch.records, &header));
        debug!(batch = batch.index, rows = running.rows, "batch folded");
    }

    let sampled = batches.truncated();
    let total_rows = if sampled {
        count_data_rows(path)?
    } else {
        running.rows + malformed
    };
    info!(
        rows = running.rows,
        total_rows,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "aggregated file"
    );
    running.finish(total_rows, sampled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::load_dataset;
    use crate::record::record_from;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const COHORT: &str = "\
ID,Gender,Nationality,School,Specialty,Baccalaureat_Type,Scholarship,Graduated,Mark,S1
E1,Male,Moroccan,Engineering School,Civil,Scientific,True,True,16,\"{\"\"mark\"\":15}\"
E2,Female,French,Business School,Finance,Economic,False,False,12,\"{\"\"mark\"\":11}\"
E3,Female,Moroccan,Engineering School,Mechanical,Scientific,True,True,14,
E4,Male,,Business School,Finance,Economic,False,True,abc,\"{\"\"mark\"\":13}\"
E5,Female,Moroccan,Engineering School,Civil,Scientific,False,False,10,
";

    fn cohort_file() -> Result<NamedTempFile> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(COHORT.as_bytes())?;
        Ok(tmp)
    }

    #[test]
    fn category_counts_sum_to_rows() -> Result<()> {
        let tmp = cohort_file()?;
        let stats = aggregate(&load_dataset(tmp.path(), None, 2)?)?;
        assert_eq!(stats.total_students, 5);
        for counts in [
            &stats.gender_distribution,
            &stats.nationalities,
            &stats.cities,
            &stats.schools,
            &stats.specialties,
            &stats.bac_types,
        ] {
            assert_eq!(counts.values().sum::<usize>(), 5);
        }
        assert_eq!(stats.nationalities["Unknown"], 1);
        assert_eq!(stats.cities["Unknown"], 5);
        Ok(())
    }

    #[test]
    fn rates_and_means() -> Result<()> {
        let tmp = cohort_file()?;
        let stats = aggregate(&load_dataset(tmp.path(), None, 10)?)?;
        assert_eq!(stats.graduation_rate, 60.0);
        assert_eq!(stats.scholarship_percentage, 40.0);
        assert_eq!(stats.success_rate_by_bac["Scientific"], 66.7);
        assert_eq!(stats.scholarship_by_gender["Male"], 50.0);
        // E4's mark does not parse: 4 marks, mean 13
        assert_eq!(stats.average_mark, Some(13.0));
        assert_eq!(stats.avg_marks_by_gender["Male"], 16.0);
        assert_eq!(stats.avg_marks_by_graduation["graduated"], 15.0);
        assert_eq!(stats.graduation_threshold, 15.0);
        assert_eq!(stats.graduation_by_scholarship.with_scholarship, 100.0);
        assert_eq!(stats.graduation_by_scholarship.without_scholarship, 33.3);
        assert_eq!(stats.specialty_success["Finance"].graduated, 1);
        assert_eq!(stats.specialty_success["Finance"].success_rate, 50.0);
        assert_eq!(stats.school_specialty_distribution["Engineering School"]["Civil"], 2);
        assert_eq!(stats.semester_averages.len(), 3);
        assert_eq!(stats.semester_averages["E4"], 13.0);
        assert!(!stats.data_info.is_sampled);
        assert_eq!(stats.data_info.sampling_factor, 1.0);
        Ok(())
    }

    #[test]
    fn aggregate_is_idempotent() -> Result<()> {
        let tmp = cohort_file()?;
        let dataset = load_dataset(tmp.path(), None, 3)?;
        assert_eq!(aggregate(&dataset)?, aggregate(&dataset)?);
        Ok(())
    }

    #[test]
    fn any_batch_partition_merges_to_the_same_statistics() -> Result<()> {
        let tmp = cohort_file()?;
        let dataset = load_dataset(tmp.path(), None, 100)?;
        let whole = aggregate(&dataset)?;
        for size in 1..=dataset.len() {
            let merged = dataset
                .records
                .chunks(size)
                .map(|chunk| PartialAggregate::from_records(chunk, &dataset.header))
                .fold(PartialAggregate::default(), PartialAggregate::merge)
                .finish(dataset.total_rows, dataset.sampled)?;
            assert_eq!(merged, whole, "partition size {size}");
        }
        Ok(())
    }

    #[test]
    fn fractional_term_marks_merge_bit_for_bit() -> Result<()> {
        let term = |m: f64| format!("\"{{\"\"mark\"\":{m}}}\"");
        let mut content = String::from("ID,Graduated,Mark,S1,S2,S3,S4\n");
        for i in 0..40 {
            let bump = (i % 7) as f64 / 10.0;
            content.push_str(&format!(
                "E{i},{},{},{},{},{},{}\n",
                if i % 3 == 0 { "True" } else { "False" },
                10 + i % 9,
                term(0.1 + bump),
                term(0.2),
                term(0.3 + bump),
                term(0.7),
            ));
        }
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(content.as_bytes())?;

        let dataset = load_dataset(tmp.path(), None, 100)?;
        assert_eq!(dataset.len(), 40);
        let whole = aggregate(&dataset)?;
        assert_eq!(whole.semester_averages.len(), 40);
        for size in [1, 2, 3, 7, 13, 40] {
            let merged = dataset
                .records
                .chunks(size)
                .map(|chunk| PartialAggregate::from_records(chunk, &dataset.header))
                .fold(PartialAggregate::default(), PartialAggregate::merge)
                .finish(dataset.total_rows, dataset.sampled)?;
            assert_eq!(merged.semester_averages, whole.semester_averages, "partition size {size}");
            assert_eq!(merged, whole, "partition size {size}");
        }
        assert_eq!(aggregate(&load_dataset(tmp.path(), None, 3)?)?, whole);
        Ok(())
    }

    #[test]
    fn malformed_row_under_roomy_cap_agrees_across_entry_points() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(b"ID,Gender\nE1,Male\nbad\nE2,Female\n")?;
        let loaded = aggregate(&load_dataset(tmp.path(), Some(50), 10)?)?;
        let streamed = aggregate_file(tmp.path(), Some(50), 10)?;
        assert!(!loaded.data_info.is_sampled);
        assert_eq!(loaded.data_info.sampling_factor, 1.0);
        assert_eq!(loaded.data_info, streamed.data_info);
        Ok(())
    }

    #[test]
    fn streaming_matches_loaded() -> Result<()> {
        let tmp = cohort_file()?;
        let loaded = aggregate(&load_dataset(tmp.path(), None, 2)?)?;
        let streamed = aggregate_file(tmp.path(), None, 2)?;
        assert_eq!(loaded, streamed);
        Ok(())
    }

    #[test]
    fn capped_stream_reports_sampling() -> Result<()> {
        let tmp = cohort_file()?;
        let stats = aggregate_file(tmp.path(), Some(2), 1)?;
        assert_eq!(stats.total_students, 2);
        assert_eq!(stats.data_info.total_rows, 5);
        assert!(stats.data_info.is_sampled);
        assert_eq!(stats.data_info.sampling_factor, 0.4);
        Ok(())
    }

    #[test]
    fn non_finite_sum_is_a_computation_error() {
        let huge = record_from(&[("Mark", "1e308")]);
        let dataset = Dataset {
            header: vec!["Mark".into()],
            records: vec![huge.clone(), huge],
            total_rows: 2,
            ..Dataset::default()
        };
        assert!(matches!(aggregate(&dataset), Err(IngestError::Computation(_))));
    }

    #[test]
    fn empty_dataset_has_no_means() -> Result<()> {
        let stats = aggregate(&Dataset::default())?;
        assert_eq!(stats.total_students, 0);
        assert_eq!(stats.average_mark, None);
        assert_eq!(stats.graduation_rate, 0.0);
        assert_eq!(stats.graduation_threshold, 0.0);
        Ok(())
    }
}
