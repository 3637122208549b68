// src/service.rs

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::cache::ResultCache;
use crate::config::Config;
use crate::error::IngestResult;
use crate::ingest::{load_dataset, DataSummary, Dataset};
use crate::predict::{
    predict_graduation, recommend_specialties, GraduationPrediction, SpecialtyRecommendation,
    StudentProfile,
};
use crate::schema::{analyze_schema, available_features, Feature, SchemaInfo};
use crate::stats::forecast::{EnrollmentForecast, FacultyRevenue, FeeForecast};
use crate::stats::{
    aggregate, average_fee, faculty_revenue, next_year_students, AggregateStatistics,
    BacTypeBreakdown, Dimension, Distribution, MarkCorrelations, ScholarshipBreakdown,
    SchoolFees, SchoolSpecialtyView,
};

/// One consistent view of the data: never mutated, replaced wholesale on reload.
#[derive(Debug)]
pub struct Snapshot {
    pub dataset: Dataset,
    pub stats: AggregateStatistics,
    /// `None` when schema analysis failed; the dataset may still be usable.
    pub schema: Option<SchemaInfo>,
    pub features: Vec<Feature>,
    pub loaded_at: DateTime<Utc>,
}

impl Snapshot {
    #[instrument(level = "info", skip(config), fields(path = %config.data_path.display()))]
    pub fn build(config: &Config) -> IngestResult<Self> {
        let start = Instant::now();
        let path = config.data_path.as_path();

        // schema profiling runs next to the load
        let (schema, dataset) = rayon::join(
            || analyze_schema(path, config.schema_sample_rows),
            || load_dataset(path, config.max_rows, config.batch_size),
        );
        let dataset = dataset?;
        let stats = aggregate(&dataset)?;
        let features = match &schema {
            Some(schema) => available_features(schema),
            None => vec![Feature::DataSummary],
        };

        info!(
            records = dataset.len(),
            total_rows = dataset.total_rows,
            warnings = dataset.warnings.len(),
            features = features.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "snapshot built"
        );
        Ok(Self {
            dataset,
            stats,
            schema,
            features,
            loaded_at: Utc::now(),
        })
    }
}

/// Transport-free serving facade: owns the current snapshot and the result cache.
pub struct StatsService {
    config: Config,
    snapshot: ArcSwap<Snapshot>,
    cache: ResultCache,
    fees: SchoolFees,
}

impl StatsService {
    pub fn load(config: Config) -> IngestResult<Self> {
        let snapshot = Snapshot::build(&config)?;
        let cache = config.cache();
        Ok(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            cache,
            fees: SchoolFees::default(),
            config,
        })
    }

    pub fn with_fees(mut self, fees: SchoolFees) -> Self {
        self.fees = fees;
        self
    }

    /// Rebuild from the data file and swap the new snapshot in.
    ///
    /// On failure the previous snapshot stays in place.
    pub fn reload(&self) -> IngestResult<()> {
        let fresh = Snapshot::build(&self.config)?;
        if let Err(e) = self.cache.clear() {
            warn!("cache clear after reload failed: {e:#}");
        }
        self.snapshot.store(Arc::new(fresh));
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn summary(&self) -> DataSummary {
        self.snapshot.load().dataset.summary()
    }

    pub fn schema(&self) -> Option<SchemaInfo> {
        self.snapshot.load().schema.clone()
    }

    pub fn features(&self) -> Vec<Feature> {
        self.snapshot.load().features.clone()
    }

    pub fn statistics(&self) -> AggregateStatistics {
        self.snapshot.load().stats.clone()
    }

    pub fn distribution(&self, dimension: Dimension) -> IngestResult<Distribution> {
        let snap = self.snapshot();
        self.cache
            .get_or_compute("distribution", &[dimension.as_str()], || {
                Ok(Distribution::of(&snap.stats, dimension))
            })
    }

    pub fn scholarship_breakdown(&self) -> IngestResult<ScholarshipBreakdown> {
        let snap = self.snapshot();
        self.cache.get_or_compute("scholarship_breakdown", &[], || {
            Ok(ScholarshipBreakdown::of(&snap.stats))
        })
    }

    pub fn bac_type_breakdown(&self) -> IngestResult<BacTypeBreakdown> {
        let snap = self.snapshot();
        self.cache
            .get_or_compute("bac_type_breakdown", &[], || Ok(BacTypeBreakdown::of(&snap.stats)))
    }

    pub fn school_specialty(&self) -> IngestResult<SchoolSpecialtyView> {
        let snap = self.snapshot();
        self.cache
            .get_or_compute("school_specialty", &[], || Ok(SchoolSpecialtyView::of(&snap.stats)))
    }

    pub fn mark_correlations(&self) -> IngestResult<MarkCorrelations> {
        let snap = self.snapshot();
        self.cache
            .get_or_compute("mark_correlations", &[], || Ok(MarkCorrelations::of(&snap.stats)))
    }

    pub fn faculty_revenue(&self) -> IngestResult<FacultyRevenue> {
        let snap = self.snapshot();
        self.cache.get_or_compute("faculty_revenue", &[], || {
            Ok(faculty_revenue(&snap.stats, &self.fees))
        })
    }

    pub fn next_year_students(&self) -> IngestResult<EnrollmentForecast> {
        let snap = self.snapshot();
        let year = self.config.reference_year.to_string();
        self.cache.get_or_compute("next_year_students", &[&year], || {
            Ok(next_year_students(&snap.dataset, &snap.stats, self.config.reference_year))
        })
    }

    pub fn average_fee(&self) -> IngestResult<FeeForecast> {
        let snap = self.snapshot();
        let year = self.config.reference_year.to_string();
        self.cache.get_or_compute("average_fee", &[&year], || {
            Ok(average_fee(&snap.stats, &self.fees, self.config.reference_year))
        })
    }

    /// Validate a request body and predict graduation for it.
    pub fn predict_graduation(&self, body: &serde_json::Value) -> IngestResult<GraduationPrediction> {
        let profile = StudentProfile::from_json(body)?;
        let snap = self.snapshot();
        predict_graduation(&snap.dataset, &snap.stats, &profile)
    }

    pub fn recommend_specialties(&self, body: &serde_json::Value) -> IngestResult<SpecialtyRecommendation> {
        let profile = StudentProfile::from_json(body)?;
        recommend_specialties(&self.snapshot().dataset, &profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use anyhow::Result;
    use serde_json::json;
    use std::fs;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};
    use tracing_subscriber::{fmt::Subscriber as FmtSubscriber, EnvFilter};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,cohort_stats=debug")),
            )
            .with_test_writer()
            .finish();
        // another test may have installed it already
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const DATA: &str = "\
// exported from the registrar
ID,Gender,Nationality,City,School,Specialty,Baccalaureat_Type,Scholarship,Graduated,Mark,Start_Year
E1,Male,Moroccan,Fes,Engineering School,Civil Engineering,Scientific,True,True,16,2021
E2,Female,French,Rabat,Business School,Finance,Economic,False,False,12,2022
E3,Female,Moroccan,Fes,Engineering School,Computer Science,Scientific,True,True,15,2022
E4,Male,Moroccan,Tanger,Business School,Marketing,Economic,False,True,13,2023
";

    fn config_for(file: &NamedTempFile) -> Config {
        Config {
            data_path: file.path().to_path_buf(),
            batch_size: 2,
            ..Config::default()
        }
    }

    fn data_file(content: &str) -> Result<NamedTempFile> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(content.as_bytes())?;
        Ok(tmp)
    }

    #[test]
    fn load_serves_statistics_and_features() -> Result<()> {
        init_test_logging();
        let tmp = data_file(DATA)?;
        let service = StatsService::load(config_for(&tmp))?;

        let summary = service.summary();
        assert_eq!(summary.row_count, 4);
        assert_eq!(summary.column_count, 11);

        let features = service.features();
        assert!(features.contains(&Feature::GraduationPrediction));
        assert!(features.contains(&Feature::SpecialtyPrediction));
        assert!(features.contains(&Feature::AverageFee));

        let gender = service.distribution(Dimension::Gender)?;
        assert_eq!(gender.counts["Male"], 2);
        assert_eq!(gender.percentages["Female"], 50.0);
        assert_eq!(service.scholarship_breakdown()?.holders, 2);
        assert_eq!(service.mark_correlations()?.overall_avg, Some(14.0));
        assert_eq!(service.bac_type_breakdown()?.success_rate["Scientific"], 100.0);
        assert_eq!(service.school_specialty()?.schools["Business School"], 2);
        Ok(())
    }

    #[test]
    fn predictions_validate_input() -> Result<()> {
        let tmp = data_file(DATA)?;
        let service = StatsService::load(config_for(&tmp))?;

        let p = service.predict_graduation(&json!({"Mark": 18, "Baccalaureat_Type": "Scientific"}))?;
        assert!((5.0..=98.0).contains(&p.probability));
        assert_eq!(p.graduation_stats.total_students, 4);

        let rec = service.recommend_specialties(&json!({"Mark": "15", "Interests": "Technology"}))?;
        assert_eq!(rec.recommendations.len(), 3);
        assert_eq!(rec.recommendations[0].specialty, "Computer Science");

        assert!(matches!(
            service.predict_graduation(&json!({"Baccalaureat_Type": "Scientific"})),
            Err(IngestError::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn forecasts_are_served() -> Result<()> {
        let tmp = data_file(DATA)?;
        let service = StatsService::load(config_for(&tmp))?;
        let revenue = service.faculty_revenue()?;
        assert_eq!(revenue.faculty_revenues["Business School"], 120_000);
        let enrollment = service.next_year_students()?;
        assert_eq!(enrollment.current_year, 2023);
        assert_eq!(enrollment.historical_counts[&2022], 2);
        let fees = service.average_fee()?;
        assert_eq!(fees.current_avg_fee, 57_500);
        Ok(())
    }

    #[test]
    fn reload_swaps_snapshot_and_drops_cached_views() -> Result<()> {
        init_test_logging();
        let tmp = data_file(DATA)?;
        let cache_dir = tempdir()?;
        let config = Config {
            cache_dir: Some(cache_dir.path().to_path_buf()),
            ..config_for(&tmp)
        };
        let service = StatsService::load(config)?;
        let before = service.snapshot();
        assert_eq!(service.distribution(Dimension::City)?.distinct, 3);
        service.scholarship_breakdown()?;
        assert_eq!(service.cache.memory_entries(), 2);

        let mut more = String::from(DATA);
        more.push_str("E5,Male,Moroccan,Oujda,Law School,Public Law,Literary,False,False,11,2023\n");
        fs::write(tmp.path(), more)?;
        service.reload()?;
        assert_eq!(service.cache.memory_entries(), 0);

        // earlier readers keep their own snapshot
        assert_eq!(before.dataset.len(), 4);
        assert_eq!(service.snapshot().dataset.len(), 5);
        assert_eq!(service.distribution(Dimension::City)?.distinct, 4);
        Ok(())
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() -> Result<()> {
        let tmp = data_file(DATA)?;
        let path = tmp.path().to_path_buf();
        let service = StatsService::load(config_for(&tmp))?;
        drop(tmp);
        assert!(!path.exists());

        assert!(matches!(service.reload(), Err(IngestError::FileNotFound(_))));
        assert_eq!(service.summary().row_count, 4);
        Ok(())
    }

    #[test]
    fn missing_file_fails_load() {
        let config = Config {
            data_path: "/no/such/cohort.csv".into(),
            ..Config::default()
        };
        assert!(matches!(
            StatsService::load(config),
            Err(IngestError::FileNotFound(_))
        ));
    }
}
