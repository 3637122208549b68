pub mod aggregate;
pub mod columns;
pub mod forecast;
pub mod partial;
pub mod views;

pub use aggregate::{aggregate, aggregate_file, AggregateStatistics, DataInfo, ScholarshipSuccess, SpecialtySuccess};
pub use forecast::{average_fee, faculty_revenue, next_year_students, SchoolFees};
pub use partial::PartialAggregate;
pub use views::{
    BacTypeBreakdown, CategoryCount, Dimension, Distribution, MarkCorrelations, ScholarshipBreakdown,
    SchoolSpecialtyView, WeightedFactor,
};

/// Round to one decimal, the precision every served rate and mean uses.
pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// `part / whole` as a percentage, 0 when `whole` is 0.
pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
