pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod predict;
pub mod record;
pub mod schema;
pub mod service;
pub mod stats;

pub use config::Config;
pub use error::{IngestError, IngestResult, IngestWarning};
pub use ingest::{load_dataset, ChunkedCsvReader, Dataset};
pub use record::{Record, Value};
pub use service::{Snapshot, StatsService};
pub use stats::{aggregate, aggregate_file, AggregateStatistics};
