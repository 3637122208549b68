pub mod derive;
pub mod features;
pub mod types;

pub use derive::{analyze, analyze_schema};
pub use features::{available_features, Feature};
pub use types::{ColumnProfile, ColumnType, SchemaInfo};
