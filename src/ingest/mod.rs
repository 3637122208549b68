pub mod comments;
pub mod dataset;
pub mod memory;
pub mod reader;

pub use comments::CommentFilter;
pub use dataset::{count_data_rows, load_dataset, DataSummary, Dataset};
pub use reader::{Batch, Batches, ChunkedCsvReader};
