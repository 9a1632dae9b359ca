pub mod csv_store;
pub mod merge;

pub use csv_store::CsvDrawStore;
pub use merge::{merge, MergeOutcome};
