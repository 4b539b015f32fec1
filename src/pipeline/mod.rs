// Trial data pipeline: ingestion, the tabular model, and processing stages

pub mod ingestion;
pub mod processing;
pub mod table;

pub use table::{Cell, TrialTable};
