pub mod log_table;
pub mod pipeline;

pub use log_table::{CsvOptions, LogTable};
pub use pipeline::{annotate, Detection, DetectionPipeline, StatusLabels};
