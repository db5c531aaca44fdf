pub mod bridge;
pub mod config;
pub mod detectors;
pub mod error;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod signal;

pub use detectors::*;
pub use error::*;
pub use metrics::*;
pub use pipeline::{AnalysisOutcome, AnalysisPipeline};
pub use signal::*;
