mod analyzer;
mod error;
mod keywords;
mod state;
mod summary;

pub use analyzer::{analyze, plan_windows, AnalysisOutcome, Plan};
pub use error::{AnalyzerError, Result};
