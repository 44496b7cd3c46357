pub mod stream;
pub mod types;

pub use stream::{IncrementalPlan, RunCutPoint, WindowStream};
pub use types::{Window, WindowConfig, WindowPhase};
