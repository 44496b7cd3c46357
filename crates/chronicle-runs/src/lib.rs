pub mod controller;
pub mod error;
pub mod types;

pub use controller::RunController;
pub use error::{Result, RunsError};
pub use types::{JobKind, Liveness, STALE_AFTER_SECS};
