pub mod config;
pub mod controller;
pub mod error;
pub mod item_task;
pub mod progress;

pub use config::PipelineConfig;
pub use controller::{JobController, JobOutcome, ALL_ITEMS_FAILED};
pub use error::{ItemError, PipelineError};
pub use item_task::ItemTask;
pub use progress::{ordered_artifacts, tally, ItemOutcome, ProgressReporter, Settled, SlotState};
