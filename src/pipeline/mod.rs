pub mod batch;
pub mod jobs;
pub mod orchestrator;

pub use batch::{BatchDriver, BatchSummary, JobRunner};
pub use jobs::{JobDefinition, JobKind, discover, python_range};
pub use orchestrator::{JobReport, Pipeline};
