pub mod batch;
pub mod coordinator;
pub mod update;

pub use batch::{BatchRunner, RunOptions};
pub use coordinator::{run_all, tasks_from_config, JobReport, JobSpec, PipelineTask};
pub use update::{UpdateOptions, UpdateOrchestrator};
