//! # Orchestration
//!
//! Everything that decides *when* background work runs: the scheduler
//! abstraction and its tokio implementation, the orchestrator settings and
//! state machine, the connector-import and request-processing job
//! schedulers, and the per-request task runner.

pub mod import_jobs;
pub mod orchestrator;
pub mod processing_jobs;
pub mod scheduler;
pub mod settings;
pub mod task_runner;

pub use import_jobs::ImportJobsScheduler;
pub use orchestrator::{Orchestrator, OrchestratorComponents, WorkingState};
pub use processing_jobs::RequestsProcessingScheduler;
pub use scheduler::{RecurringJob, ScheduledJobHandle, TaskScheduler, TokioTaskScheduler};
pub use settings::{OrchestratorSettings, SchedulerMode};
pub use task_runner::RequestTaskRunner;
