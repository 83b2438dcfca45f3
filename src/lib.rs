//! # Extract Core
//!
//! Rust orchestration core for the lifecycle of extraction requests: orders
//! imported from external source systems, matched to a processing pipeline,
//! executed through pluggable tasks and exported back to the source.
//!
//! ## Overview
//!
//! The hard part of the system is not any individual task (those are
//! external plugins) but the orchestration: a long-lived scheduler deciding
//! when background work runs (continuously, inside weekly time windows, or
//! not at all), a rule engine routing each imported request to exactly one
//! process, and a request lifecycle state machine advancing requests through
//! import, matching, task execution and export while handling partial
//! failure, retries, notifications and workspace cleanup.
//!
//! ## Module Organization
//!
//! - [`models`] - Domain entities: requests, rules, processes, tasks, users,
//!   connectors, history records
//! - [`time_range`] - Weekly activity windows
//! - [`orchestration`] - Scheduler abstraction, orchestrator state machine
//!   and background jobs
//! - [`matching`] - The rule engine
//! - [`processors`] - Request lifecycle steps: matching, export, standby
//!   reminders
//! - [`plugins`] - The connector and task-processor plugin contract
//! - [`persistence`] - Repository traits and in-memory reference
//!   implementations
//! - [`email`] - Per-recipient notification fan-out
//! - [`config`] - Bootstrap parameters
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use extract_core::config::SystemParameters;
//! use extract_core::email::{EmailSettings, NotificationSender, OutboundMessage};
//! use extract_core::matching::RuleEvaluator;
//! use extract_core::models::Request;
//! use extract_core::orchestration::{
//!     Orchestrator, OrchestratorComponents, OrchestratorSettings, TokioTaskScheduler,
//! };
//! use extract_core::persistence::memory::in_memory_repositories;
//! use extract_core::plugins::{ConnectorRegistry, TaskProcessorRegistry};
//!
//! struct NoopSender;
//!
//! impl NotificationSender for NoopSender {
//!     fn send(&self, _message: &OutboundMessage) -> extract_core::error::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! struct MatchNothing;
//!
//! impl RuleEvaluator for MatchNothing {
//!     fn evaluate(&self, _predicate: &str, _request: &Request) -> extract_core::error::Result<bool> {
//!         Ok(false)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> extract_core::error::Result<()> {
//!     extract_core::logging::init_structured_logging();
//!
//!     let parameters = SystemParameters::load()?;
//!     let email_settings = EmailSettings::new(parameters.smtp.clone(), &parameters.application_language);
//!
//!     let orchestrator = Orchestrator::new();
//!     orchestrator.initialize_components(
//!         OrchestratorComponents {
//!             scheduler: Arc::new(TokioTaskScheduler::new()),
//!             repositories: in_memory_repositories(&parameters),
//!             connector_registry: Arc::new(ConnectorRegistry::new()),
//!             task_registry: Arc::new(TaskProcessorRegistry::new()),
//!             email_settings,
//!             notification_sender: Arc::new(NoopSender),
//!             rule_evaluator: Arc::new(MatchNothing),
//!             application_language: parameters.application_language.clone(),
//!         },
//!         OrchestratorSettings::default(),
//!     )?;
//!     orchestrator.schedule_monitoring_by_working_state()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod email;
pub mod error;
pub mod logging;
pub mod matching;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod plugins;
pub mod processors;
pub mod time_range;
pub mod utils;

pub use error::{ExtractError, Result};
pub use models::{Request, RequestStatus};
pub use orchestration::{Orchestrator, OrchestratorSettings, SchedulerMode, WorkingState};
pub use time_range::{TimeRange, TimeRangeCollection};
