//! # Plugin Contract
//!
//! The two polymorphic capability families the orchestration core consumes
//! but does not implement: connectors (import orders from and export results
//! to an external ordering system) and task processors (execute one pipeline
//! step). Plugins are resolved by a string code through the registries and
//! always invoked on a fresh instance created with `new_instance`.
//!
//! Plugins only ever see read-only views of a request; lifecycle mutation
//! stays inside the core.

pub mod connector;
pub mod params;
pub mod registry;
pub mod task_processor;

pub use connector::{
    ConnectorPlugin, ExportRequestView, ExportResult, ImportResult, ImportedOrder,
};
pub use params::{ParameterSpec, ParameterType};
pub use registry::{ConnectorRegistry, TaskProcessorRegistry};
pub use task_processor::{
    RequestDataUpdate, TaskProcessorPlugin, TaskProcessorRequestView, TaskResult, TaskResultStatus,
};
