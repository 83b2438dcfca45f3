//! # Persistence Abstractions
//!
//! The orchestration core does not own a storage engine. Every data access
//! goes through these repository traits, supplied by the embedding
//! application. The [`memory`] submodule provides in-memory reference
//! implementations used by the integration tests and by embedders that do
//! not need durable storage.

pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{
    Connector, Process, Request, RequestHistoryRecord, RequestStatus, Rule, Task, User,
};

/// Access to the extraction requests.
#[async_trait]
pub trait RequestsRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<Request>>;

    async fn find_by_status(&self, status: RequestStatus) -> Result<Vec<Request>>;

    /// Persist the request, returning the stored value. A request with id 0
    /// is created and assigned an identifier.
    async fn save(&self, request: Request) -> Result<Request>;
}

/// Access to the connector routing rules.
#[async_trait]
pub trait RulesRepository: Send + Sync {
    /// The active rules of a connector, ordered ascending by position.
    ///
    /// The ordering here is what makes the rule engine deterministic; the
    /// matcher iterates the returned list as-is.
    async fn find_by_connector_active_ordered(&self, connector_id: i32) -> Result<Vec<Rule>>;
}

/// Access to the application users.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn find_active_administrators(&self) -> Result<Vec<User>>;

    /// The technical user background steps run as.
    async fn system_user(&self) -> Result<User>;
}

/// Access to the processes and their operators.
#[async_trait]
pub trait ProcessesRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<Process>>;

    /// The users supervising the given process.
    async fn find_operators(&self, process_id: i32) -> Result<Vec<User>>;
}

/// Access to the tasks composing the processes.
#[async_trait]
pub trait TasksRepository: Send + Sync {
    /// The tasks of a process, ordered ascending by position.
    async fn find_by_process_ordered(&self, process_id: i32) -> Result<Vec<Task>>;
}

/// Access to the request history audit trail.
#[async_trait]
pub trait RequestHistoryRepository: Send + Sync {
    /// The records of a request, ordered ascending by step.
    async fn find_by_request_ordered(&self, request_id: i32) -> Result<Vec<RequestHistoryRecord>>;

    /// Persist the record, returning the stored value. A record with id 0 is
    /// created and assigned an identifier.
    async fn save(&self, record: RequestHistoryRecord) -> Result<RequestHistoryRecord>;

    async fn delete(&self, record_id: i32) -> Result<()>;
}

/// Access to the connector instances.
#[async_trait]
pub trait ConnectorsRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<Connector>>;

    async fn find_active(&self) -> Result<Vec<Connector>>;
}

/// Access to the externally persisted application parameters.
#[async_trait]
pub trait ParametersRepository: Send + Sync {
    /// Absolute path of the folder that contains the data for all requests.
    async fn base_path(&self) -> Result<String>;

    /// Scheduler mode storage value (`ON`, `RANGES` or `OFF`).
    async fn scheduler_mode(&self) -> Result<String>;

    /// Background scheduling frequency, in seconds.
    async fn scheduler_frequency(&self) -> Result<u32>;

    /// Scheduler time ranges as a JSON array.
    async fn scheduler_ranges(&self) -> Result<String>;

    /// Days before a standby request is reminded again. Zero disables
    /// reminders.
    async fn standby_reminder_days(&self) -> Result<u32>;
}

/// The ensemble of repositories the orchestration components work against.
#[derive(Clone)]
pub struct ApplicationRepositories {
    pub requests: Arc<dyn RequestsRepository>,
    pub rules: Arc<dyn RulesRepository>,
    pub users: Arc<dyn UsersRepository>,
    pub processes: Arc<dyn ProcessesRepository>,
    pub tasks: Arc<dyn TasksRepository>,
    pub history: Arc<dyn RequestHistoryRepository>,
    pub connectors: Arc<dyn ConnectorsRepository>,
    pub parameters: Arc<dyn ParametersRepository>,
}
