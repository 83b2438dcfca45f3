//! Shared fixtures for the integration tests: a deterministic manual
//! scheduler, a recording notification sender, scripted plugins and a
//! pre-wired repository ensemble.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use extract_core::config::{SmtpParameters, SystemParameters};
use extract_core::email::{EmailSettings, NotificationSender, OutboundMessage};
use extract_core::error::Result;
use extract_core::matching::RuleEvaluator;
use extract_core::models::{
    Connector, Process, Request, RequestStatus, Rule, Task, User, UserProfile,
};
use extract_core::orchestration::scheduler::{RecurringJob, ScheduledJobHandle, TaskScheduler};
use extract_core::persistence::memory::{
    in_memory_repositories, InMemoryConnectorsRepository, InMemoryProcessesRepository,
    InMemoryRulesRepository, InMemoryTasksRepository, InMemoryUsersRepository,
};
use extract_core::persistence::ApplicationRepositories;
use extract_core::plugins::{
    ConnectorPlugin, ExportRequestView, ExportResult, ImportResult, ImportedOrder, ParameterSpec,
    TaskProcessorPlugin, TaskProcessorRequestView, TaskResult,
};

/// A scheduler that never starts a timer: tests run the registered jobs by
/// calling [`ManualScheduler::tick`].
#[derive(Default)]
pub struct ManualScheduler {
    jobs: Mutex<Vec<(ScheduledJobHandle, RecurringJob)>>,
}

impl ManualScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Jobs scheduled over the scheduler's lifetime, cancelled included.
    pub fn total_scheduled(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Jobs that are scheduled and not cancelled.
    pub fn active_job_count(&self) -> usize {
        self.jobs
            .lock()
            .iter()
            .filter(|(handle, _)| !handle.is_cancelled())
            .count()
    }

    /// Run every non-cancelled job once, to completion.
    pub async fn tick(&self) {
        let snapshot: Vec<(ScheduledJobHandle, RecurringJob)> = self
            .jobs
            .lock()
            .iter()
            .map(|(handle, job)| (handle.clone(), Arc::clone(job)))
            .collect();

        for (handle, job) in snapshot {
            if !handle.is_cancelled() {
                job().await;
            }
        }
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule_fixed_delay(&self, job: RecurringJob, _delay: Duration) -> ScheduledJobHandle {
        let handle = ScheduledJobHandle::new();
        self.jobs.lock().push((handle.clone(), job));
        handle
    }
}

/// Records every outbound message instead of delivering it.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<OutboundMessage>>,
}

impl NotificationSender for RecordingSender {
    fn send(&self, message: &OutboundMessage) -> Result<()> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Matches when the predicate equals the request's client field.
pub struct ClientEqualsEvaluator;

impl RuleEvaluator for ClientEqualsEvaluator {
    fn evaluate(&self, predicate: &str, request: &Request) -> Result<bool> {
        Ok(predicate == request.client)
    }
}

/// Connector plugin with a scripted import batch and export result.
pub struct ScriptedConnector {
    pub orders: Vec<ImportedOrder>,
    pub export: ExportResult,
}

impl ScriptedConnector {
    pub fn exporting(export: ExportResult) -> Self {
        Self {
            orders: Vec::new(),
            export,
        }
    }

    pub fn importing(orders: Vec<ImportedOrder>) -> Self {
        Self {
            orders,
            export: ExportResult::success("Exported"),
        }
    }
}

impl ConnectorPlugin for ScriptedConnector {
    fn code(&self) -> &str {
        "scripted-connector"
    }

    fn label(&self) -> &str {
        "Scripted connector"
    }

    fn new_instance(
        &self,
        _language: &str,
        _parameters: &HashMap<String, String>,
    ) -> Arc<dyn ConnectorPlugin> {
        Arc::new(Self {
            orders: self.orders.clone(),
            export: self.export.clone(),
        })
    }

    fn import_orders(&self) -> ImportResult {
        ImportResult {
            success: true,
            error_message: None,
            orders: self.orders.clone(),
        }
    }

    fn export_result(&self, _request: &ExportRequestView) -> ExportResult {
        self.export.clone()
    }

    fn params(&self) -> Vec<ParameterSpec> {
        vec![]
    }
}

/// Task plugin returning a scripted result.
pub struct ScriptedTask {
    pub code: String,
    pub result: TaskResult,
}

impl TaskProcessorPlugin for ScriptedTask {
    fn code(&self) -> &str {
        &self.code
    }

    fn label(&self) -> &str {
        "Scripted task"
    }

    fn new_instance(
        &self,
        _language: &str,
        _task_settings: &HashMap<String, String>,
    ) -> Arc<dyn TaskProcessorPlugin> {
        Arc::new(Self {
            code: self.code.clone(),
            result: self.result.clone(),
        })
    }

    fn execute(
        &self,
        _request: &TaskProcessorRequestView,
        _email_settings: &EmailSettings,
    ) -> TaskResult {
        self.result.clone()
    }

    fn params(&self) -> Vec<ParameterSpec> {
        vec![]
    }
}

pub fn email_settings() -> EmailSettings {
    EmailSettings::new(
        SmtpParameters {
            host: "localhost".to_string(),
            port: 25,
            from_address: "extract@localhost".to_string(),
            enabled: true,
        },
        "en",
    )
}

/// A repository ensemble with one connector (id 1, plugin
/// `scripted-connector`), one process (id 20, one operator), one rule
/// routing client `acme` to it and one administrator.
pub fn seeded_repositories(base_path: &Path, tasks: &[Task]) -> ApplicationRepositories {
    let parameters = SystemParameters {
        base_path: base_path.to_string_lossy().to_string(),
        ..SystemParameters::default()
    };
    let repositories = in_memory_repositories(&parameters);

    let connectors = InMemoryConnectorsRepository::new();
    connectors.insert(Connector::new(1, "Source", "scripted-connector", 60));

    let processes = InMemoryProcessesRepository::new();
    processes.insert(Process::new(20, "Extraction"));
    processes.set_operators(
        20,
        vec![User::new(7, "oper", "oper@example.com", UserProfile::Operator)],
    );

    let tasks_repository = InMemoryTasksRepository::new();
    for task in tasks {
        tasks_repository.insert(task.clone());
    }

    let rules = InMemoryRulesRepository::new();
    rules.insert(Rule::new(1, 1, 1, 20, "acme"));

    let users = InMemoryUsersRepository::new();
    users.insert(User::new(5, "admin", "admin@example.com", UserProfile::Admin));

    ApplicationRepositories {
        connectors: Arc::new(connectors),
        processes: Arc::new(processes),
        tasks: Arc::new(tasks_repository),
        rules: Arc::new(rules),
        users: Arc::new(users),
        ..repositories
    }
}

/// Poll the stored request until it reaches the expected status.
pub async fn wait_for_status(
    repositories: &ApplicationRepositories,
    request_id: i32,
    status: RequestStatus,
) -> Request {
    for _ in 0..200 {
        if let Some(request) = repositories.requests.find_by_id(request_id).await.unwrap() {
            if request.status == status {
                return request;
            }
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("The request never reached the status {status}");
}
