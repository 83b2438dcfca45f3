//! # Request Task Runner
//!
//! Executes the next pipeline task of one ongoing request through the
//! task-processor plugin contract and folds the plugin's result back into
//! the request, its history and the operator notifications.
//!
//! All failures are absorbed and logged here: a task run never takes the
//! scheduling job down with it.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::constants::MAXIMUM_REMARK_LENGTH;
use crate::email::{notify_users, EmailSettings, Notification, NotificationSender, RequestSummary};
use crate::error::{ExtractError, Result};
use crate::models::{
    HistoryStatus, Request, RequestHistoryRecord, RequestStatus, Task,
};
use crate::persistence::ApplicationRepositories;
use crate::plugins::{TaskProcessorRegistry, TaskProcessorRequestView, TaskResult, TaskResultStatus};

/// Runs the next pipeline task for ongoing requests.
pub struct RequestTaskRunner {
    repositories: ApplicationRepositories,
    task_registry: Arc<TaskProcessorRegistry>,
    email_settings: EmailSettings,
    sender: Arc<dyn NotificationSender>,
    language: String,
}

impl RequestTaskRunner {
    pub fn new(
        repositories: ApplicationRepositories,
        task_registry: Arc<TaskProcessorRegistry>,
        email_settings: EmailSettings,
        sender: Arc<dyn NotificationSender>,
        language: &str,
    ) -> Self {
        Self {
            repositories,
            task_registry,
            email_settings,
            sender,
            language: language.to_string(),
        }
    }

    /// Execute the next step for the given request. Errors are logged, never
    /// propagated to the scheduling job.
    pub async fn run(&self, request: Request) {
        let request_id = request.id;
        debug!(request_id, "Looking for the next task to execute for the request.");

        if let Err(run_error) = self.run_next_step(request).await {
            error!(
                request_id,
                error = %run_error,
                "An error occurred when processing the next task for the request."
            );
        }
    }

    async fn run_next_step(&self, request: Request) -> Result<()> {
        if request.status != RequestStatus::Ongoing {
            return Err(ExtractError::InvalidState(
                "The request to process must be ongoing.".to_string(),
            ));
        }

        if request.rejected {
            debug!(
                request_id = request.id,
                "The request is set as rejected. Marking it for export."
            );
            return self.prepare_request_for_export(request).await;
        }

        match self.next_task(&request).await? {
            None => {
                debug!(
                    request_id = request.id,
                    "No task remaining for the request. Marking it for export."
                );
                self.prepare_request_for_export(request).await
            }
            Some(task) => self.execute_task(request, task).await,
        }
    }

    /// The task the request's cursor points at, or `None` when the pipeline
    /// is exhausted.
    async fn next_task(&self, request: &Request) -> Result<Option<Task>> {
        let process_id = request.process_id.ok_or_else(|| {
            ExtractError::InvalidState(
                "The process for the ongoing request is not defined.".to_string(),
            )
        })?;

        if request.task_number < 1 {
            return Err(ExtractError::InvalidState(
                "The task number of an ongoing request must be greater than 0.".to_string(),
            ));
        }

        let tasks = self
            .repositories
            .tasks
            .find_by_process_ordered(process_id)
            .await?;

        if request.task_number as usize > tasks.len() {
            debug!(
                task_number = request.task_number,
                tasks = tasks.len(),
                "Task number is greater than the length of the process task collection."
            );
            return Ok(None);
        }

        Ok(tasks.into_iter().nth(request.task_number as usize - 1))
    }

    /// Update the request to indicate that it is ready to be exported.
    async fn prepare_request_for_export(&self, mut request: Request) -> Result<()> {
        request.status = RequestStatus::ToExport;
        self.repositories.requests.save(request).await?;
        Ok(())
    }

    /// Run the plugin for the current task and fold the result back.
    async fn execute_task(&self, mut request: Request, task: Task) -> Result<()> {
        let mut history_record = self.create_history_record(&request, &task).await?;

        let Some(task_plugin) = self.task_registry.get(&task.code) else {
            let error_message = format!("Plugin {} not found.", task.code);
            error!(code = %task.code, "The task plugin could not be found.");
            history_record.set_to_error(&error_message, Utc::now());
            self.repositories.history.save(history_record).await?;
            request.status = RequestStatus::Error;
            let request = self.repositories.requests.save(request).await?;
            self.send_error_email_to_operators(&request, &task, &error_message)
                .await;
            return Ok(());
        };

        let base_path = PathBuf::from(self.repositories.parameters.base_path().await?);
        let plugin_instance = task_plugin.new_instance(&self.language, &task.parameters_values);
        let view = TaskProcessorRequestView::new(&request, &base_path);
        let email_settings = self.email_settings.clone();

        let result = match tokio::task::spawn_blocking(move || {
            plugin_instance.execute(&view, &email_settings)
        })
        .await
        {
            Ok(result) => result,
            Err(join_error) => {
                // A plugin is not supposed to panic; convert the defect into
                // an error result at the boundary.
                error!(
                    request_id = request.id,
                    error = %join_error,
                    "The task plugin aborted abnormally."
                );
                TaskResult::error("The task plugin aborted abnormally", "UNEXPECTED")
            }
        };

        self.process_task_result(request, task, history_record, result)
            .await
    }

    /// Add a new item to the request history tracing the execution of the
    /// current task.
    async fn create_history_record(
        &self,
        request: &Request,
        task: &Task,
    ) -> Result<RequestHistoryRecord> {
        let system_user = self.repositories.users.system_user().await?;

        let step = self
            .repositories
            .history
            .find_by_request_ordered(request.id)
            .await?
            .len() as i32
            + 1;

        debug!(
            request_id = request.id,
            step, "Creating a new request history record for the task."
        );

        let record = RequestHistoryRecord::open(
            request.id,
            step,
            task.position,
            &task.label,
            &system_user.login,
        );

        self.repositories.history.save(record).await
    }

    /// Carry the appropriate actions based on the result returned by the
    /// task plugin.
    async fn process_task_result(
        &self,
        request: Request,
        task: Task,
        history_record: RequestHistoryRecord,
        result: TaskResult,
    ) -> Result<()> {
        if let Some(request_data) = &result.request_data {
            if let Some(remark) = &request_data.remark {
                if remark.len() > MAXIMUM_REMARK_LENGTH {
                    let message = "The remark returned by the task is too long.";
                    return self
                        .process_task_error(request, task, history_record, message)
                        .await;
                }
            }
        }

        match result.status {
            TaskResultStatus::Success => {
                self.process_task_success(request, history_record, result)
                    .await
            }
            TaskResultStatus::Error => {
                let message = format!(
                    "{} ({})",
                    result.message,
                    result.error_code.as_deref().unwrap_or("-")
                );
                self.process_task_error(request, task, history_record, &message)
                    .await
            }
            TaskResultStatus::Standby => {
                self.process_task_standby(request, history_record, &result.message)
                    .await
            }
            TaskResultStatus::NotRun => {
                info!(
                    task_label = %task.label,
                    code = %task.code,
                    "The task could not be run at the moment by the plugin. Execution will be attempted again at the next orchestrator step."
                );
                self.repositories.history.delete(history_record.id).await
            }
        }
    }

    /// A completed task advances the cursor and may update the request
    /// properties a plugin is allowed to modify.
    async fn process_task_success(
        &self,
        mut request: Request,
        mut history_record: RequestHistoryRecord,
        result: TaskResult,
    ) -> Result<()> {
        let end_date = Utc::now();

        if let Some(request_data) = &result.request_data {
            if request_data.rejected {
                match request_data.remark.as_deref() {
                    Some(remark) if !remark.is_empty() => {
                        request.rejected = true;
                        request.remark = Some(remark.to_string());
                    }
                    _ => {
                        let message =
                            "A task plugin must set a remark if it rejects the request.";
                        return self
                            .process_plugin_contract_error(request, history_record, message)
                            .await;
                    }
                }
            } else if request_data.remark != request.remark {
                request.remark = request_data.remark.clone();
            }
        }

        request.task_number += 1;
        history_record.close(HistoryStatus::Finished, Some(&result.message), end_date);
        self.repositories.history.save(history_record).await?;
        self.repositories.requests.save(request).await?;
        Ok(())
    }

    /// A failed task halts the pipeline and surfaces to the operators.
    async fn process_task_error(
        &self,
        mut request: Request,
        task: Task,
        mut history_record: RequestHistoryRecord,
        error_message: &str,
    ) -> Result<()> {
        history_record.set_to_error(error_message, Utc::now());
        self.repositories.history.save(history_record).await?;
        request.status = RequestStatus::Error;
        let request = self.repositories.requests.save(request).await?;
        self.send_error_email_to_operators(&request, &task, error_message)
            .await;
        Ok(())
    }

    /// A contract violation by the plugin is an error without a task to
    /// blame in the notification.
    async fn process_plugin_contract_error(
        &self,
        mut request: Request,
        mut history_record: RequestHistoryRecord,
        error_message: &str,
    ) -> Result<()> {
        warn!(request_id = request.id, error_message, "Task plugin contract violation.");
        history_record.set_to_error(error_message, Utc::now());
        self.repositories.history.save(history_record).await?;
        request.status = RequestStatus::Error;
        self.repositories.requests.save(request).await?;
        Ok(())
    }

    /// A standby task pauses the pipeline pending manual validation.
    async fn process_task_standby(
        &self,
        mut request: Request,
        mut history_record: RequestHistoryRecord,
        message: &str,
    ) -> Result<()> {
        let standby_date = Utc::now();
        history_record.close(HistoryStatus::Standby, Some(message), standby_date);
        self.repositories.history.save(history_record).await?;

        request.status = RequestStatus::Standby;
        // The first reminder fires a full delay after entering standby.
        request.last_reminder = Some(standby_date);
        let request = self.repositories.requests.save(request).await?;

        self.send_standby_email_to_operators(&request).await;
        Ok(())
    }

    /// Notify the process operators that the current task failed.
    async fn send_error_email_to_operators(
        &self,
        request: &Request,
        task: &Task,
        error_message: &str,
    ) {
        debug!("Sending e-mail notifications to the operators of the process that failed.");

        let operators = self.process_operators(request).await;

        let notification = Notification::TaskFailed {
            request: RequestSummary::from(request),
            task_label: task.label.clone(),
            error_message: error_message.to_string(),
            failed_at: Utc::now(),
        };

        notify_users(
            self.sender.as_ref(),
            &self.email_settings,
            &operators,
            &notification,
        );
    }

    /// Notify the process operators that the current task requires an
    /// intervention.
    async fn send_standby_email_to_operators(&self, request: &Request) {
        debug!("Sending e-mail notifications to the operators of the process in standby mode.");

        let operators = self.process_operators(request).await;

        let notification = Notification::TaskStandby {
            request: RequestSummary::from(request),
        };

        notify_users(
            self.sender.as_ref(),
            &self.email_settings,
            &operators,
            &notification,
        );
    }

    async fn process_operators(&self, request: &Request) -> Vec<crate::models::User> {
        let Some(process_id) = request.process_id else {
            error!(request_id = request.id, "Could not fetch the operators for this process.");
            return Vec::new();
        };

        match self.repositories.processes.find_operators(process_id).await {
            Ok(operators) => operators,
            Err(processes_error) => {
                error!(error = %processes_error, "Could not fetch the operators for this process.");
                Vec::new()
            }
        }
    }
}
