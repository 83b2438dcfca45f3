use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::email::{notify_users, EmailSettings, Notification, NotificationSender, RequestSummary};
use crate::error::{ExtractError, Result};
use crate::models::{HistoryStatus, Request, RequestHistoryRecord, RequestStatus, User};
use crate::persistence::ApplicationRepositories;
use crate::plugins::{ConnectorRegistry, ExportRequestView, ExportResult};
use crate::utils::file_system;

/// Label recorded in the request history for the export step.
const EXPORT_TASK_LABEL: &str = "Export";

/// Message recorded when the connector plugin produced no usable result.
const EMPTY_RESULT_MESSAGE: &str = "Empty result returned";

/// Exports a request's result to its source system through the connector
/// plugin and finalizes the request's lifecycle.
///
/// A missing plugin or base folder leaves the request unchanged so the next
/// scheduling cycle retries the export; there is no explicit retry loop.
pub struct ExportRequestProcessor {
    repositories: ApplicationRepositories,
    connector_registry: Arc<ConnectorRegistry>,
    email_settings: EmailSettings,
    sender: Arc<dyn NotificationSender>,
    language: String,
}

impl ExportRequestProcessor {
    pub fn new(
        repositories: ApplicationRepositories,
        connector_registry: Arc<ConnectorRegistry>,
        email_settings: EmailSettings,
        sender: Arc<dyn NotificationSender>,
        language: &str,
    ) -> Self {
        Self {
            repositories,
            connector_registry,
            email_settings,
            sender,
            language: language.to_string(),
        }
    }

    /// Export a request, returning it updated to reflect the result.
    pub async fn process(&self, request: Request) -> Result<Request> {
        let request_id = request.id;

        let connector = self
            .repositories
            .connectors
            .find_by_id(request.connector_id)
            .await?
            .ok_or_else(|| {
                ExtractError::InvalidState(format!(
                    "The connector for request {request_id} does not exist."
                ))
            })?;

        let history_record = self.create_history_record(&request).await?;

        let Some(connector_plugin) = self.connector_registry.get(&connector.code) else {
            warn!(
                request_id,
                code = %connector.code,
                "The connector plugin referenced by the request is not available anymore. Cannot export request."
            );
            return Ok(request);
        };

        let base_path = PathBuf::from(self.repositories.parameters.base_path().await?);

        if !base_path.is_dir() {
            error!(
                request_id,
                base_path = %base_path.display(),
                "The base requests data folder does not exist or is not a directory. Cannot export the request."
            );
            return Ok(request);
        }

        let plugin_instance =
            connector_plugin.new_instance(&self.language, &connector.parameters_values);
        let export_view = ExportRequestView::new(&request, &base_path);

        let result =
            match tokio::task::spawn_blocking(move || plugin_instance.export_result(&export_view))
                .await
            {
                Ok(result) => result,
                Err(join_error) => {
                    // A plugin is not supposed to panic; convert the defect
                    // into a failure result at the boundary.
                    error!(request_id, error = %join_error, "The connector plugin aborted abnormally.");
                    ExportResult::failure(EMPTY_RESULT_MESSAGE, None)
                }
            };

        self.process_export_result(result, request, history_record, &base_path)
            .await
    }

    /// Open the history record tracing the export step.
    async fn create_history_record(&self, request: &Request) -> Result<RequestHistoryRecord> {
        let process_id = request.process_id.ok_or_else(|| {
            ExtractError::InvalidState(format!(
                "Request {} reached the export step without a process.",
                request.id
            ))
        })?;

        let step = self
            .repositories
            .history
            .find_by_request_ordered(request.id)
            .await?
            .len() as i32
            + 1;

        let process_step = self
            .repositories
            .tasks
            .find_by_process_ordered(process_id)
            .await?
            .len() as i32
            + 1;

        let system_user = self.repositories.users.system_user().await?;
        let record = RequestHistoryRecord::open(
            request.id,
            step,
            process_step,
            EXPORT_TASK_LABEL,
            &system_user.login,
        );

        self.repositories.history.save(record).await
    }

    /// Update the request and the export history record to reflect the
    /// result of the export.
    async fn process_export_result(
        &self,
        result: ExportResult,
        mut request: Request,
        mut history_record: RequestHistoryRecord,
        base_path: &std::path::Path,
    ) -> Result<Request> {
        let request_id = request.id;
        let end_date = Utc::now();

        if result.success {
            info!(request_id, "Request has been correctly exported.");
            history_record.close(HistoryStatus::Finished, None, end_date);
            request.status = RequestStatus::Finished;
            request.end_date = Some(end_date);
            debug!(request_id, "Deleting the data folder for the request.");

            if !file_system::purge_request_folders(&request, base_path) {
                warn!(
                    request_id,
                    "Some files in the data folder for the request could not be deleted."
                );
            }
        } else {
            info!(
                request_id,
                message = %result.result_message,
                details = result.error_details.as_deref().unwrap_or(""),
                "Request export has failed."
            );
            let error_message = Self::result_error_message(&result);
            self.send_email_notification(&request, &error_message, end_date)
                .await;
            history_record.set_to_error(&error_message, end_date);
            request.status = RequestStatus::ExportFail;
        }

        self.repositories.history.save(history_record).await?;

        debug!(request_id, status = %request.status, "Request status updated after export.");

        Ok(request)
    }

    /// Build an error message from a failed export result, with the details
    /// appended when they are present.
    fn result_error_message(result: &ExportResult) -> String {
        match result.error_details.as_deref() {
            Some(details) if !details.is_empty() => {
                format!("{} - {}", result.result_message, details)
            }
            _ => result.result_message.clone(),
        }
    }

    /// Notify the process operators and the active administrators that the
    /// export failed.
    async fn send_email_notification(
        &self,
        request: &Request,
        error_message: &str,
        failed_at: chrono::DateTime<Utc>,
    ) {
        debug!("Sending e-mail notifications to operators and administrators.");

        let mut recipients: Vec<User> = Vec::new();

        if let Some(process_id) = request.process_id {
            match self.repositories.processes.find_operators(process_id).await {
                Ok(operators) => recipients.extend(operators),
                Err(processes_error) => {
                    warn!(error = %processes_error, "Could not fetch the operators for the process.");
                }
            }
        }

        match self.repositories.users.find_active_administrators().await {
            Ok(administrators) => recipients.extend(administrators),
            Err(users_error) => {
                warn!(error = %users_error, "Could not fetch the active administrators.");
            }
        }

        let notification = Notification::ExportFailed {
            request: RequestSummary::from(request),
            error_message: error_message.to_string(),
            failed_at,
        };

        notify_users(
            self.sender.as_ref(),
            &self.email_settings,
            &recipients,
            &notification,
        );
    }
}
