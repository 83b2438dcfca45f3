use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::email::EmailSettings;
use crate::models::Request;
use crate::plugins::params::ParameterSpec;

/// Outcome families a task plugin can report.
///
/// `NotRun` is a resource-exhaustion retry-later condition (the task is
/// attempted again at the next scheduling step without advancing the task
/// cursor), distinct from `Error` (failed until an operator intervenes) and
/// `Standby` (paused pending manual validation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskResultStatus {
    Success,
    Error,
    NotRun,
    Standby,
}

/// Request properties a task plugin is allowed to modify.
///
/// A plugin that rejects the order must provide a remark explaining why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDataUpdate {
    pub rejected: bool,
    pub remark: Option<String>,
}

/// Result of one task plugin execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: TaskResultStatus,
    pub message: String,
    pub error_code: Option<String>,
    /// Modified request properties, if the plugin changed any.
    pub request_data: Option<RequestDataUpdate>,
}

impl TaskResult {
    pub fn success(message: &str) -> Self {
        Self {
            status: TaskResultStatus::Success,
            message: message.to_string(),
            error_code: None,
            request_data: None,
        }
    }

    pub fn error(message: &str, error_code: &str) -> Self {
        Self {
            status: TaskResultStatus::Error,
            message: message.to_string(),
            error_code: Some(error_code.to_string()),
            request_data: None,
        }
    }

    pub fn standby(message: &str) -> Self {
        Self {
            status: TaskResultStatus::Standby,
            message: message.to_string(),
            error_code: None,
            request_data: None,
        }
    }

    pub fn not_run(message: &str) -> Self {
        Self {
            status: TaskResultStatus::NotRun,
            message: message.to_string(),
            error_code: None,
            request_data: None,
        }
    }

    pub fn with_request_data(mut self, request_data: RequestDataUpdate) -> Self {
        self.request_data = Some(request_data);
        self
    }
}

/// Read-only view of a request handed to a task plugin for execution.
#[derive(Debug, Clone)]
pub struct TaskProcessorRequestView {
    pub request_id: i32,
    pub order_label: String,
    pub product_label: String,
    pub client: String,
    pub organism: Option<String>,
    pub perimeter: Option<String>,
    pub parameters: Option<String>,
    pub rejected: bool,
    pub remark: Option<String>,
    /// Absolute path of the folder holding the data to consume.
    pub input_folder: Option<PathBuf>,
    /// Absolute path of the folder the task writes its output to.
    pub output_folder: Option<PathBuf>,
}

impl TaskProcessorRequestView {
    /// Build the task-facing view of a request, resolving its data folders
    /// against the requests base folder.
    pub fn new(request: &Request, base_path: &Path) -> Self {
        Self {
            request_id: request.id,
            order_label: request.order_label.clone(),
            product_label: request.product_label.clone(),
            client: request.client.clone(),
            organism: request.organism.clone(),
            perimeter: request.perimeter.clone(),
            parameters: request.parameters.clone(),
            rejected: request.rejected,
            remark: request.remark.clone(),
            input_folder: request
                .folder_in
                .as_ref()
                .map(|folder| base_path.join(folder)),
            output_folder: request
                .folder_out
                .as_ref()
                .map(|folder| base_path.join(folder)),
        }
    }
}

/// The task-processor capability family: executing one pipeline step.
///
/// Each invocation works on a fresh instance obtained through
/// [`TaskProcessorPlugin::new_instance`], bound to the settings of the task
/// being run. Failures are reported through the result, never raised.
pub trait TaskProcessorPlugin: Send + Sync {
    /// Stable code identifying this plugin in the registry.
    fn code(&self) -> &str;

    fn label(&self) -> &str;

    /// Create an instance bound to a language and the task's settings.
    fn new_instance(
        &self,
        language: &str,
        task_settings: &HashMap<String, String>,
    ) -> Arc<dyn TaskProcessorPlugin>;

    /// Execute the pipeline step for the given request.
    fn execute(&self, request: &TaskProcessorRequestView, email_settings: &EmailSettings)
        -> TaskResult;

    /// The declarative parameter schema of this plugin.
    fn params(&self) -> Vec<ParameterSpec>;
}
