use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::Request;
use crate::plugins::params::ParameterSpec;

/// Result of pushing a request's result back to its source system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    pub success: bool,
    pub result_message: String,
    pub error_details: Option<String>,
}

impl ExportResult {
    pub fn success(message: &str) -> Self {
        Self {
            success: true,
            result_message: message.to_string(),
            error_details: None,
        }
    }

    pub fn failure(message: &str, details: Option<&str>) -> Self {
        Self {
            success: false,
            result_message: message.to_string(),
            error_details: details.map(str::to_string),
        }
    }
}

/// An order fetched from the source system by a connector import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedOrder {
    pub order_label: String,
    pub product_label: String,
    pub client: String,
    pub organism: Option<String>,
    pub perimeter: Option<String>,
    /// Custom order parameters as a JSON object string.
    pub parameters: Option<String>,
}

/// Result of one connector import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub orders: Vec<ImportedOrder>,
}

/// Read-only view of a request handed to a connector plugin for export.
///
/// Plugins never receive the domain entity itself, so they cannot mutate
/// lifecycle fields.
#[derive(Debug, Clone)]
pub struct ExportRequestView {
    pub request_id: i32,
    pub order_label: String,
    pub product_label: String,
    pub client: String,
    pub organism: Option<String>,
    pub perimeter: Option<String>,
    pub parameters: Option<String>,
    pub rejected: bool,
    pub remark: Option<String>,
    /// Absolute path of the folder holding the produced data.
    pub output_folder: Option<PathBuf>,
}

impl ExportRequestView {
    /// Build the exportable view of a request, resolving its output folder
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
            output_folder: request
                .folder_out
                .as_ref()
                .map(|folder| base_path.join(folder)),
        }
    }
}

/// The connector capability family: importing orders from and exporting
/// results back to an external ordering system.
///
/// Implementations must be safely callable concurrently across different
/// requests; each invocation works on a fresh instance obtained through
/// [`ConnectorPlugin::new_instance`].
pub trait ConnectorPlugin: Send + Sync {
    /// Stable code identifying this plugin in the registry.
    fn code(&self) -> &str;

    fn label(&self) -> &str;

    /// Create an instance bound to a language and a set of parameter values.
    fn new_instance(
        &self,
        language: &str,
        parameters: &HashMap<String, String>,
    ) -> Arc<dyn ConnectorPlugin>;

    /// Fetch the orders waiting on the source system.
    fn import_orders(&self) -> ImportResult;

    /// Push a finished request's result back to the source system.
    ///
    /// Failures are reported through the result, never raised.
    fn export_result(&self, request: &ExportRequestView) -> ExportResult;

    /// The declarative parameter schema of this plugin.
    fn params(&self) -> Vec<ParameterSpec>;
}
