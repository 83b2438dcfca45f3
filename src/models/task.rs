use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One step of a process, executed by a task-processor plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i32,
    pub process_id: i32,
    /// 1-based position of the task within its process.
    pub position: i32,
    pub label: String,
    /// Code of the task-processor plugin that executes this task.
    pub code: String,
    /// Parameter values configured for this task, keyed by parameter code.
    pub parameters_values: HashMap<String, String>,
}

impl Task {
    pub fn new(id: i32, process_id: i32, position: i32, label: &str, code: &str) -> Self {
        Self {
            id,
            process_id,
            position,
            label: label.to_string(),
            code: code.to_string(),
            parameters_values: HashMap::new(),
        }
    }
}
