use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one audited lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryStatus {
    Ongoing,
    Finished,
    Error,
    Standby,
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ongoing => write!(f, "ONGOING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Error => write!(f, "ERROR"),
            Self::Standby => write!(f, "STANDBY"),
        }
    }
}

/// An append-only audit entry for one lifecycle step of a request.
///
/// A record is opened as `Ongoing` when the step starts and closed exactly
/// once with the final status, end date and message when the step completes.
/// Step numbers are strictly increasing per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestHistoryRecord {
    pub id: i32,
    pub request_id: i32,
    /// Monotonic step number within the request's history.
    pub step: i32,
    /// Position of the step within the configured task sequence.
    pub process_step: i32,
    pub task_label: String,
    pub status: HistoryStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    /// Login of the user the step ran as (the system user for background steps).
    pub user_login: String,
}

impl RequestHistoryRecord {
    /// Open a new record for a step that is starting now.
    pub fn open(request_id: i32, step: i32, process_step: i32, task_label: &str, user_login: &str) -> Self {
        Self {
            id: 0,
            request_id,
            step,
            process_step,
            task_label: task_label.to_string(),
            status: HistoryStatus::Ongoing,
            start_date: Utc::now(),
            end_date: None,
            message: None,
            user_login: user_login.to_string(),
        }
    }

    /// Close this record with the given final status.
    pub fn close(&mut self, status: HistoryStatus, message: Option<&str>, end_date: DateTime<Utc>) {
        self.status = status;
        self.end_date = Some(end_date);
        self.message = message.map(str::to_string);
    }

    /// Close this record as failed.
    pub fn set_to_error(&mut self, message: &str, end_date: DateTime<Utc>) {
        self.close(HistoryStatus::Error, Some(message), end_date);
    }
}
