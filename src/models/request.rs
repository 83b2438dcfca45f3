use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of an extraction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    /// The order from the originating server could not be processed as a request.
    ImportFail,
    /// The order has been fetched from its originating server.
    Imported,
    /// The processing of the request is running normally.
    Ongoing,
    /// No process could be attached to this request based on the connector rules.
    Unmatched,
    /// The last process task that ran failed.
    Error,
    /// An operator must decide if the process can proceed.
    Standby,
    /// The result is ready to be sent back to the originating server.
    ToExport,
    /// The result could not be sent back to the originating server.
    ExportFail,
    /// The result was sent back to the originating server and the process is over.
    Finished,
}

impl RequestStatus {
    /// Check if this is a terminal state (no further transitions expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::ImportFail)
    }

    /// Check if this state requires an operator intervention to proceed.
    pub fn requires_operator(&self) -> bool {
        matches!(
            self,
            Self::Unmatched | Self::Error | Self::Standby | Self::ExportFail
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImportFail => write!(f, "IMPORTFAIL"),
            Self::Imported => write!(f, "IMPORTED"),
            Self::Ongoing => write!(f, "ONGOING"),
            Self::Unmatched => write!(f, "UNMATCHED"),
            Self::Error => write!(f, "ERROR"),
            Self::Standby => write!(f, "STANDBY"),
            Self::ToExport => write!(f, "TOEXPORT"),
            Self::ExportFail => write!(f, "EXPORTFAIL"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IMPORTFAIL" => Ok(Self::ImportFail),
            "IMPORTED" => Ok(Self::Imported),
            "ONGOING" => Ok(Self::Ongoing),
            "UNMATCHED" => Ok(Self::Unmatched),
            "ERROR" => Ok(Self::Error),
            "STANDBY" => Ok(Self::Standby),
            "TOEXPORT" => Ok(Self::ToExport),
            "EXPORTFAIL" => Ok(Self::ExportFail),
            "FINISHED" => Ok(Self::Finished),
            _ => Err(format!("Invalid request status: {s}")),
        }
    }
}

/// A data item order imported from an external source system.
///
/// The process reference is set when a rule matches the request; the data
/// folders are provisioned at the same time and stay stable for the rest of
/// the request's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: i32,
    /// The connector instance that imported this request.
    pub connector_id: i32,
    /// The process matched to this request, if any.
    pub process_id: Option<i32>,
    pub order_label: String,
    pub product_label: String,
    pub client: String,
    pub organism: Option<String>,
    /// The geographical perimeter of the order, as a WKT string.
    pub perimeter: Option<String>,
    /// The custom parameters of the order, as a JSON object string.
    pub parameters: Option<String>,
    pub status: RequestStatus,
    /// Path of the input data folder, relative to the requests base folder.
    pub folder_in: Option<String>,
    /// Path of the output data folder, relative to the requests base folder.
    pub folder_out: Option<String>,
    /// 1-based cursor over the tasks of the matched process.
    pub task_number: i32,
    pub rejected: bool,
    pub remark: Option<String>,
    pub last_reminder: Option<DateTime<Utc>>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Request {
    /// Create a freshly imported request for the given connector.
    pub fn new_imported(id: i32, connector_id: i32, order_label: &str, product_label: &str) -> Self {
        Self {
            id,
            connector_id,
            process_id: None,
            order_label: order_label.to_string(),
            product_label: product_label.to_string(),
            client: String::new(),
            organism: None,
            perimeter: None,
            parameters: None,
            status: RequestStatus::Imported,
            folder_in: None,
            folder_out: None,
            task_number: 0,
            rejected: false,
            remark: None,
            last_reminder: None,
            start_date: Utc::now(),
            end_date: None,
        }
    }
}
