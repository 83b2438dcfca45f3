//! # Domain Model Layer
//!
//! The data objects moved through the request lifecycle: extraction
//! requests, the connectors that imported them, the rules that route them,
//! the processes and tasks that handle them, the users that are notified
//! about them and the audit records that trace them.

pub mod connector;
pub mod history;
pub mod process;
pub mod request;
pub mod rule;
pub mod task;
pub mod user;

pub use connector::Connector;
pub use history::{HistoryStatus, RequestHistoryRecord};
pub use process::Process;
pub use request::{Request, RequestStatus};
pub use rule::Rule;
pub use task::Task;
pub use user::{User, UserProfile};
