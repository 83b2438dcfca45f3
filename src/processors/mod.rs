//! # Request Lifecycle Processors
//!
//! The batch steps that advance a request through its lifecycle: matching a
//! freshly imported request to a process, exporting a finished request back
//! to its source system and reminding the operators about requests stuck in
//! standby. Each processor consumes one request and returns it mutated; the
//! scheduling jobs persist the returned value.

pub mod export;
pub mod matching;
pub mod reminder;

pub use export::ExportRequestProcessor;
pub use matching::RequestMatchingProcessor;
pub use reminder::StandbyRequestsReminderProcessor;
