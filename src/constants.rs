//! # System Constants
//!
//! Core constants that define the operational boundaries of the extraction
//! orchestration core. Storage keys mirror the values persisted by the
//! surrounding application so that settings round-trip unchanged.

/// Default background scheduling frequency, in seconds.
pub const DEFAULT_SCHEDULER_FREQUENCY: u32 = 20;

/// Name of the folder holding the data consumed by a request's process.
pub const INPUT_FOLDER_NAME: &str = "input";

/// Name of the folder holding the data produced by a request's process.
pub const OUTPUT_FOLDER_NAME: &str = "output";

/// Longest remark a task plugin may attach to a request.
pub const MAXIMUM_REMARK_LENGTH: usize = 5000;

/// Smallest ISO day-of-week index accepted in a time range.
pub const MINIMUM_DAY_INDEX: u8 = 1;

/// Largest ISO day-of-week index accepted in a time range.
pub const MAXIMUM_DAY_INDEX: u8 = 7;

/// Keys under which the orchestrator settings are persisted externally.
pub mod parameter_keys {
    pub const SCHEDULER_MODE: &str = "scheduler_mode";
    pub const SCHEDULER_FREQUENCY: &str = "scheduler_frequency";
    pub const SCHEDULER_RANGES: &str = "scheduler_ranges";
    pub const BASE_PATH: &str = "base_path";
    pub const STANDBY_REMINDER_DAYS: &str = "standby_reminder_days";
}
