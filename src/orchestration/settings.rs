use std::fmt;

use chrono::Local;
use tracing::debug;

use crate::constants::DEFAULT_SCHEDULER_FREQUENCY;
use crate::error::{ExtractError, Result};
use crate::persistence::ParametersRepository;
use crate::time_range::TimeRangeCollection;

/// How the orchestrator decides when background monitoring runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerMode {
    /// Monitoring runs continuously.
    AlwaysOn,
    /// Monitoring runs only inside the configured time windows.
    TimeWindows,
    /// Monitoring never runs.
    Disabled,
}

impl fmt::Display for SchedulerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlwaysOn => write!(f, "ON"),
            Self::TimeWindows => write!(f, "RANGES"),
            Self::Disabled => write!(f, "OFF"),
        }
    }
}

impl std::str::FromStr for SchedulerMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ON" => Ok(Self::AlwaysOn),
            "RANGES" => Ok(Self::TimeWindows),
            "OFF" => Ok(Self::Disabled),
            _ => Err(format!("Invalid scheduler mode: {s}")),
        }
    }
}

/// The background-scheduling configuration of the orchestrator.
///
/// Equality is structural; the orchestrator relies on it to suppress no-op
/// rescheduling when an identical settings value is applied again.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Background scheduling frequency, in seconds.
    pub frequency: u32,
    pub mode: SchedulerMode,
    pub ranges: TimeRangeCollection,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_SCHEDULER_FREQUENCY,
            mode: SchedulerMode::AlwaysOn,
            ranges: TimeRangeCollection::default(),
        }
    }
}

impl OrchestratorSettings {
    pub fn new(frequency: u32, mode: SchedulerMode, ranges: TimeRangeCollection) -> Self {
        Self {
            frequency,
            mode,
            ranges,
        }
    }

    /// Build the settings from the values persisted in the parameters
    /// repository.
    pub async fn from_repository(repository: &dyn ParametersRepository) -> Result<Self> {
        let frequency = repository.scheduler_frequency().await?;

        let mode: SchedulerMode = repository
            .scheduler_mode()
            .await?
            .parse()
            .map_err(ExtractError::Validation)?;

        let ranges_json = repository.scheduler_ranges().await?;
        let ranges = TimeRangeCollection::from_json(&ranges_json).ok_or_else(|| {
            ExtractError::Validation("The persisted scheduler time ranges are not valid JSON.".to_string())
        })?;

        Ok(Self::new(frequency, mode, ranges))
    }

    /// The settings are valid if the frequency is at least one second and,
    /// in time-windows mode, every range is well-formed.
    pub fn is_valid(&self) -> bool {
        if self.frequency < 1 {
            return false;
        }

        if self.mode != SchedulerMode::TimeWindows {
            return true;
        }

        self.ranges.is_valid()
    }

    /// Whether the current instant is inside any configured window.
    pub fn is_now_in_ranges(&self) -> bool {
        self.ranges.is_in_ranges(Local::now())
    }

    /// Whether monitoring should run right now under these settings.
    pub fn is_working(&self) -> bool {
        match self.mode {
            SchedulerMode::Disabled => false,
            SchedulerMode::AlwaysOn => true,
            SchedulerMode::TimeWindows => self.is_now_in_ranges(),
        }
    }

    /// The display string of the scheduling state these settings put the
    /// application in.
    pub fn state_string(&self) -> &'static str {
        debug!(
            mode = %self.mode,
            ranges = self.ranges.ranges().len(),
            "Computing the orchestrator state string."
        );

        if self.is_working() {
            return "RUNNING";
        }

        if self.mode == SchedulerMode::Disabled {
            return "STOPPED";
        }

        if self.mode == SchedulerMode::TimeWindows && self.ranges.is_empty() {
            return "SCHEDULE_CONFIG_ERROR";
        }

        "SCHEDULED_STOP"
    }
}
