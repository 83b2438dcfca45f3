//! # System Parameters
//!
//! Bootstrap configuration for the orchestration core. The values mirror the
//! parameters the surrounding application persists externally (scheduler
//! mode, frequency and time ranges, requests base path, reminder delay) and
//! are typically used to seed the parameters repository at startup.

use config::{Config, Environment};
use serde::Deserialize;

use crate::constants::DEFAULT_SCHEDULER_FREQUENCY;
use crate::error::{ExtractError, Result};

/// SMTP-related parameters handed to the notification layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SmtpParameters {
    pub host: String,
    pub port: u16,
    pub from_address: String,
    pub enabled: bool,
}

/// The application parameters consumed by the orchestration core.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemParameters {
    /// Absolute path of the folder that contains the data for all requests.
    pub base_path: String,
    /// Scheduler mode storage value (`ON`, `RANGES` or `OFF`).
    pub scheduler_mode: String,
    /// Background scheduling frequency, in seconds.
    pub scheduler_frequency: u32,
    /// Scheduler time ranges as a JSON array.
    pub scheduler_ranges: String,
    /// Days before a standby request is reminded again. Zero disables reminders.
    pub standby_reminder_days: u32,
    /// Locale code of the language the application displays messages in.
    pub application_language: String,
    pub smtp: SmtpParameters,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            base_path: "/var/extract/orders".to_string(),
            scheduler_mode: "ON".to_string(),
            scheduler_frequency: DEFAULT_SCHEDULER_FREQUENCY,
            scheduler_ranges: "[]".to_string(),
            standby_reminder_days: 0,
            application_language: "en".to_string(),
            smtp: SmtpParameters {
                host: "localhost".to_string(),
                port: 25,
                from_address: "extract@localhost".to_string(),
                enabled: false,
            },
        }
    }
}

impl SystemParameters {
    /// Load the parameters from the defaults, overridden by `EXTRACT_*`
    /// environment variables (nested fields use a double underscore, e.g.
    /// `EXTRACT_SMTP__HOST`).
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("base_path", defaults.base_path)
            .and_then(|builder| builder.set_default("scheduler_mode", defaults.scheduler_mode))
            .and_then(|builder| {
                builder.set_default("scheduler_frequency", i64::from(defaults.scheduler_frequency))
            })
            .and_then(|builder| builder.set_default("scheduler_ranges", defaults.scheduler_ranges))
            .and_then(|builder| {
                builder.set_default(
                    "standby_reminder_days",
                    i64::from(defaults.standby_reminder_days),
                )
            })
            .and_then(|builder| {
                builder.set_default("application_language", defaults.application_language)
            })
            .and_then(|builder| builder.set_default("smtp.host", defaults.smtp.host))
            .and_then(|builder| builder.set_default("smtp.port", i64::from(defaults.smtp.port)))
            .and_then(|builder| builder.set_default("smtp.from_address", defaults.smtp.from_address))
            .and_then(|builder| builder.set_default("smtp.enabled", defaults.smtp.enabled))
            .map_err(|e| ExtractError::Configuration(format!("Invalid default parameter: {e}")))?
            .add_source(
                Environment::with_prefix("EXTRACT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ExtractError::Configuration(format!("Could not build parameters: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| ExtractError::Configuration(format!("Invalid parameters: {e}")))
    }
}
