//! # Orchestrator
//!
//! The long-lived controller that decides whether and when the background
//! monitoring runs. It owns the two monitoring sub-schedulers (connector
//! imports and request processing), the supervisory time-window job that
//! toggles them in `TimeWindows` mode, and the scheduling flags guarding
//! idempotent start/stop.
//!
//! One instance is constructed at process startup and injected wherever
//! needed; every mutable field lives behind a single mutual-exclusion lock
//! because the supervisory job's timer task and administrative calls may
//! race on the scheduling flags.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::email::{EmailSettings, NotificationSender};
use crate::error::{ExtractError, Result};
use crate::matching::RuleEvaluator;
use crate::orchestration::import_jobs::ImportJobsScheduler;
use crate::orchestration::processing_jobs::RequestsProcessingScheduler;
use crate::orchestration::scheduler::{RecurringJob, ScheduledJobHandle, TaskScheduler};
use crate::orchestration::settings::{OrchestratorSettings, SchedulerMode};
use crate::persistence::ApplicationRepositories;
use crate::plugins::{ConnectorRegistry, TaskProcessorRegistry};

/// The scheduling state the orchestrator is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingState {
    Running,
    ScheduledStop,
    Stopped,
}

/// The collaborators the orchestrator needs before it can schedule anything.
#[derive(Clone)]
pub struct OrchestratorComponents {
    pub scheduler: Arc<dyn TaskScheduler>,
    pub repositories: ApplicationRepositories,
    pub connector_registry: Arc<ConnectorRegistry>,
    pub task_registry: Arc<TaskProcessorRegistry>,
    pub email_settings: EmailSettings,
    pub notification_sender: Arc<dyn NotificationSender>,
    pub rule_evaluator: Arc<dyn RuleEvaluator>,
    /// Locale code of the language used to display messages.
    pub application_language: String,
}

#[derive(Default)]
struct OrchestratorState {
    components: Option<OrchestratorComponents>,
    settings: Option<OrchestratorSettings>,
    connectors_monitoring_scheduled: bool,
    requests_monitoring_scheduled: bool,
    monitoring_scheduled: bool,
    imports_scheduler: Option<ImportJobsScheduler>,
    requests_scheduler: Option<RequestsProcessingScheduler>,
    time_range_monitoring_job: Option<ScheduledJobHandle>,
}

/// Manages the scheduling of all the background tasks of the application.
pub struct Orchestrator {
    /// Handle on ourselves for the supervisory job, which must not keep the
    /// orchestrator alive on its own.
    self_weak: Weak<Orchestrator>,
    state: Mutex<OrchestratorState>,
}

impl Orchestrator {
    const UNINITIALIZED: &'static str =
        "The orchestrator components are not correctly initialized.";

    /// Create a new orchestrator. This should happen only once in the
    /// application lifetime.
    pub fn new() -> Arc<Self> {
        info!("New instance of the orchestrator created.");
        Arc::new_cyclic(|self_weak| Self {
            self_weak: self_weak.clone(),
            state: Mutex::new(OrchestratorState::default()),
        })
    }

    /// Supply the collaborators and the initial settings. No (re)scheduling
    /// is done. Returns whether the orchestrator is now fully initialized.
    pub fn initialize_components(
        &self,
        components: OrchestratorComponents,
        settings: OrchestratorSettings,
    ) -> Result<bool> {
        debug!("Initializing the orchestrator components.");

        if components.application_language.trim().is_empty() {
            return Err(ExtractError::Configuration(
                "The application language code cannot be blank.".to_string(),
            ));
        }

        {
            let mut state = self.state.lock();
            state.components = Some(components);
        }
        self.set_orchestrator_settings(settings, false)?;

        Ok(self.is_initialized())
    }

    /// Whether all the collaborators required to schedule jobs are supplied.
    pub fn is_initialized(&self) -> bool {
        let state = self.state.lock();
        state.components.is_some() && state.settings.is_some()
    }

    /// The scheduling state the orchestrator is currently in.
    pub fn working_state(&self) -> Result<WorkingState> {
        let state = self.state.lock();
        let settings = state
            .settings
            .as_ref()
            .ok_or_else(|| ExtractError::InvalidState(Self::UNINITIALIZED.to_string()))?;

        Ok(match settings.mode {
            SchedulerMode::Disabled => WorkingState::Stopped,
            SchedulerMode::AlwaysOn => WorkingState::Running,
            SchedulerMode::TimeWindows => {
                if state.monitoring_scheduled {
                    WorkingState::Running
                } else {
                    WorkingState::ScheduledStop
                }
            }
        })
    }

    /// The currently active settings.
    pub fn settings(&self) -> Option<OrchestratorSettings> {
        self.state.lock().settings.clone()
    }

    /// Apply new settings. Rescheduling only happens when the new value is
    /// structurally different from the active one, preventing redundant
    /// cancel/restart churn.
    pub fn set_orchestrator_settings(
        &self,
        new_settings: OrchestratorSettings,
        reschedule_jobs: bool,
    ) -> Result<()> {
        if !new_settings.is_valid() {
            return Err(ExtractError::Validation(
                "The given orchestrator settings are invalid.".to_string(),
            ));
        }

        let mut state = self.state.lock();

        if state.settings.as_ref() == Some(&new_settings) {
            debug!("The orchestrator settings are unchanged.");
            return Ok(());
        }

        info!("The orchestrator settings have been updated.");
        state.settings = Some(new_settings);

        if reschedule_jobs {
            self.reschedule_monitoring_locked(&mut state)?;
        }

        Ok(())
    }

    /// Redefine the settings with the values persisted in the parameters
    /// repository.
    pub async fn update_settings_from_repository(&self, reschedule_jobs: bool) -> Result<()> {
        debug!("Updating the orchestrator settings with the values in the data source.");

        let parameters = {
            let state = self.state.lock();
            let components = state
                .components
                .as_ref()
                .ok_or_else(|| ExtractError::InvalidState(Self::UNINITIALIZED.to_string()))?;
            Arc::clone(&components.repositories.parameters)
        };

        let settings = OrchestratorSettings::from_repository(parameters.as_ref()).await?;
        self.set_orchestrator_settings(settings, reschedule_jobs)
    }

    /// Create the application background jobs if they are not already
    /// scheduled. Calling this again while scheduled is a no-op.
    pub fn schedule_monitoring(&self) -> Result<()> {
        debug!("Scheduling the monitoring tasks if they are not already.");
        let mut state = self.state.lock();
        self.schedule_monitoring_locked(&mut state)
    }

    /// Prevent the ulterior execution of the background jobs. Safe to call
    /// even if nothing is scheduled.
    pub fn unschedule_monitoring(&self, include_time_range_monitoring: bool) {
        let mut state = self.state.lock();
        Self::unschedule_monitoring_locked(&mut state, include_time_range_monitoring);
    }

    /// Stop all background jobs and recreate them from the current mode.
    pub fn reschedule_monitoring(&self) -> Result<()> {
        debug!("Rescheduling the monitoring jobs.");
        let mut state = self.state.lock();
        self.reschedule_monitoring_locked(&mut state)
    }

    /// Derive the scheduling from the current mode: nothing when disabled,
    /// only the supervisory time-window job in time-windows mode, the full
    /// monitoring otherwise.
    pub fn schedule_monitoring_by_working_state(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.schedule_monitoring_by_working_state_locked(&mut state)
    }

    fn ensure_initialized_locked(state: &OrchestratorState) -> Result<()> {
        if state.components.is_none() || state.settings.is_none() {
            return Err(ExtractError::InvalidState(Self::UNINITIALIZED.to_string()));
        }

        Ok(())
    }

    fn schedule_monitoring_locked(&self, state: &mut OrchestratorState) -> Result<()> {
        Self::ensure_initialized_locked(state)?;

        Self::schedule_connectors_monitoring_locked(state);
        Self::schedule_requests_monitoring_locked(state);
        state.monitoring_scheduled = true;

        Ok(())
    }

    fn unschedule_monitoring_locked(
        state: &mut OrchestratorState,
        include_time_range_monitoring: bool,
    ) {
        debug!("Unscheduling the monitoring jobs.");

        if include_time_range_monitoring {
            Self::unschedule_time_range_monitoring_locked(state);
        }

        Self::unschedule_connectors_monitoring_locked(state);
        Self::unschedule_requests_monitoring_locked(state);
        info!("The monitoring jobs have been unscheduled.");
        state.monitoring_scheduled = false;
    }

    fn reschedule_monitoring_locked(&self, state: &mut OrchestratorState) -> Result<()> {
        Self::ensure_initialized_locked(state)?;

        Self::unschedule_monitoring_locked(state, true);
        self.schedule_monitoring_by_working_state_locked(state)
    }

    fn schedule_monitoring_by_working_state_locked(
        &self,
        state: &mut OrchestratorState,
    ) -> Result<()> {
        Self::ensure_initialized_locked(state)?;

        let mode = state
            .settings
            .as_ref()
            .map(|settings| settings.mode)
            .unwrap_or(SchedulerMode::Disabled);

        match mode {
            SchedulerMode::Disabled => Ok(()),
            SchedulerMode::TimeWindows => {
                self.schedule_time_range_monitoring_locked(state);
                Ok(())
            }
            SchedulerMode::AlwaysOn => self.schedule_monitoring_locked(state),
        }
    }

    /// Start the supervisory job that toggles monitoring on and off as the
    /// current time enters and leaves the configured windows.
    fn schedule_time_range_monitoring_locked(&self, state: &mut OrchestratorState) {
        let Some((components, settings)) = state.components.as_ref().zip(state.settings.as_ref())
        else {
            return;
        };

        let weak_orchestrator = self.self_weak.clone();
        let job: RecurringJob = Arc::new(move || {
            let weak_orchestrator = weak_orchestrator.clone();
            Box::pin(async move {
                if let Some(orchestrator) = weak_orchestrator.upgrade() {
                    orchestrator.manage_monitoring_by_time_range();
                }
            })
        });

        let frequency = settings.frequency;
        let handle = components
            .scheduler
            .schedule_fixed_delay(job, Duration::from_secs(u64::from(frequency)));
        info!(frequency, "Time range monitoring task configured.");
        state.time_range_monitoring_job = Some(handle);
    }

    /// One supervisory tick: start monitoring when inside a window and not
    /// yet active, stop it (keeping the supervisory job) when outside.
    fn manage_monitoring_by_time_range(&self) {
        debug!("Managing the orchestrator scheduling based on working hours.");

        let mut state = self.state.lock();

        let Some(settings) = state.settings.as_ref() else {
            warn!("The time range supervisory task ran without settings.");
            return;
        };

        if settings.mode != SchedulerMode::TimeWindows {
            warn!("The time range supervisory task should only run in time windows mode.");
            return;
        }

        if settings.is_now_in_ranges() {
            debug!("We are in the working hours.");

            if state.monitoring_scheduled {
                debug!("The scheduling is already active, so nothing done.");
                return;
            }

            if let Err(scheduling_error) = self.schedule_monitoring_locked(&mut state) {
                warn!(error = %scheduling_error, "Could not start the monitoring from the supervisory task.");
            }
            return;
        }

        debug!("We are NOT in the working hours.");

        if !state.monitoring_scheduled {
            debug!("The scheduling is already disabled, so nothing done.");
            return;
        }

        Self::unschedule_monitoring_locked(&mut state, false);
    }

    fn unschedule_time_range_monitoring_locked(state: &mut OrchestratorState) {
        debug!("Unscheduling the time ranges monitoring task.");

        let Some(job) = state.time_range_monitoring_job.take() else {
            debug!("The time ranges monitoring task is not scheduled, so nothing done.");
            return;
        };

        job.cancel();
        debug!("The time ranges monitoring task has been unscheduled.");
    }

    /// Instantiate and start the background jobs related to the connectors.
    fn schedule_connectors_monitoring_locked(state: &mut OrchestratorState) {
        debug!("Attempting to configure the connectors monitoring task.");

        if state.connectors_monitoring_scheduled {
            debug!("The connectors monitoring tasks are already scheduled.");
            return;
        }

        let Some((components, settings)) = state.components.as_ref().zip(state.settings.as_ref())
        else {
            return;
        };

        let mut imports_scheduler = ImportJobsScheduler::new(
            Arc::clone(&components.scheduler),
            components.repositories.clone(),
            Arc::clone(&components.connector_registry),
            &components.application_language,
            settings.frequency,
        );
        imports_scheduler.schedule_jobs();

        state.imports_scheduler = Some(imports_scheduler);
        state.connectors_monitoring_scheduled = true;
    }

    /// Stop the recurrence of the background jobs related to the connectors.
    fn unschedule_connectors_monitoring_locked(state: &mut OrchestratorState) {
        debug!("Unscheduling the connectors monitoring tasks.");

        if !state.connectors_monitoring_scheduled {
            debug!("The connectors monitoring tasks are not scheduled, so nothing done.");
            return;
        }

        if let Some(imports_scheduler) = state.imports_scheduler.as_mut() {
            imports_scheduler.unschedule_jobs();
        }

        state.connectors_monitoring_scheduled = false;
        debug!("The connectors monitoring tasks have been unscheduled.");
    }

    /// Instantiate and start the background jobs related to the requests.
    fn schedule_requests_monitoring_locked(state: &mut OrchestratorState) {
        debug!("Attempting to configure the requests monitoring tasks.");

        if state.requests_monitoring_scheduled {
            debug!("The requests monitoring tasks are already scheduled.");
            return;
        }

        let Some((components, settings)) = state.components.as_ref().zip(state.settings.as_ref())
        else {
            return;
        };

        let mut requests_scheduler = RequestsProcessingScheduler::new(
            Arc::clone(&components.scheduler),
            components.repositories.clone(),
            Arc::clone(&components.connector_registry),
            Arc::clone(&components.task_registry),
            components.email_settings.clone(),
            Arc::clone(&components.notification_sender),
            Arc::clone(&components.rule_evaluator),
            &components.application_language,
            settings.frequency,
        );
        requests_scheduler.schedule_jobs();

        state.requests_scheduler = Some(requests_scheduler);
        state.requests_monitoring_scheduled = true;
    }

    /// Stop the recurrence of the background jobs related to the requests.
    fn unschedule_requests_monitoring_locked(state: &mut OrchestratorState) {
        debug!("Unscheduling the requests monitoring tasks.");

        if !state.requests_monitoring_scheduled {
            debug!("The requests monitoring tasks are not scheduled, so nothing done.");
            return;
        }

        if let Some(requests_scheduler) = state.requests_scheduler.as_mut() {
            requests_scheduler.unschedule_jobs();
        }

        state.requests_monitoring_scheduled = false;
        debug!("The requests monitoring tasks have been unscheduled.");
    }
}
