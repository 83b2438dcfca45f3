//! Orchestrator state machine tests: initialization gating, scheduling
//! idempotence, no-op settings updates and the time-window supervisory job.

mod common;

use std::sync::Arc;

use extract_core::error::ExtractError;
use extract_core::orchestration::{
    Orchestrator, OrchestratorComponents, OrchestratorSettings, SchedulerMode, WorkingState,
};
use extract_core::config::SystemParameters;
use extract_core::persistence::memory::in_memory_repositories;
use extract_core::plugins::{ConnectorRegistry, TaskProcessorRegistry};
use extract_core::time_range::{TimeRange, TimeRangeCollection};

use common::{email_settings, ClientEqualsEvaluator, ManualScheduler, RecordingSender};

/// The jobs one full monitoring start schedules: the import supervisor plus
/// the four request-processing jobs.
const MONITORING_JOB_COUNT: usize = 5;

struct Fixture {
    orchestrator: Arc<Orchestrator>,
    scheduler: Arc<ManualScheduler>,
    _base: tempfile::TempDir,
}

fn initialized_orchestrator(settings: OrchestratorSettings) -> Fixture {
    let base = tempfile::tempdir().unwrap();
    let scheduler = ManualScheduler::new();
    // No connectors or requests stored: the scheduling tests only count
    // jobs, they never process data.
    let parameters = SystemParameters {
        base_path: base.path().to_string_lossy().to_string(),
        ..SystemParameters::default()
    };
    let repositories = in_memory_repositories(&parameters);

    let orchestrator = Orchestrator::new();
    let initialized = orchestrator
        .initialize_components(
            OrchestratorComponents {
                scheduler: Arc::clone(&scheduler) as Arc<dyn extract_core::orchestration::scheduler::TaskScheduler>,
                repositories,
                connector_registry: Arc::new(ConnectorRegistry::new()),
                task_registry: Arc::new(TaskProcessorRegistry::new()),
                email_settings: email_settings(),
                notification_sender: Arc::new(RecordingSender::default()),
                rule_evaluator: Arc::new(ClientEqualsEvaluator),
                application_language: "en".to_string(),
            },
            settings,
        )
        .unwrap();
    assert!(initialized);

    Fixture {
        orchestrator,
        scheduler,
        _base: base,
    }
}

fn always_on_settings() -> OrchestratorSettings {
    OrchestratorSettings::new(20, SchedulerMode::AlwaysOn, TimeRangeCollection::default())
}

fn time_windows_settings(ranges: TimeRangeCollection) -> OrchestratorSettings {
    OrchestratorSettings::new(20, SchedulerMode::TimeWindows, ranges)
}

/// A window covering the whole week, so "now" is always inside.
fn full_week_ranges() -> TimeRangeCollection {
    TimeRangeCollection::new(vec![TimeRange::new(1, 7, "00:00", "24:00")])
}

#[tokio::test]
async fn test_operations_before_initialization_fail() {
    let orchestrator = Orchestrator::new();

    assert!(matches!(
        orchestrator.schedule_monitoring(),
        Err(ExtractError::InvalidState(_))
    ));
    assert!(matches!(
        orchestrator.reschedule_monitoring(),
        Err(ExtractError::InvalidState(_))
    ));
    assert!(matches!(
        orchestrator.working_state(),
        Err(ExtractError::InvalidState(_))
    ));

    // Unscheduling is safe at any time.
    orchestrator.unschedule_monitoring(true);
}

#[tokio::test]
async fn test_schedule_monitoring_is_idempotent() {
    let fixture = initialized_orchestrator(always_on_settings());

    fixture.orchestrator.schedule_monitoring().unwrap();
    assert_eq!(fixture.scheduler.active_job_count(), MONITORING_JOB_COUNT);

    // A second call schedules nothing more: no duplicate timers.
    fixture.orchestrator.schedule_monitoring().unwrap();
    assert_eq!(fixture.scheduler.total_scheduled(), MONITORING_JOB_COUNT);
    assert_eq!(fixture.scheduler.active_job_count(), MONITORING_JOB_COUNT);
}

#[tokio::test]
async fn test_unschedule_when_nothing_is_scheduled_is_a_noop() {
    let fixture = initialized_orchestrator(always_on_settings());

    fixture.orchestrator.unschedule_monitoring(true);
    assert_eq!(fixture.scheduler.total_scheduled(), 0);
}

#[tokio::test]
async fn test_unschedule_cancels_all_monitoring_jobs() {
    let fixture = initialized_orchestrator(always_on_settings());

    fixture.orchestrator.schedule_monitoring().unwrap();
    fixture.orchestrator.unschedule_monitoring(true);

    assert_eq!(fixture.scheduler.active_job_count(), 0);
}

#[tokio::test]
async fn test_disabled_mode_schedules_nothing() {
    let fixture = initialized_orchestrator(OrchestratorSettings::new(
        20,
        SchedulerMode::Disabled,
        TimeRangeCollection::default(),
    ));

    fixture.orchestrator.schedule_monitoring_by_working_state().unwrap();

    assert_eq!(fixture.scheduler.total_scheduled(), 0);
    assert_eq!(fixture.orchestrator.working_state().unwrap(), WorkingState::Stopped);
}

#[tokio::test]
async fn test_time_windows_mode_schedules_only_the_supervisor() {
    let fixture = initialized_orchestrator(time_windows_settings(TimeRangeCollection::default()));

    fixture.orchestrator.schedule_monitoring_by_working_state().unwrap();

    assert_eq!(fixture.scheduler.total_scheduled(), 1);
    assert_eq!(
        fixture.orchestrator.working_state().unwrap(),
        WorkingState::ScheduledStop
    );
}

#[tokio::test]
async fn test_supervisor_starts_monitoring_inside_the_window() {
    let fixture = initialized_orchestrator(time_windows_settings(full_week_ranges()));

    fixture.orchestrator.schedule_monitoring_by_working_state().unwrap();
    assert_eq!(fixture.scheduler.active_job_count(), 1);

    // The supervisory tick sees "now" inside the window and starts the
    // monitoring jobs.
    fixture.scheduler.tick().await;
    assert_eq!(
        fixture.scheduler.active_job_count(),
        MONITORING_JOB_COUNT + 1
    );
    assert_eq!(fixture.orchestrator.working_state().unwrap(), WorkingState::Running);

    // A second tick inside the window changes nothing.
    fixture.scheduler.tick().await;
    assert_eq!(
        fixture.scheduler.total_scheduled(),
        MONITORING_JOB_COUNT + 1
    );
}

#[tokio::test]
async fn test_supervisor_stops_monitoring_outside_the_window_but_survives() {
    let fixture = initialized_orchestrator(time_windows_settings(full_week_ranges()));

    fixture.orchestrator.schedule_monitoring_by_working_state().unwrap();
    fixture.scheduler.tick().await;
    assert_eq!(fixture.orchestrator.working_state().unwrap(), WorkingState::Running);

    // Shrink the windows to an empty collection: "now" is no longer inside
    // any window. No rescheduling: the running supervisor picks the change
    // up on its next tick.
    fixture
        .orchestrator
        .set_orchestrator_settings(
            time_windows_settings(TimeRangeCollection::default()),
            false,
        )
        .unwrap();

    fixture.scheduler.tick().await;

    // The monitoring jobs are cancelled; the supervisory job itself stays.
    assert_eq!(fixture.scheduler.active_job_count(), 1);
    assert_eq!(
        fixture.orchestrator.working_state().unwrap(),
        WorkingState::ScheduledStop
    );
}

#[tokio::test]
async fn test_equal_settings_do_not_reschedule() {
    let fixture = initialized_orchestrator(always_on_settings());

    fixture.orchestrator.schedule_monitoring().unwrap();
    let scheduled_before = fixture.scheduler.total_scheduled();

    // Structurally equal settings suppress the rescheduling even when it is
    // requested.
    fixture
        .orchestrator
        .set_orchestrator_settings(always_on_settings(), true)
        .unwrap();

    assert_eq!(fixture.scheduler.total_scheduled(), scheduled_before);
    assert_eq!(fixture.scheduler.active_job_count(), MONITORING_JOB_COUNT);
}

#[tokio::test]
async fn test_different_settings_reschedule_when_requested() {
    let fixture = initialized_orchestrator(always_on_settings());

    fixture.orchestrator.schedule_monitoring().unwrap();

    let faster = OrchestratorSettings::new(5, SchedulerMode::AlwaysOn, TimeRangeCollection::default());
    fixture
        .orchestrator
        .set_orchestrator_settings(faster, true)
        .unwrap();

    // The old jobs were cancelled and a fresh set was scheduled.
    assert_eq!(fixture.scheduler.total_scheduled(), MONITORING_JOB_COUNT * 2);
    assert_eq!(fixture.scheduler.active_job_count(), MONITORING_JOB_COUNT);
}

#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let fixture = initialized_orchestrator(always_on_settings());

    let invalid = OrchestratorSettings::new(0, SchedulerMode::AlwaysOn, TimeRangeCollection::default());
    assert!(matches!(
        fixture.orchestrator.set_orchestrator_settings(invalid, false),
        Err(ExtractError::Validation(_))
    ));

    let broken_range = OrchestratorSettings::new(
        20,
        SchedulerMode::TimeWindows,
        TimeRangeCollection::new(vec![TimeRange::new(1, 1, "18:00", "08:00")]),
    );
    assert!(matches!(
        fixture.orchestrator.set_orchestrator_settings(broken_range, false),
        Err(ExtractError::Validation(_))
    ));
}

#[tokio::test]
async fn test_settings_reload_from_repository() {
    let fixture = initialized_orchestrator(always_on_settings());

    // The seeded parameters repository carries mode ON and frequency 20, so
    // reloading is a structural no-op.
    fixture
        .orchestrator
        .update_settings_from_repository(true)
        .await
        .unwrap();

    assert_eq!(fixture.scheduler.total_scheduled(), 0);
    assert_eq!(
        fixture.orchestrator.settings().unwrap(),
        always_on_settings()
    );
}
