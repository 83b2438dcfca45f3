//! End-to-end lifecycle tests driving the scheduling jobs over the
//! in-memory repositories: import, matching, task execution and export.

mod common;

use std::sync::Arc;

use extract_core::models::{HistoryStatus, Request, RequestStatus, Task};
use extract_core::orchestration::{ImportJobsScheduler, RequestsProcessingScheduler};
use extract_core::plugins::{
    ConnectorRegistry, ExportResult, ImportedOrder, TaskProcessorRegistry, TaskResult,
};

use common::{
    email_settings, seeded_repositories, wait_for_status, ClientEqualsEvaluator, ManualScheduler,
    RecordingSender, ScriptedConnector, ScriptedTask,
};

#[tokio::test]
async fn test_full_lifecycle_from_import_to_finished() {
    let base = tempfile::tempdir().unwrap();
    let scheduler = ManualScheduler::new();

    let tasks = vec![Task::new(1, 20, 1, "Scripted step", "scripted-task")];
    let repositories = seeded_repositories(base.path(), &tasks);

    let connector_registry = Arc::new(ConnectorRegistry::new());
    connector_registry.register(Arc::new(ScriptedConnector::exporting(
        ExportResult::success("Exported"),
    )));

    let task_registry = Arc::new(TaskProcessorRegistry::new());
    task_registry.register(Arc::new(ScriptedTask {
        code: "scripted-task".to_string(),
        result: TaskResult::success("done"),
    }));

    let sender = Arc::new(RecordingSender::default());

    let mut processing = RequestsProcessingScheduler::new(
        Arc::clone(&scheduler) as Arc<dyn extract_core::orchestration::scheduler::TaskScheduler>,
        repositories.clone(),
        connector_registry,
        task_registry,
        email_settings(),
        Arc::clone(&sender) as Arc<dyn extract_core::email::NotificationSender>,
        Arc::new(ClientEqualsEvaluator),
        "en",
        20,
    );
    processing.schedule_jobs();

    // A freshly imported request routed to the process by its client.
    let mut request = Request::new_imported(0, 1, "order 1", "product A");
    request.client = "acme".to_string();
    let request = repositories.requests.save(request).await.unwrap();
    let request_id = request.id;

    // Matching tick: the request gets its process and workspace. The task
    // execution job shares the tick, so the first task may already be
    // running in the background.
    scheduler.tick().await;
    let matched = wait_for_status(&repositories, request_id, RequestStatus::Ongoing).await;
    assert_eq!(matched.process_id, Some(20));
    assert!(base.path().join(matched.folder_in.as_deref().unwrap()).is_dir());

    // Keep ticking: the pipeline task runs and advances the cursor, the
    // exhausted pipeline marks the request for export, and the export job
    // pushes the result. Task executions are spawned asynchronously, so the
    // intermediate states are not reliably observable from here; the
    // history records below pin them down.
    let mut finished = None;
    for _ in 0..100 {
        scheduler.tick().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let stored = repositories
            .requests
            .find_by_id(request_id)
            .await
            .unwrap()
            .unwrap();
        if stored.status == RequestStatus::Finished {
            finished = Some(stored);
            break;
        }
    }
    let finished = finished.expect("the request never finished");
    assert!(finished.end_date.is_some());
    assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);

    // Audit trail: the task step and the export step.
    let records = repositories
        .history
        .find_by_request_ordered(request_id)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].step, 1);
    assert_eq!(records[0].status, HistoryStatus::Finished);
    assert_eq!(records[1].step, 2);
    assert_eq!(records[1].status, HistoryStatus::Finished);
    assert_eq!(records[1].task_label, "Export");

    // The happy path sends no notifications.
    assert!(sender.sent.lock().is_empty());

    processing.unschedule_jobs();
    assert_eq!(scheduler.active_job_count(), 0);
}

#[tokio::test]
async fn test_unmatched_request_is_flagged_and_reported_once() {
    let base = tempfile::tempdir().unwrap();
    let scheduler = ManualScheduler::new();
    let repositories = seeded_repositories(base.path(), &[]);

    let sender = Arc::new(RecordingSender::default());

    let mut processing = RequestsProcessingScheduler::new(
        Arc::clone(&scheduler) as Arc<dyn extract_core::orchestration::scheduler::TaskScheduler>,
        repositories.clone(),
        Arc::new(ConnectorRegistry::new()),
        Arc::new(TaskProcessorRegistry::new()),
        email_settings(),
        Arc::clone(&sender) as Arc<dyn extract_core::email::NotificationSender>,
        Arc::new(ClientEqualsEvaluator),
        "en",
        20,
    );
    processing.schedule_jobs();

    // No rule matches this client.
    let mut request = Request::new_imported(0, 1, "order 9", "product Z");
    request.client = "initech".to_string();
    let request = repositories.requests.save(request).await.unwrap();

    scheduler.tick().await;
    let unmatched = wait_for_status(&repositories, request.id, RequestStatus::Unmatched).await;
    assert!(unmatched.process_id.is_none());
    assert!(unmatched.folder_in.is_none());
    assert_eq!(sender.sent.lock().len(), 1);

    // The next tick does not re-notify: the request is no longer imported.
    scheduler.tick().await;
    assert_eq!(sender.sent.lock().len(), 1);

    processing.unschedule_jobs();
}

#[tokio::test]
async fn test_import_jobs_create_imported_requests() {
    let base = tempfile::tempdir().unwrap();
    let scheduler = ManualScheduler::new();
    let repositories = seeded_repositories(base.path(), &[]);

    let connector_registry = Arc::new(ConnectorRegistry::new());
    connector_registry.register(Arc::new(ScriptedConnector::importing(vec![ImportedOrder {
        order_label: "order 42".to_string(),
        product_label: "product A".to_string(),
        client: "acme".to_string(),
        organism: None,
        perimeter: Some("POLYGON((0 0,1 0,1 1,0 1,0 0))".to_string()),
        parameters: Some("{\"FORMAT\":\"SHP\"}".to_string()),
    }])));

    let mut imports = ImportJobsScheduler::new(
        Arc::clone(&scheduler) as Arc<dyn extract_core::orchestration::scheduler::TaskScheduler>,
        repositories.clone(),
        connector_registry,
        "en",
        20,
    );
    imports.schedule_jobs();
    assert_eq!(scheduler.active_job_count(), 1);

    // First tick: the supervisor discovers the connector and schedules its
    // import job.
    scheduler.tick().await;
    assert_eq!(scheduler.active_job_count(), 2);

    // Second tick: the import job runs and stores the fetched order.
    scheduler.tick().await;

    let imported = repositories
        .requests
        .find_by_status(RequestStatus::Imported)
        .await
        .unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].order_label, "order 42");
    assert_eq!(imported[0].client, "acme");
    assert_eq!(imported[0].connector_id, 1);

    imports.unschedule_jobs();
    assert_eq!(scheduler.active_job_count(), 0);
}
