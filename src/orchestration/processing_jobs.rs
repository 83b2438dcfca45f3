//! # Request Processing Jobs
//!
//! The recurring jobs that carry the different treatments a request goes
//! through: matching freshly imported requests, running the next pipeline
//! task of ongoing requests, exporting finished requests and reminding the
//! operators about standby requests.
//!
//! Each tick only enqueues work: task executions run on their own spawned
//! tasks so a long plugin call never blocks the scheduling loop. A request
//! with a running task is tracked in a shared set so no two concurrent steps
//! ever mutate the same request.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tracing::{debug, error, warn};

use crate::email::{EmailSettings, NotificationSender};
use crate::error::Result;
use crate::matching::RuleEvaluator;
use crate::models::{HistoryStatus, Request, RequestStatus};
use crate::orchestration::scheduler::{RecurringJob, ScheduledJobHandle, TaskScheduler};
use crate::orchestration::task_runner::RequestTaskRunner;
use crate::persistence::ApplicationRepositories;
use crate::plugins::{ConnectorRegistry, TaskProcessorRegistry};
use crate::processors::{
    ExportRequestProcessor, RequestMatchingProcessor, StandbyRequestsReminderProcessor,
};

/// Manages the jobs that process the requests.
pub struct RequestsProcessingScheduler {
    scheduler: Arc<dyn TaskScheduler>,
    repositories: ApplicationRepositories,
    frequency: u32,
    matching_processor: Arc<RequestMatchingProcessor>,
    export_processor: Arc<ExportRequestProcessor>,
    reminder_processor: Arc<StandbyRequestsReminderProcessor>,
    task_runner: Arc<RequestTaskRunner>,
    requests_with_running_task: Arc<DashSet<i32>>,
    process_matching_job: Option<ScheduledJobHandle>,
    export_job: Option<ScheduledJobHandle>,
    task_execution_job: Option<ScheduledJobHandle>,
    reminder_job: Option<ScheduledJobHandle>,
}

impl RequestsProcessingScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scheduler: Arc<dyn TaskScheduler>,
        repositories: ApplicationRepositories,
        connector_registry: Arc<ConnectorRegistry>,
        task_registry: Arc<TaskProcessorRegistry>,
        email_settings: EmailSettings,
        sender: Arc<dyn NotificationSender>,
        evaluator: Arc<dyn RuleEvaluator>,
        language: &str,
        frequency: u32,
    ) -> Self {
        let matching_processor = Arc::new(RequestMatchingProcessor::new(
            repositories.clone(),
            email_settings.clone(),
            Arc::clone(&sender),
            evaluator,
        ));

        let export_processor = Arc::new(ExportRequestProcessor::new(
            repositories.clone(),
            connector_registry,
            email_settings.clone(),
            Arc::clone(&sender),
            language,
        ));

        let reminder_processor = Arc::new(StandbyRequestsReminderProcessor::new(
            repositories.clone(),
            email_settings.clone(),
            Arc::clone(&sender),
        ));

        let task_runner = Arc::new(RequestTaskRunner::new(
            repositories.clone(),
            task_registry,
            email_settings,
            sender,
            language,
        ));

        Self {
            scheduler,
            repositories,
            frequency,
            matching_processor,
            export_processor,
            reminder_processor,
            task_runner,
            requests_with_running_task: Arc::new(DashSet::new()),
            process_matching_job: None,
            export_job: None,
            task_execution_job: None,
            reminder_job: None,
        }
    }

    /// Start the different request processing jobs.
    pub fn schedule_jobs(&mut self) {
        debug!("Scheduling the requests processing jobs.");
        self.schedule_export_job();
        self.schedule_process_matching_job();
        self.schedule_task_execution_job();
        self.schedule_reminder_job();
    }

    /// Stop the recurrence of the different request processing jobs.
    /// Unscheduling a job that was never scheduled is a no-op.
    pub fn unschedule_jobs(&mut self) {
        debug!("Unscheduling the requests processing jobs.");

        for job in [
            self.export_job.take(),
            self.process_matching_job.take(),
            self.task_execution_job.take(),
            self.reminder_job.take(),
        ]
        .into_iter()
        .flatten()
        {
            job.cancel();
        }
    }

    fn delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.frequency))
    }

    fn schedule_process_matching_job(&mut self) {
        debug!("Scheduling the request process matching job.");
        let repositories = self.repositories.clone();
        let processor = Arc::clone(&self.matching_processor);

        let job: RecurringJob = Arc::new(move || {
            let repositories = repositories.clone();
            let processor = Arc::clone(&processor);
            Box::pin(async move {
                run_matching_batch(&repositories, &processor).await;
            })
        });

        self.process_matching_job = Some(self.scheduler.schedule_fixed_delay(job, self.delay()));
        debug!(
            frequency = self.frequency,
            "The request process matching job is scheduled."
        );
    }

    fn schedule_export_job(&mut self) {
        debug!("Scheduling the request export job.");
        let repositories = self.repositories.clone();
        let processor = Arc::clone(&self.export_processor);

        let job: RecurringJob = Arc::new(move || {
            let repositories = repositories.clone();
            let processor = Arc::clone(&processor);
            Box::pin(async move {
                run_export_batch(&repositories, &processor).await;
            })
        });

        self.export_job = Some(self.scheduler.schedule_fixed_delay(job, self.delay()));
        debug!(frequency = self.frequency, "The request export job is scheduled.");
    }

    fn schedule_task_execution_job(&mut self) {
        debug!("Scheduling the request task execution job.");
        let repositories = self.repositories.clone();
        let task_runner = Arc::clone(&self.task_runner);
        let running = Arc::clone(&self.requests_with_running_task);

        let job: RecurringJob = Arc::new(move || {
            let repositories = repositories.clone();
            let task_runner = Arc::clone(&task_runner);
            let running = Arc::clone(&running);
            Box::pin(async move {
                manage_task_processing(&repositories, &task_runner, &running).await;
            })
        });

        self.task_execution_job = Some(self.scheduler.schedule_fixed_delay(job, self.delay()));
        debug!(
            frequency = self.frequency,
            "The request task execution management job is scheduled."
        );
    }

    fn schedule_reminder_job(&mut self) {
        debug!("Scheduling the request notification job.");
        let repositories = self.repositories.clone();
        let processor = Arc::clone(&self.reminder_processor);

        let job: RecurringJob = Arc::new(move || {
            let repositories = repositories.clone();
            let processor = Arc::clone(&processor);
            Box::pin(async move {
                run_reminder_batch(&repositories, &processor).await;
            })
        });

        self.reminder_job = Some(self.scheduler.schedule_fixed_delay(job, self.delay()));
        debug!(
            frequency = self.frequency,
            "The request notification job is scheduled."
        );
    }
}

/// Match every freshly imported request with a process.
async fn run_matching_batch(
    repositories: &ApplicationRepositories,
    processor: &RequestMatchingProcessor,
) {
    let imported = match repositories
        .requests
        .find_by_status(RequestStatus::Imported)
        .await
    {
        Ok(imported) => imported,
        Err(repository_error) => {
            error!(error = %repository_error, "Could not fetch the imported requests.");
            return;
        }
    };

    for request in imported {
        let request_id = request.id;

        match processor.process(request).await {
            Ok(updated) => {
                if let Err(save_error) = repositories.requests.save(updated).await {
                    error!(request_id, error = %save_error, "Could not save the matched request.");
                }
            }
            Err(processing_error) => {
                error!(request_id, error = %processing_error, "Could not match the request.");
            }
        }
    }
}

/// Export every request whose pipeline is complete.
async fn run_export_batch(
    repositories: &ApplicationRepositories,
    processor: &ExportRequestProcessor,
) {
    let to_export = match repositories
        .requests
        .find_by_status(RequestStatus::ToExport)
        .await
    {
        Ok(to_export) => to_export,
        Err(repository_error) => {
            error!(error = %repository_error, "Could not fetch the requests to export.");
            return;
        }
    };

    for request in to_export {
        let request_id = request.id;

        match processor.process(request).await {
            Ok(updated) => {
                if let Err(save_error) = repositories.requests.save(updated).await {
                    error!(request_id, error = %save_error, "Could not save the exported request.");
                }
            }
            Err(processing_error) => {
                error!(request_id, error = %processing_error, "Could not export the request.");
            }
        }
    }
}

/// Send the due standby reminders.
async fn run_reminder_batch(
    repositories: &ApplicationRepositories,
    processor: &StandbyRequestsReminderProcessor,
) {
    let standby = match repositories
        .requests
        .find_by_status(RequestStatus::Standby)
        .await
    {
        Ok(standby) => standby,
        Err(repository_error) => {
            error!(error = %repository_error, "Could not fetch the standby requests.");
            return;
        }
    };

    for request in standby {
        let request_id = request.id;

        match processor.process(request).await {
            Ok(updated) => {
                if let Err(save_error) = repositories.requests.save(updated).await {
                    error!(request_id, error = %save_error, "Could not save the reminded request.");
                }
            }
            Err(processing_error) => {
                error!(request_id, error = %processing_error, "Could not process the standby request.");
            }
        }
    }
}

/// Start an asynchronous task execution for every ongoing request that does
/// not already have one running.
async fn manage_task_processing(
    repositories: &ApplicationRepositories,
    task_runner: &Arc<RequestTaskRunner>,
    running: &Arc<DashSet<i32>>,
) {
    let ongoing = match repositories
        .requests
        .find_by_status(RequestStatus::Ongoing)
        .await
    {
        Ok(ongoing) => ongoing,
        Err(repository_error) => {
            error!(error = %repository_error, "Could not fetch the ongoing requests.");
            return;
        }
    };

    debug!(count = ongoing.len(), "Found ongoing requests.");

    for request in ongoing {
        let request_id = request.id;

        if running.contains(&request_id) {
            debug!(
                request_id,
                "A task is already running for the request. Waiting for completion."
            );
            continue;
        }

        match check_ongoing_request_history(repositories, &request).await {
            Ok(RequestStatus::Ongoing) => {}
            Ok(inconsistent_status) => {
                warn!(
                    request_id,
                    status = %inconsistent_status,
                    "The status for the request (ONGOING) was inconsistent with its last history entry."
                );
                let mut request = request;
                request.status = inconsistent_status;
                if let Err(save_error) = repositories.requests.save(request).await {
                    error!(request_id, error = %save_error, "Could not save the inconsistent request.");
                }
                continue;
            }
            Err(history_error) => {
                error!(request_id, error = %history_error, "Could not check the request history.");
                continue;
            }
        }

        debug!(request_id, "Request can proceed to the next task.");
        running.insert(request_id);

        let task_runner = Arc::clone(task_runner);
        let running = Arc::clone(running);
        tokio::spawn(async move {
            task_runner.run(request).await;
            running.remove(&request_id);
            debug!(request_id, "Request removed from those with a running task.");
        });
    }
}

/// Verify that an ongoing request is in a state coherent with its history:
/// a last record still marked ongoing means the processing was interrupted.
async fn check_ongoing_request_history(
    repositories: &ApplicationRepositories,
    request: &Request,
) -> Result<RequestStatus> {
    let records = repositories
        .history
        .find_by_request_ordered(request.id)
        .await?;

    let Some(last_record) = records.last() else {
        return Ok(RequestStatus::Ongoing);
    };

    if last_record.status == HistoryStatus::Ongoing {
        warn!(
            request_id = request.id,
            "The processing of the request has been interrupted. The status has thus been set to ERROR."
        );
        let mut interrupted_record = last_record.clone();
        interrupted_record.set_to_error("The task processing was interrupted.", chrono::Utc::now());
        repositories.history.save(interrupted_record).await?;

        return Ok(RequestStatus::Error);
    }

    Ok(RequestStatus::Ongoing)
}
