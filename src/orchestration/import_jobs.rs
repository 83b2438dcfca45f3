//! # Connector Import Jobs
//!
//! Keeps one import job scheduled per active connector, each at the
//! frequency configured on that connector. A supervisory job running at the
//! orchestrator frequency reconciles the scheduled jobs with the connectors
//! currently stored: new connectors get a job, removed or deactivated
//! connectors lose theirs, and a changed import frequency reschedules the
//! job.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use crate::models::{Connector, Request, RequestStatus};
use crate::orchestration::scheduler::{RecurringJob, ScheduledJobHandle, TaskScheduler};
use crate::persistence::ApplicationRepositories;
use crate::plugins::ConnectorRegistry;

/// Keeps track of the import job scheduled for one connector.
struct JobSchedulingInfo {
    delay_seconds: u32,
    handle: ScheduledJobHandle,
}

/// Manages the background import jobs of the connector instances.
pub struct ImportJobsScheduler {
    scheduler: Arc<dyn TaskScheduler>,
    repositories: ApplicationRepositories,
    connector_registry: Arc<ConnectorRegistry>,
    language: String,
    frequency: u32,
    scheduled_jobs: Arc<DashMap<i32, JobSchedulingInfo>>,
    supervisor_job: Option<ScheduledJobHandle>,
}

impl ImportJobsScheduler {
    pub fn new(
        scheduler: Arc<dyn TaskScheduler>,
        repositories: ApplicationRepositories,
        connector_registry: Arc<ConnectorRegistry>,
        language: &str,
        frequency: u32,
    ) -> Self {
        Self {
            scheduler,
            repositories,
            connector_registry,
            language: language.to_string(),
            frequency,
            scheduled_jobs: Arc::new(DashMap::new()),
            supervisor_job: None,
        }
    }

    /// Start the job that keeps the per-connector import jobs in sync with
    /// the stored connectors.
    pub fn schedule_jobs(&mut self) {
        debug!("Scheduling the connector import jobs.");

        let scheduler = Arc::clone(&self.scheduler);
        let repositories = self.repositories.clone();
        let connector_registry = Arc::clone(&self.connector_registry);
        let language = self.language.clone();
        let scheduled_jobs = Arc::clone(&self.scheduled_jobs);

        let job: RecurringJob = Arc::new(move || {
            let scheduler = Arc::clone(&scheduler);
            let repositories = repositories.clone();
            let connector_registry = Arc::clone(&connector_registry);
            let language = language.clone();
            let scheduled_jobs = Arc::clone(&scheduled_jobs);
            Box::pin(async move {
                manage_import_jobs(
                    &scheduler,
                    &repositories,
                    &connector_registry,
                    &language,
                    &scheduled_jobs,
                )
                .await;
            })
        });

        self.supervisor_job = Some(
            self.scheduler
                .schedule_fixed_delay(job, Duration::from_secs(u64::from(self.frequency))),
        );
        info!(
            frequency = self.frequency,
            "The connector import jobs supervisor is scheduled."
        );
    }

    /// Stop the supervisor and every per-connector import job. Unscheduling
    /// jobs that were never scheduled is a no-op.
    pub fn unschedule_jobs(&mut self) {
        debug!("Unscheduling the connector import jobs.");

        if let Some(supervisor) = self.supervisor_job.take() {
            supervisor.cancel();
        }

        for entry in self.scheduled_jobs.iter() {
            entry.value().handle.cancel();
        }
        self.scheduled_jobs.clear();
    }
}

/// Reconcile the scheduled import jobs with the currently active connectors.
async fn manage_import_jobs(
    scheduler: &Arc<dyn TaskScheduler>,
    repositories: &ApplicationRepositories,
    connector_registry: &Arc<ConnectorRegistry>,
    language: &str,
    scheduled_jobs: &Arc<DashMap<i32, JobSchedulingInfo>>,
) {
    let connectors = match repositories.connectors.find_active().await {
        Ok(connectors) => connectors,
        Err(repository_error) => {
            error!(error = %repository_error, "Could not fetch the active connectors.");
            return;
        }
    };

    let active_ids: Vec<i32> = connectors.iter().map(|connector| connector.id).collect();

    for connector in connectors {
        let needs_scheduling = match scheduled_jobs.get(&connector.id) {
            Some(info) if info.delay_seconds == connector.import_frequency => false,
            Some(info) => {
                debug!(
                    connector_id = connector.id,
                    "The import frequency of the connector changed. Rescheduling its import job."
                );
                info.handle.cancel();
                true
            }
            None => true,
        };

        if needs_scheduling {
            schedule_connector_import_job(
                scheduler,
                repositories,
                connector_registry,
                language,
                scheduled_jobs,
                &connector,
            );
        }
    }

    // Connectors that vanished or were deactivated lose their import job.
    scheduled_jobs.retain(|connector_id, info| {
        if active_ids.contains(connector_id) {
            return true;
        }

        debug!(connector_id, "Cancelling the import job of an inactive connector.");
        info.handle.cancel();
        false
    });
}

fn schedule_connector_import_job(
    scheduler: &Arc<dyn TaskScheduler>,
    repositories: &ApplicationRepositories,
    connector_registry: &Arc<ConnectorRegistry>,
    language: &str,
    scheduled_jobs: &Arc<DashMap<i32, JobSchedulingInfo>>,
    connector: &Connector,
) {
    let connector_id = connector.id;
    let repositories = repositories.clone();
    let connector_registry = Arc::clone(connector_registry);
    let language = language.to_string();

    let job: RecurringJob = Arc::new(move || {
        let repositories = repositories.clone();
        let connector_registry = Arc::clone(&connector_registry);
        let language = language.clone();
        Box::pin(async move {
            run_connector_import(&repositories, &connector_registry, &language, connector_id)
                .await;
        })
    });

    let handle = scheduler
        .schedule_fixed_delay(job, Duration::from_secs(u64::from(connector.import_frequency)));

    debug!(
        connector_id,
        frequency = connector.import_frequency,
        "Import job scheduled for the connector."
    );

    scheduled_jobs.insert(
        connector_id,
        JobSchedulingInfo {
            delay_seconds: connector.import_frequency,
            handle,
        },
    );
}

/// Run one import for one connector: fetch the waiting orders through the
/// connector plugin and store them as freshly imported requests.
async fn run_connector_import(
    repositories: &ApplicationRepositories,
    connector_registry: &Arc<ConnectorRegistry>,
    language: &str,
    connector_id: i32,
) {
    let connector = match repositories.connectors.find_by_id(connector_id).await {
        Ok(Some(connector)) if connector.active => connector,
        Ok(_) => {
            debug!(connector_id, "The connector is gone or inactive. Skipping its import run.");
            return;
        }
        Err(repository_error) => {
            error!(connector_id, error = %repository_error, "Could not fetch the connector.");
            return;
        }
    };

    let Some(plugin) = connector_registry.get(&connector.code) else {
        warn!(
            connector_id,
            code = %connector.code,
            "The connector plugin is not available anymore. Cannot import orders."
        );
        return;
    };

    let instance = plugin.new_instance(language, &connector.parameters_values);

    let result = match tokio::task::spawn_blocking(move || instance.import_orders()).await {
        Ok(result) => result,
        Err(join_error) => {
            error!(connector_id, error = %join_error, "The connector plugin aborted abnormally.");
            return;
        }
    };

    if !result.success {
        warn!(
            connector_id,
            error = result.error_message.as_deref().unwrap_or(""),
            "The import run for the connector failed."
        );
        return;
    }

    let orders_number = result.orders.len();

    for order in result.orders {
        let mut request = Request::new_imported(0, connector_id, &order.order_label, &order.product_label);
        request.client = order.client;
        request.organism = order.organism;
        request.perimeter = order.perimeter;
        request.parameters = order.parameters;
        request.status = RequestStatus::Imported;

        if let Err(save_error) = repositories.requests.save(request).await {
            error!(connector_id, error = %save_error, "Could not save an imported request.");
        }
    }

    if orders_number > 0 {
        info!(connector_id, orders = orders_number, "Imported orders from the connector.");
    }
}
