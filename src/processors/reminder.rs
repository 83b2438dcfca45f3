use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::email::{notify_users, EmailSettings, Notification, NotificationSender, RequestSummary};
use crate::error::Result;
use crate::models::{Request, User};
use crate::persistence::ApplicationRepositories;

/// Periodically re-notifies the operators about requests stuck awaiting
/// manual validation beyond the configured delay.
///
/// A send failure leaves `last_reminder` unchanged, so the reminder is
/// retried on the next scheduling pass.
pub struct StandbyRequestsReminderProcessor {
    repositories: ApplicationRepositories,
    email_settings: EmailSettings,
    sender: Arc<dyn NotificationSender>,
}

impl StandbyRequestsReminderProcessor {
    pub fn new(
        repositories: ApplicationRepositories,
        email_settings: EmailSettings,
        sender: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            repositories,
            email_settings,
            sender,
        }
    }

    /// Remind the supervising users about a standby request if its last
    /// reminder is older than the configured delay.
    pub async fn process(&self, mut request: Request) -> Result<Request> {
        let days_before_reminder = self.repositories.parameters.standby_reminder_days().await?;

        if days_before_reminder == 0 {
            debug!("Request standby notifications are disabled. Ignoring.");
            return Ok(request);
        }

        let now = Utc::now();
        let limit = now - Duration::days(i64::from(days_before_reminder));

        let reminder_due = match request.last_reminder {
            None => true,
            Some(last_reminder) => last_reminder < limit,
        };

        if !reminder_due {
            return Ok(request);
        }

        if self.send_email_notification(&request).await {
            info!(
                request_id = request.id,
                "A notification message for the standby request has been sent."
            );
            request.last_reminder = Some(now);
        } else {
            info!(
                request_id = request.id,
                "Notification for the standby request should have been sent but failed."
            );
        }

        Ok(request)
    }

    /// Notify the process operators and the active administrators that a
    /// request is in standby and requires an intervention.
    async fn send_email_notification(&self, request: &Request) -> bool {
        debug!("Sending an e-mail reminder to the operators.");

        let mut recipients: Vec<User> = Vec::new();

        if let Some(process_id) = request.process_id {
            match self.repositories.processes.find_operators(process_id).await {
                Ok(operators) => recipients.extend(operators),
                Err(processes_error) => {
                    warn!(error = %processes_error, "Could not fetch the operators for the process.");
                }
            }
        }

        match self.repositories.users.find_active_administrators().await {
            Ok(administrators) => recipients.extend(administrators),
            Err(users_error) => {
                warn!(error = %users_error, "Could not fetch the active administrators.");
            }
        }

        let notification = Notification::StandbyReminder {
            request: RequestSummary::from(request),
        };

        notify_users(
            self.sender.as_ref(),
            &self.email_settings,
            &recipients,
            &notification,
        )
    }
}
