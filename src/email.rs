//! # Notification Layer
//!
//! Builds the per-recipient notification fan-out for the lifecycle
//! processors. Message rendering and SMTP delivery are delegated to the
//! embedding application through [`NotificationSender`]; this module only
//! decides who gets which payload in which locale.
//!
//! Delivery is fire-and-forget from the processors' perspective: a single
//! recipient's failure is logged and skipped, and a batch counts as sent if
//! at least one recipient received the message.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SmtpParameters;
use crate::error::Result;
use crate::models::{Request, User};

/// The objects required to create and send e-mail messages.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailSettings {
    pub smtp: SmtpParameters,
    /// Locale code of the language the application displays messages in.
    pub application_language: String,
    /// Locales a message can be rendered in.
    pub available_locales: Vec<String>,
}

impl EmailSettings {
    pub fn new(smtp: SmtpParameters, application_language: &str) -> Self {
        Self {
            smtp,
            application_language: application_language.to_string(),
            available_locales: vec![application_language.to_string()],
        }
    }

    pub fn with_available_locales(mut self, locales: &[&str]) -> Self {
        self.available_locales = locales.iter().map(|locale| locale.to_string()).collect();
        self
    }

    /// The locale a message for this user should be rendered in: the user's
    /// preferred locale when it is available, the application language
    /// otherwise.
    pub fn resolve_user_locale(&self, user: &User) -> String {
        match &user.locale {
            Some(locale) if self.available_locales.iter().any(|l| l == locale) => locale.clone(),
            _ => self.application_language.clone(),
        }
    }
}

/// The request fields a notification template may reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub request_id: i32,
    pub order_label: String,
    pub product_label: String,
    pub client: String,
}

impl From<&Request> for RequestSummary {
    fn from(request: &Request) -> Self {
        Self {
            request_id: request.id,
            order_label: request.order_label.clone(),
            product_label: request.product_label.clone(),
            client: request.client.clone(),
        }
    }
}

/// The notification payloads produced by the lifecycle processors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// A freshly imported request matched none of its connector's rules.
    UnmatchedRequest { request: RequestSummary },
    /// The export of a finished request failed.
    ExportFailed {
        request: RequestSummary,
        error_message: String,
        failed_at: DateTime<Utc>,
    },
    /// A pipeline task failed.
    TaskFailed {
        request: RequestSummary,
        task_label: String,
        error_message: String,
        failed_at: DateTime<Utc>,
    },
    /// A pipeline task paused pending manual validation.
    TaskStandby { request: RequestSummary },
    /// A request has been awaiting manual validation for too long.
    StandbyReminder { request: RequestSummary },
}

/// One rendered-and-addressed message unit handed to the sender.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub recipient_address: String,
    pub recipient_login: String,
    pub locale: String,
    pub notification: Notification,
}

/// Renders and delivers notification messages. Implemented by the embedding
/// application (SMTP, queue, test recorder).
pub trait NotificationSender: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<()>;
}

/// Send a notification to each of the given users, deduplicated by address,
/// each in their own resolved locale.
///
/// Returns `true` if at least one recipient received the message.
pub fn notify_users(
    sender: &dyn NotificationSender,
    settings: &EmailSettings,
    recipients: &[User],
    notification: &Notification,
) -> bool {
    if recipients.is_empty() {
        warn!("No recipients found for notification");
        return false;
    }

    let mut seen_addresses: HashSet<String> = HashSet::new();
    let mut at_least_one_sent = false;

    for recipient in recipients {
        if !seen_addresses.insert(recipient.email.clone()) {
            continue;
        }

        if !recipient.email.contains('@') {
            warn!(
                login = %recipient.login,
                address = %recipient.email,
                "Invalid e-mail address for user"
            );
            continue;
        }

        let locale = settings.resolve_user_locale(recipient);
        let message = OutboundMessage {
            recipient_address: recipient.email.clone(),
            recipient_login: recipient.login.clone(),
            locale: locale.clone(),
            notification: notification.clone(),
        };

        match sender.send(&message) {
            Ok(()) => {
                debug!(
                    address = %recipient.email,
                    locale = %locale,
                    "Notification sent successfully"
                );
                at_least_one_sent = true;
            }
            Err(error) => {
                warn!(
                    login = %recipient.login,
                    %error,
                    "Failed to send notification to user"
                );
            }
        }
    }

    if at_least_one_sent {
        info!("The notification was sent to at least one recipient.");
    } else {
        warn!("The notification was not sent to any recipient.");
    }

    at_least_one_sent
}
