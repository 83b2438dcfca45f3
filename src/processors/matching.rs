use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::constants::{INPUT_FOLDER_NAME, OUTPUT_FOLDER_NAME};
use crate::email::{notify_users, EmailSettings, Notification, NotificationSender, RequestSummary};
use crate::error::Result;
use crate::matching::{MatchOutcome, RequestMatcher, RuleEvaluator};
use crate::models::{Request, RequestStatus, Rule};
use crate::persistence::ApplicationRepositories;
use crate::utils::file_system;

/// Attempts to match an imported request with a process through the rules
/// defined for its connector.
///
/// On a match, the request's on-disk workspace is provisioned and the
/// request advances to `Ongoing`; on no match, the active administrators are
/// notified and the request is flagged `Unmatched`.
pub struct RequestMatchingProcessor {
    repositories: ApplicationRepositories,
    email_settings: EmailSettings,
    sender: Arc<dyn NotificationSender>,
    matcher: RequestMatcher,
}

impl RequestMatchingProcessor {
    pub fn new(
        repositories: ApplicationRepositories,
        email_settings: EmailSettings,
        sender: Arc<dyn NotificationSender>,
        evaluator: Arc<dyn RuleEvaluator>,
    ) -> Self {
        Self {
            repositories,
            email_settings,
            sender,
            matcher: RequestMatcher::new(evaluator),
        }
    }

    /// Match a request with a process.
    pub async fn process(&self, request: Request) -> Result<Request> {
        debug!(request_id = request.id, "Attempting to match request with a rule.");

        let rules = self
            .repositories
            .rules
            .find_by_connector_active_ordered(request.connector_id)
            .await?;

        match self.matcher.match_request_with_rules(&request, &rules) {
            MatchOutcome::Matched(rule) => Ok(self.set_request_to_matched(request, &rule).await),
            MatchOutcome::NoMatch => {
                warn!(
                    request_id = request.id,
                    connector_id = request.connector_id,
                    "Request did not match any rule from its connector."
                );
                self.send_email_to_admins(&request).await;
                Ok(Self::set_request_to_unmatched(request))
            }
        }
    }

    /// Carry the actions to prepare a request for the process that matched
    /// it. The request is only updated if all the required folders have been
    /// created.
    async fn set_request_to_matched(&self, mut request: Request, rule: &Rule) -> Request {
        let Some((folder_in, folder_out)) = self.define_data_folders(&request).await else {
            error!(
                request_id = request.id,
                "The definition of the data folders for the request failed."
            );
            return request;
        };

        debug!("Updating request fields with process info.");
        request.folder_in = Some(folder_in);
        request.folder_out = Some(folder_out);
        request.process_id = Some(rule.process_id);
        request.status = RequestStatus::Ongoing;
        request.task_number = 1;

        request
    }

    /// Create the data folders for the request and return their paths
    /// relative to the base folder, or `None` if any creation step failed.
    async fn define_data_folders(&self, request: &Request) -> Option<(String, String)> {
        debug!(request_id = request.id, "Creating the folders for the request.");

        let base_path = match self.repositories.parameters.base_path().await {
            Ok(path) => PathBuf::from(path),
            Err(parameters_error) => {
                error!(error = %parameters_error, "Could not read the requests base folder path.");
                return None;
            }
        };

        if !file_system::ensure_folder(&base_path) {
            error!(
                request_id = request.id,
                "The base folder for requests data does not exist or is not accessible and could not be created."
            );
            return None;
        }

        let root_folder = Self::create_data_root_folder(&base_path)?;

        let input_folder = root_folder.join(INPUT_FOLDER_NAME);
        if !file_system::ensure_folder(&input_folder) {
            error!(
                request_id = request.id,
                "The input data folder for the request could not be created."
            );
            return None;
        }

        let output_folder = root_folder.join(OUTPUT_FOLDER_NAME);
        if !file_system::ensure_folder(&output_folder) {
            error!(
                request_id = request.id,
                "The output data folder for the request could not be created."
            );
            return None;
        }

        let root_name = root_folder.file_name()?.to_str()?;

        Some((
            format!("{root_name}/{INPUT_FOLDER_NAME}"),
            format!("{root_name}/{OUTPUT_FOLDER_NAME}"),
        ))
    }

    /// Create the uniquely named folder that will contain the data consumed
    /// and produced by the process, regenerating the name on collision.
    fn create_data_root_folder(base_path: &Path) -> Option<PathBuf> {
        let mut root_folder = base_path.join(Uuid::new_v4().to_string());

        while root_folder.exists() {
            root_folder = base_path.join(Uuid::new_v4().to_string());
        }

        if !file_system::ensure_folder(&root_folder) {
            error!("The data root folder could not be created.");
            return None;
        }

        Some(root_folder)
    }

    /// Notify the active administrators that a request did not match any
    /// rule.
    async fn send_email_to_admins(&self, request: &Request) {
        debug!("Sending e-mail notifications to administrators.");

        let administrators = match self.repositories.users.find_active_administrators().await {
            Ok(administrators) => administrators,
            Err(users_error) => {
                warn!(error = %users_error, "An error prevented notifying the administrators by e-mail.");
                return;
            }
        };

        if administrators.is_empty() {
            warn!("No administrators found for unmatched request notification.");
            return;
        }

        let notification = Notification::UnmatchedRequest {
            request: RequestSummary::from(request),
        };

        notify_users(
            self.sender.as_ref(),
            &self.email_settings,
            &administrators,
            &notification,
        );
    }

    /// Carry the actions to signal that a request has not matched any
    /// process.
    fn set_request_to_unmatched(mut request: Request) -> Request {
        debug!("Setting request status to unmatched.");
        request.status = RequestStatus::Unmatched;
        request
    }
}
