//! In-memory reference implementations of the repository traits.
//!
//! Thread-safe through `DashMap`; identifiers are assigned from per-store
//! atomic counters. Suitable for tests and for embedders without durable
//! storage needs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::config::SystemParameters;
use crate::error::{ExtractError, Result};
use crate::models::{
    Connector, Process, Request, RequestHistoryRecord, RequestStatus, Rule, Task, User,
    UserProfile,
};
use crate::persistence::{
    ApplicationRepositories, ConnectorsRepository, ParametersRepository, ProcessesRepository,
    RequestHistoryRepository, RequestsRepository, RulesRepository, TasksRepository,
    UsersRepository,
};

/// The login of the technical user background steps run as.
pub const SYSTEM_USER_LOGIN: &str = "system";

#[derive(Default)]
pub struct InMemoryRequestsRepository {
    requests: DashMap<i32, Request>,
    next_id: AtomicI32,
}

impl InMemoryRequestsRepository {
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
            next_id: AtomicI32::new(1),
        }
    }

    pub fn insert(&self, request: Request) {
        self.requests.insert(request.id, request);
    }
}

#[async_trait]
impl RequestsRepository for InMemoryRequestsRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<Request>> {
        Ok(self.requests.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_status(&self, status: RequestStatus) -> Result<Vec<Request>> {
        let mut matching: Vec<Request> = self
            .requests
            .iter()
            .filter(|entry| entry.value().status == status)
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(|request| request.id);
        Ok(matching)
    }

    async fn save(&self, mut request: Request) -> Result<Request> {
        if request.id == 0 {
            request.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        }

        self.requests.insert(request.id, request.clone());
        Ok(request)
    }
}

#[derive(Default)]
pub struct InMemoryRulesRepository {
    rules: RwLock<Vec<Rule>>,
}

impl InMemoryRulesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, rule: Rule) {
        self.rules.write().push(rule);
    }
}

#[async_trait]
impl RulesRepository for InMemoryRulesRepository {
    async fn find_by_connector_active_ordered(&self, connector_id: i32) -> Result<Vec<Rule>> {
        let mut matching: Vec<Rule> = self
            .rules
            .read()
            .iter()
            .filter(|rule| rule.connector_id == connector_id && rule.active)
            .cloned()
            .collect();
        matching.sort_by_key(|rule| rule.position);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryUsersRepository {
    users: DashMap<i32, User>,
}

impl InMemoryUsersRepository {
    pub fn new() -> Self {
        let repository = Self::default();
        repository.insert(User::new(
            0,
            SYSTEM_USER_LOGIN,
            "system@localhost",
            UserProfile::Admin,
        ));
        repository
    }

    pub fn insert(&self, user: User) {
        self.users.insert(user.id, user);
    }
}

#[async_trait]
impl UsersRepository for InMemoryUsersRepository {
    async fn find_active_administrators(&self) -> Result<Vec<User>> {
        let mut administrators: Vec<User> = self
            .users
            .iter()
            .filter(|entry| {
                let user = entry.value();
                user.active && user.profile == UserProfile::Admin && user.login != SYSTEM_USER_LOGIN
            })
            .map(|entry| entry.value().clone())
            .collect();
        administrators.sort_by_key(|user| user.id);
        Ok(administrators)
    }

    async fn system_user(&self) -> Result<User> {
        self.users
            .iter()
            .find(|entry| entry.value().login == SYSTEM_USER_LOGIN)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ExtractError::Persistence("The system user is not defined.".to_string()))
    }
}

#[derive(Default)]
pub struct InMemoryProcessesRepository {
    processes: DashMap<i32, Process>,
    operators: DashMap<i32, Vec<User>>,
}

impl InMemoryProcessesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, process: Process) {
        self.processes.insert(process.id, process);
    }

    pub fn set_operators(&self, process_id: i32, operators: Vec<User>) {
        self.operators.insert(process_id, operators);
    }
}

#[async_trait]
impl ProcessesRepository for InMemoryProcessesRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<Process>> {
        Ok(self.processes.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_operators(&self, process_id: i32) -> Result<Vec<User>> {
        Ok(self
            .operators
            .get(&process_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryTasksRepository {
    tasks: RwLock<Vec<Task>>,
}

impl InMemoryTasksRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: Task) {
        self.tasks.write().push(task);
    }
}

#[async_trait]
impl TasksRepository for InMemoryTasksRepository {
    async fn find_by_process_ordered(&self, process_id: i32) -> Result<Vec<Task>> {
        let mut matching: Vec<Task> = self
            .tasks
            .read()
            .iter()
            .filter(|task| task.process_id == process_id)
            .cloned()
            .collect();
        matching.sort_by_key(|task| task.position);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryRequestHistoryRepository {
    records: DashMap<i32, RequestHistoryRecord>,
    next_id: AtomicI32,
}

impl InMemoryRequestHistoryRepository {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicI32::new(1),
        }
    }
}

#[async_trait]
impl RequestHistoryRepository for InMemoryRequestHistoryRepository {
    async fn find_by_request_ordered(&self, request_id: i32) -> Result<Vec<RequestHistoryRecord>> {
        let mut matching: Vec<RequestHistoryRecord> = self
            .records
            .iter()
            .filter(|entry| entry.value().request_id == request_id)
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(|record| record.step);
        Ok(matching)
    }

    async fn save(&self, mut record: RequestHistoryRecord) -> Result<RequestHistoryRecord> {
        if record.id == 0 {
            record.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        }

        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete(&self, record_id: i32) -> Result<()> {
        self.records.remove(&record_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryConnectorsRepository {
    connectors: DashMap<i32, Connector>,
}

impl InMemoryConnectorsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, connector: Connector) {
        self.connectors.insert(connector.id, connector);
    }
}

#[async_trait]
impl ConnectorsRepository for InMemoryConnectorsRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<Connector>> {
        Ok(self.connectors.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_active(&self) -> Result<Vec<Connector>> {
        let mut active: Vec<Connector> = self
            .connectors
            .iter()
            .filter(|entry| entry.value().active)
            .map(|entry| entry.value().clone())
            .collect();
        active.sort_by_key(|connector| connector.id);
        Ok(active)
    }
}

/// Parameters repository backed by a mutable key/value map, seeded from
/// [`SystemParameters`].
pub struct InMemoryParametersRepository {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryParametersRepository {
    pub fn new(parameters: &SystemParameters) -> Self {
        use crate::constants::parameter_keys;

        let mut values = HashMap::new();
        values.insert(
            parameter_keys::BASE_PATH.to_string(),
            parameters.base_path.clone(),
        );
        values.insert(
            parameter_keys::SCHEDULER_MODE.to_string(),
            parameters.scheduler_mode.clone(),
        );
        values.insert(
            parameter_keys::SCHEDULER_FREQUENCY.to_string(),
            parameters.scheduler_frequency.to_string(),
        );
        values.insert(
            parameter_keys::SCHEDULER_RANGES.to_string(),
            parameters.scheduler_ranges.clone(),
        );
        values.insert(
            parameter_keys::STANDBY_REMINDER_DAYS.to_string(),
            parameters.standby_reminder_days.to_string(),
        );

        Self {
            values: RwLock::new(values),
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }

    fn get(&self, key: &str) -> Result<String> {
        self.values
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ExtractError::Configuration(format!("Missing parameter: {key}")))
    }

    fn get_u32(&self, key: &str) -> Result<u32> {
        self.get(key)?
            .parse()
            .map_err(|_| ExtractError::Configuration(format!("Parameter {key} is not a number")))
    }
}

#[async_trait]
impl ParametersRepository for InMemoryParametersRepository {
    async fn base_path(&self) -> Result<String> {
        self.get(crate::constants::parameter_keys::BASE_PATH)
    }

    async fn scheduler_mode(&self) -> Result<String> {
        self.get(crate::constants::parameter_keys::SCHEDULER_MODE)
    }

    async fn scheduler_frequency(&self) -> Result<u32> {
        self.get_u32(crate::constants::parameter_keys::SCHEDULER_FREQUENCY)
    }

    async fn scheduler_ranges(&self) -> Result<String> {
        self.get(crate::constants::parameter_keys::SCHEDULER_RANGES)
    }

    async fn standby_reminder_days(&self) -> Result<u32> {
        self.get_u32(crate::constants::parameter_keys::STANDBY_REMINDER_DAYS)
    }
}

/// Assemble a full in-memory repository ensemble seeded with the given
/// parameters.
pub fn in_memory_repositories(parameters: &SystemParameters) -> ApplicationRepositories {
    ApplicationRepositories {
        requests: Arc::new(InMemoryRequestsRepository::new()),
        rules: Arc::new(InMemoryRulesRepository::new()),
        users: Arc::new(InMemoryUsersRepository::new()),
        processes: Arc::new(InMemoryProcessesRepository::new()),
        tasks: Arc::new(InMemoryTasksRepository::new()),
        history: Arc::new(InMemoryRequestHistoryRepository::new()),
        connectors: Arc::new(InMemoryConnectorsRepository::new()),
        parameters: Arc::new(InMemoryParametersRepository::new(parameters)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_repository_assigns_identifiers() {
        let repository = InMemoryRequestsRepository::new();

        tokio_test::block_on(async {
            let mut request = Request::new_imported(0, 1, "order", "product");
            request = repository.save(request).await.unwrap();
            assert_eq!(request.id, 1);

            let second = repository
                .save(Request::new_imported(0, 1, "other", "product"))
                .await
                .unwrap();
            assert_eq!(second.id, 2);
        });
    }

    #[test]
    fn test_rules_are_filtered_and_ordered() {
        let repository = InMemoryRulesRepository::new();
        repository.insert(Rule::new(1, 1, 2, 10, "second"));
        repository.insert(Rule::new(2, 1, 1, 11, "first"));
        repository.insert(Rule::new(3, 2, 1, 12, "other connector"));
        let mut inactive = Rule::new(4, 1, 3, 13, "inactive");
        inactive.active = false;
        repository.insert(inactive);

        tokio_test::block_on(async {
            let rules = repository.find_by_connector_active_ordered(1).await.unwrap();
            let positions: Vec<i32> = rules.iter().map(|rule| rule.position).collect();
            assert_eq!(positions, vec![1, 2]);
        });
    }

    #[test]
    fn test_system_user_is_not_an_administrator_recipient() {
        let repository = InMemoryUsersRepository::new();
        repository.insert(User::new(5, "admin", "admin@example.com", UserProfile::Admin));

        tokio_test::block_on(async {
            let administrators = repository.find_active_administrators().await.unwrap();
            assert_eq!(administrators.len(), 1);
            assert_eq!(administrators[0].login, "admin");
            assert_eq!(repository.system_user().await.unwrap().login, SYSTEM_USER_LOGIN);
        });
    }
}
