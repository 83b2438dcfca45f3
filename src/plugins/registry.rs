//! # Plugin Registries
//!
//! Code-keyed discovery of the connector and task-processor plugins
//! available to the orchestration core. Registration happens once at
//! startup; lookups are concurrent and cheap.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::plugins::connector::ConnectorPlugin;
use crate::plugins::task_processor::TaskProcessorPlugin;

/// Registry resolving connector plugins by code.
#[derive(Default)]
pub struct ConnectorRegistry {
    plugins: DashMap<String, Arc<dyn ConnectorPlugin>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under its own code. A plugin registered twice
    /// replaces the previous entry.
    pub fn register(&self, plugin: Arc<dyn ConnectorPlugin>) {
        let code = plugin.code().to_string();
        info!(code = %code, "Registered connector plugin");
        self.plugins.insert(code, plugin);
    }

    /// Resolve a plugin by code.
    pub fn get(&self, code: &str) -> Option<Arc<dyn ConnectorPlugin>> {
        let plugin = self.plugins.get(code).map(|entry| Arc::clone(entry.value()));

        if plugin.is_none() {
            debug!(code = %code, "No connector plugin registered under this code");
        }

        plugin
    }

    /// The codes of all registered plugins.
    pub fn codes(&self) -> Vec<String> {
        self.plugins.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Registry resolving task-processor plugins by code.
#[derive(Default)]
pub struct TaskProcessorRegistry {
    plugins: DashMap<String, Arc<dyn TaskProcessorPlugin>>,
}

impl TaskProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under its own code. A plugin registered twice
    /// replaces the previous entry.
    pub fn register(&self, plugin: Arc<dyn TaskProcessorPlugin>) {
        let code = plugin.code().to_string();
        info!(code = %code, "Registered task processor plugin");
        self.plugins.insert(code, plugin);
    }

    /// Resolve a plugin by code.
    pub fn get(&self, code: &str) -> Option<Arc<dyn TaskProcessorPlugin>> {
        let plugin = self.plugins.get(code).map(|entry| Arc::clone(entry.value()));

        if plugin.is_none() {
            debug!(code = %code, "No task processor plugin registered under this code");
        }

        plugin
    }

    /// The codes of all registered plugins.
    pub fn codes(&self) -> Vec<String> {
        self.plugins.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
