use serde::{Deserialize, Serialize};

/// A connector-scoped routing rule.
///
/// Rules are evaluated in ascending `position` order and the first match
/// wins. The predicate is an opaque expression whose evaluation is delegated
/// to the configured rule evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i32,
    pub connector_id: i32,
    /// Evaluation order within the connector, ascending.
    pub position: i32,
    pub active: bool,
    /// The process a matching request is routed to.
    pub process_id: i32,
    /// The matching predicate, opaque to the orchestration core.
    pub predicate: String,
}

impl Rule {
    pub fn new(id: i32, connector_id: i32, position: i32, process_id: i32, predicate: &str) -> Self {
        Self {
            id,
            connector_id,
            position,
            active: true,
            process_id,
            predicate: predicate.to_string(),
        }
    }
}
