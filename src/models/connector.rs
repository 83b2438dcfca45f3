use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A configured instance of a connector plugin.
///
/// The `code` identifies the plugin in the connector registry; the parameter
/// values are handed to `new_instance` whenever the plugin is invoked for
/// this connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: i32,
    pub name: String,
    /// Code of the connector plugin backing this instance.
    pub code: String,
    pub active: bool,
    /// Seconds between two import runs for this connector.
    pub import_frequency: u32,
    /// Parameter values configured for this instance, keyed by parameter code.
    pub parameters_values: HashMap<String, String>,
}

impl Connector {
    pub fn new(id: i32, name: &str, code: &str, import_frequency: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            code: code.to_string(),
            active: true,
            import_frequency,
            parameters_values: HashMap::new(),
        }
    }
}
