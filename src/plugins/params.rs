use serde::{Deserialize, Serialize};

/// Input widget families a plugin parameter can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Text,
    Pass,
    Numeric,
    Boolean,
    Multitext,
    Email,
}

/// One entry of the declarative parameter schema a plugin exposes through
/// `params()`.
///
/// The serialized form (a JSON array of these objects) is the stable
/// contract surfaced to the configuration UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub code: String,
    pub label: String,
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    pub req: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxlength: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl ParameterSpec {
    pub fn new(code: &str, label: &str, parameter_type: ParameterType, required: bool) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
            parameter_type,
            req: required,
            maxlength: None,
            min: None,
            max: None,
            help: None,
        }
    }

    pub fn with_maxlength(mut self, maxlength: u32) -> Self {
        self.maxlength = Some(maxlength);
        self
    }

    pub fn with_bounds(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }
}
