use serde::{Deserialize, Serialize};

/// An ordered sequence of tasks that a matched request executes.
///
/// The tasks themselves are stored separately and fetched ordered by
/// position through the tasks repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: i32,
    pub name: String,
}

impl Process {
    pub fn new(id: i32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}
