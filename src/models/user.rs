use serde::{Deserialize, Serialize};

/// The privilege level of an application user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserProfile {
    Admin,
    Operator,
}

/// An application user that may be notified about request lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub login: String,
    pub email: String,
    /// Preferred locale of the user, validated against the available locales
    /// when a notification is built.
    pub locale: Option<String>,
    pub active: bool,
    pub profile: UserProfile,
}

impl User {
    pub fn new(id: i32, login: &str, email: &str, profile: UserProfile) -> Self {
        Self {
            id,
            login: login.to_string(),
            email: email.to_string(),
            locale: None,
            active: true,
            profile,
        }
    }
}
