use serde::{Deserialize, Serialize};
use std::fmt;

/// The requesting user passed into every guarded operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.username)
    }
}

impl From<&str> for Principal {
    fn from(username: &str) -> Self {
        Principal::new(username)
    }
}
