use crate::repository::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShieldError>;

/// Every failure a guarded operation can produce.
///
/// `Authorization` is the only variant that means "access denied"; callers
/// rendering HTTP-style responses map it to 403 and everything else to a
/// server-side failure.
#[derive(Debug, Error)]
pub enum ShieldError {
    /// Invalid or incomplete rule declaration, or no rule for an action.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Action attempted against a record in the wrong lifecycle state.
    #[error("Invalid state: {0}")]
    State(String),

    /// A rule denied access.
    #[error("Authorization denied: {0}")]
    Authorization(String),

    /// A raw persistence primitive was called on a guarded repository.
    #[error("attempt to call a protected access method on a guarded entity: {0}")]
    GuardBypass(&'static str),

    /// The ACL backend failed to answer a question.
    #[error("ACL error: {0}")]
    Acl(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Shared registry state became unusable after a panic.
    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ShieldError {
    pub fn denied(message: impl Into<String>) -> Self {
        ShieldError::Authorization(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ShieldError::Configuration(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        ShieldError::State(message.into())
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, ShieldError::Authorization(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ShieldError::Configuration(_))
    }

    pub fn is_state(&self) -> bool {
        matches!(self, ShieldError::State(_))
    }

    pub fn is_guard_bypass(&self) -> bool {
        matches!(self, ShieldError::GuardBypass(_))
    }

    /// Collapse a rule-evaluation failure into a denial.
    ///
    /// Denials pass through untouched; any other failure raised while a rule
    /// runs keeps its message but becomes an `Authorization` error.
    pub(crate) fn into_denial(self) -> Self {
        match self {
            ShieldError::Authorization(_) => self,
            other => ShieldError::Authorization(other.to_string()),
        }
    }
}
