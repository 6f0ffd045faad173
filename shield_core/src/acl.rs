//! The ACL backend contract.
//!
//! A backend is a set of named contexts; each context answers
//! natural-language questions of the form
//! `can <principal> <permission> from <object>` with a yes or no.

use crate::error::{Result, ShieldError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// One named predicate of an ACL backend.
#[async_trait]
pub trait AclContext: Send + Sync {
    async fn ask(&self, question: &str) -> Result<bool>;
}

/// Adapter turning an async closure into an [`AclContext`].
pub struct FnAclContext<F>(F);

#[async_trait]
impl<F, Fut> AclContext for FnAclContext<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send,
{
    async fn ask(&self, question: &str) -> Result<bool> {
        (self.0)(question.to_string()).await
    }
}

pub fn acl_fn<F, Fut>(f: F) -> Arc<dyn AclContext>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    Arc::new(FnAclContext(f))
}

/// Named ACL contexts addressable by `acl_context_name`.
#[derive(Clone, Default)]
pub struct AclBackend {
    contexts: BTreeMap<String, Arc<dyn AclContext>>,
}

impl AclBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, name: impl Into<String>, context: Arc<dyn AclContext>) -> Self {
        self.register(name, context);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, context: Arc<dyn AclContext>) {
        self.contexts.insert(name.into(), context);
    }

    pub fn context(&self, name: &str) -> Option<Arc<dyn AclContext>> {
        self.contexts.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.contexts.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for AclBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AclBackend")
            .field("contexts", &self.names())
            .finish()
    }
}

/// A structured ACL question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclQuestion {
    pub principal: String,
    pub permission: String,
    pub object: String,
}

impl AclQuestion {
    pub fn new(
        principal: impl Into<String>,
        permission: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            permission: permission.into(),
            object: object.into(),
        }
    }

    /// Parse `can <principal> <permission> from <object>`.
    pub fn parse(question: &str) -> Result<Self> {
        let invalid = || ShieldError::Acl(format!("Unrecognised ACL question: {}", question));

        let rest = question.trim().strip_prefix("can ").ok_or_else(invalid)?;
        let (subject, object) = rest.split_once(" from ").ok_or_else(invalid)?;
        let (principal, permission) = subject.trim().split_once(' ').ok_or_else(invalid)?;

        let (principal, permission, object) = (principal.trim(), permission.trim(), object.trim());
        if principal.is_empty() || permission.is_empty() || object.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(principal, permission, object))
    }
}

impl fmt::Display for AclQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "can {} {} from {}",
            self.principal, self.permission, self.object
        )
    }
}
