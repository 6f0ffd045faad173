//! Atomic, action-tagged authorization checks.

mod generic;

pub use generic::GenericRuleOptions;

use crate::entity::Entity;
use crate::error::Result;
use crate::principal::Principal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// An action a rule can guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Custom(String),
}

impl Action {
    pub const CRUD: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn as_str(&self) -> &str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Custom(name) => name,
        }
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        match name {
            "create" => Action::Create,
            "read" => Action::Read,
            "update" => Action::Update,
            "delete" => Action::Delete,
            other => Action::Custom(other.to_string()),
        }
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Action::from(name.as_str())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asynchronous permission predicate evaluated against an entity.
///
/// Returning `Ok(())` grants access; any error denies it.
#[async_trait]
pub trait Predicate<E>: Send + Sync {
    async fn check(&self, entity: &E, principal: &Principal) -> Result<()>;
}

/// Adapter turning an async closure into a [`Predicate`].
pub struct FnPredicate<F>(F);

#[async_trait]
impl<E, F, Fut> Predicate<E> for FnPredicate<F>
where
    E: Entity,
    F: Fn(E, Principal) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn check(&self, entity: &E, principal: &Principal) -> Result<()> {
        (self.0)(entity.clone(), principal.clone()).await
    }
}

pub fn predicate_fn<E, F, Fut>(f: F) -> Arc<dyn Predicate<E>>
where
    E: Entity,
    F: Fn(E, Principal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnPredicate(f))
}

/// An immutable pairing of an action with the predicate guarding it.
pub struct Rule<E> {
    action: Action,
    predicate: Arc<dyn Predicate<E>>,
    description: String,
}

impl<E: Entity> Rule<E> {
    pub fn new(action: impl Into<Action>, predicate: Arc<dyn Predicate<E>>) -> Self {
        Self {
            action: action.into(),
            predicate,
            description: "custom".to_string(),
        }
    }

    /// Build a rule that delegates the decision to a named ACL context.
    ///
    /// Fails with a configuration error when a field is missing or when the
    /// named context does not exist in `options.acl`.
    pub fn build_generic(options: &GenericRuleOptions) -> Result<Self> {
        generic::build(options)
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Short human-readable summary, e.g. `generic(read_Study via study on id)`.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_applicable(&self, action: &Action) -> bool {
        &self.action == action
    }

    pub async fn apply(&self, entity: &E, principal: &Principal) -> Result<()> {
        self.predicate.check(entity, principal).await
    }
}

impl<E> Clone for Rule<E> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            predicate: Arc::clone(&self.predicate),
            description: self.description.clone(),
        }
    }
}

impl<E> fmt::Debug for Rule<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("action", &self.action)
            .field("description", &self.description)
            .finish()
    }
}
