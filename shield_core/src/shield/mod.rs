//! Per-entity-type guard state.
//!
//! A [`Shield`] takes ownership of a raw [`Repository`], so the raw
//! primitives are no longer reachable by the caller. The shield itself also
//! implements [`Repository`]; every raw primitive called through it fails
//! with [`ShieldError::GuardBypass`]. Only the guarded operations in
//! `guarded.rs` forward to the wrapped repository.

mod guarded;

use crate::acl::AclBackend;
use crate::config::AuthConfig;
use crate::error::{Result, ShieldError};
use crate::repository::Repository;
use crate::rule::{Action, Rule};
use async_trait::async_trait;
use std::fmt;
use tracing::info;

pub struct Shield<R: Repository> {
    model_name: String,
    repo: R,
    acl: AclBackend,
    rules: Vec<Rule<R::Entity>>,
}

impl<R: Repository> Shield<R> {
    /// Guard `repo` for the entity type `model_name`.
    ///
    /// Fails when `repo` already sits behind a shield.
    pub fn new(model_name: impl Into<String>, repo: R, acl: AclBackend) -> Result<Self> {
        let model_name = model_name.into();
        if repo.is_guarded() {
            return Err(ShieldError::configuration(format!(
                "Model {} is already guarded",
                model_name
            )));
        }

        info!(model = %model_name, "Raising shield");
        Ok(Self {
            model_name,
            repo,
            acl,
            rules: Vec::new(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn acl(&self) -> &AclBackend {
        &self.acl
    }

    /// Registered rules in insertion order.
    pub fn rules(&self) -> &[Rule<R::Entity>] {
        &self.rules
    }

    /// Build the rules described by `config` and append them.
    ///
    /// Rules accumulate across calls; every rule registered for an action
    /// must pass for that action to be allowed.
    pub fn add_rules(&mut self, config: &AuthConfig<R::Entity>) -> Result<&mut Self> {
        let rules = config.build_rules(&self.acl)?;
        info!(
            model = %self.model_name,
            rules = rules.len(),
            "Registering rules"
        );
        self.rules.extend(rules);
        Ok(self)
    }

    pub fn add_rule(&mut self, rule: Rule<R::Entity>) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn clear_rules(&mut self) {
        self.rules.clear();
    }

    /// Rules registered for `action`.
    ///
    /// An action without rules can never be performed, so an empty result is
    /// a configuration error.
    pub fn applicable_rules(&self, action: &Action) -> Result<Vec<&Rule<R::Entity>>> {
        let rules: Vec<_> = self
            .rules
            .iter()
            .filter(|rule| rule.is_applicable(action))
            .collect();

        if rules.is_empty() {
            return Err(ShieldError::configuration(format!(
                "No rules found for {}",
                action
            )));
        }
        Ok(rules)
    }
}

impl<R: Repository> fmt::Debug for Shield<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shield")
            .field("model_name", &self.model_name)
            .field("acl", &self.acl)
            .field("rules", &self.rules)
            .finish()
    }
}

#[async_trait]
impl<R: Repository> Repository for Shield<R> {
    type Entity = R::Entity;
    type Options = R::Options;

    async fn fetch(&self, _entity: &Self::Entity, _options: &Self::Options) -> Result<Self::Entity> {
        Err(ShieldError::GuardBypass("fetch"))
    }

    async fn fetch_all(
        &self,
        _filter: &Self::Entity,
        _options: &Self::Options,
    ) -> Result<Vec<Self::Entity>> {
        Err(ShieldError::GuardBypass("fetch_all"))
    }

    async fn save(&self, _entity: &Self::Entity, _options: &Self::Options) -> Result<Self::Entity> {
        Err(ShieldError::GuardBypass("save"))
    }

    async fn destroy(&self, _entity: &Self::Entity, _options: &Self::Options) -> Result<()> {
        Err(ShieldError::GuardBypass("destroy"))
    }

    fn is_guarded(&self) -> bool {
        true
    }
}
