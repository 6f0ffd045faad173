//! Declarative rule registration.
//!
//! An [`AuthConfig`] names shared defaults for one entity type plus optional
//! per-action overrides. Explicit per-action fields always win over the
//! defaults. Configs can be written in code or loaded from TOML:
//!
//! ```toml
//! [[shield]]
//! [shield.defaults]
//! model_name = "Study"
//! acl_context_name = "study"
//! auth_key = "id"
//!
//! [shield.create]
//! acl_context_name = "site"
//! auth_key = "site_id"
//! ```

use crate::acl::AclBackend;
use crate::entity::Entity;
use crate::error::Result;
use crate::rule::{Action, GenericRuleOptions, Predicate, Rule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Fields shared by every action of one config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDefaults {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub acl_context_name: Option<String>,
    #[serde(default)]
    pub auth_key: Option<String>,
}

impl RuleDefaults {
    pub fn new(
        model_name: impl Into<String>,
        acl_context_name: impl Into<String>,
        auth_key: impl Into<String>,
    ) -> Self {
        Self {
            model_name: Some(model_name.into()),
            acl_context_name: Some(acl_context_name.into()),
            auth_key: Some(auth_key.into()),
        }
    }
}

/// Per-action overrides. A `method` replaces the generic ACL check entirely.
#[derive(Serialize, Deserialize)]
#[serde(bound = "", deny_unknown_fields)]
pub struct RuleOverride<E> {
    #[serde(default)]
    pub acl_context_name: Option<String>,
    #[serde(default)]
    pub auth_key: Option<String>,
    #[serde(skip)]
    pub method: Option<Arc<dyn Predicate<E>>>,
}

impl<E> RuleOverride<E> {
    pub fn new() -> Self {
        Self {
            acl_context_name: None,
            auth_key: None,
            method: None,
        }
    }

    pub fn with_acl_context_name(mut self, name: impl Into<String>) -> Self {
        self.acl_context_name = Some(name.into());
        self
    }

    pub fn with_auth_key(mut self, key: impl Into<String>) -> Self {
        self.auth_key = Some(key.into());
        self
    }

    pub fn with_method(mut self, method: Arc<dyn Predicate<E>>) -> Self {
        self.method = Some(method);
        self
    }
}

impl<E> Default for RuleOverride<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for RuleOverride<E> {
    fn clone(&self) -> Self {
        Self {
            acl_context_name: self.acl_context_name.clone(),
            auth_key: self.auth_key.clone(),
            method: self.method.clone(),
        }
    }
}

impl<E> fmt::Debug for RuleOverride<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleOverride")
            .field("acl_context_name", &self.acl_context_name)
            .field("auth_key", &self.auth_key)
            .field("method", &self.method.as_ref().map(|_| "custom"))
            .finish()
    }
}

/// Rule registration record for one entity type.
#[derive(Serialize, Deserialize)]
#[serde(bound = "", deny_unknown_fields)]
pub struct AuthConfig<E> {
    pub defaults: RuleDefaults,
    #[serde(default)]
    pub create: Option<RuleOverride<E>>,
    #[serde(default)]
    pub read: Option<RuleOverride<E>>,
    #[serde(default)]
    pub update: Option<RuleOverride<E>>,
    #[serde(default)]
    pub delete: Option<RuleOverride<E>>,
    /// Extra actions beyond create/read/update/delete.
    #[serde(default)]
    pub actions: BTreeMap<String, RuleOverride<E>>,
}

impl<E: Entity> AuthConfig<E> {
    pub fn new(defaults: RuleDefaults) -> Self {
        Self {
            defaults,
            create: None,
            read: None,
            update: None,
            delete: None,
            actions: BTreeMap::new(),
        }
    }

    /// Attach an override for `action`, replacing any previous one.
    pub fn with_override(mut self, action: impl Into<Action>, rule: RuleOverride<E>) -> Self {
        match action.into() {
            Action::Create => self.create = Some(rule),
            Action::Read => self.read = Some(rule),
            Action::Update => self.update = Some(rule),
            Action::Delete => self.delete = Some(rule),
            Action::Custom(name) => {
                self.actions.insert(name, rule);
            }
        }
        self
    }

    pub fn model_name(&self) -> Option<&str> {
        self.defaults.model_name.as_deref()
    }

    pub fn applies_to(&self, model_name: &str) -> bool {
        self.model_name() == Some(model_name)
    }

    fn entries(&self) -> Vec<(Action, Option<&RuleOverride<E>>)> {
        let mut entries = vec![
            (Action::Create, self.create.as_ref()),
            (Action::Read, self.read.as_ref()),
            (Action::Update, self.update.as_ref()),
            (Action::Delete, self.delete.as_ref()),
        ];
        entries.extend(
            self.actions
                .iter()
                .map(|(name, rule)| (Action::from(name.as_str()), Some(rule))),
        );
        entries
    }

    /// Merge an override over the defaults into generic builder options.
    pub fn generic_options(
        &self,
        action: &Action,
        rule: Option<&RuleOverride<E>>,
        acl: &AclBackend,
    ) -> GenericRuleOptions {
        let pick = |explicit: Option<&String>, default: &Option<String>| {
            explicit.cloned().or_else(|| default.clone())
        };

        GenericRuleOptions {
            action_name: Some(action.as_str().to_string()),
            model_name: self.defaults.model_name.clone(),
            auth_key: pick(
                rule.and_then(|r| r.auth_key.as_ref()),
                &self.defaults.auth_key,
            ),
            acl_context_name: pick(
                rule.and_then(|r| r.acl_context_name.as_ref()),
                &self.defaults.acl_context_name,
            ),
            acl: acl.clone(),
        }
    }

    /// Build one rule per action entry.
    ///
    /// Every config yields a rule for each of create, read, update and
    /// delete, plus one per extra action. Nothing is returned unless every
    /// rule builds.
    pub fn build_rules(&self, acl: &AclBackend) -> Result<Vec<Rule<E>>> {
        self.entries()
            .into_iter()
            .map(|(action, rule)| match rule.and_then(|r| r.method.clone()) {
                Some(method) => {
                    debug!(action = %action, "Registering custom rule");
                    Ok(Rule::new(action, method))
                }
                None => Rule::build_generic(&self.generic_options(&action, rule, acl)),
            })
            .collect()
    }
}

impl<E> Clone for AuthConfig<E> {
    fn clone(&self) -> Self {
        Self {
            defaults: self.defaults.clone(),
            create: self.create.clone(),
            read: self.read.clone(),
            update: self.update.clone(),
            delete: self.delete.clone(),
            actions: self.actions.clone(),
        }
    }
}

impl<E> fmt::Debug for AuthConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("defaults", &self.defaults)
            .field("create", &self.create)
            .field("read", &self.read)
            .field("update", &self.update)
            .field("delete", &self.delete)
            .field("actions", &self.actions)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(bound = "")]
struct ShieldFile<E> {
    #[serde(default)]
    shield: Vec<AuthConfig<E>>,
}

/// Parse a TOML document holding a `[[shield]]` array.
pub fn parse_auth_configs<E>(source: &str) -> Result<Vec<AuthConfig<E>>> {
    let file: ShieldFile<E> = toml::from_str(source)?;
    Ok(file.shield)
}

pub fn load_auth_configs<E, P: AsRef<Path>>(path: P) -> Result<Vec<AuthConfig<E>>> {
    let path = path.as_ref();
    debug!("Loading auth configs from {:?}", path);
    let source = std::fs::read_to_string(path)?;
    parse_auth_configs(&source)
}
