//! Relations-style ACL contexts loaded from TOML.
//!
//! Each context declares roles (a role grants a list of permissions) and
//! assertions binding a user to a role on one object:
//!
//! ```toml
//! [contexts.study.roles]
//! PI = ["read_Study"]
//!
//! [[contexts.study.assertions]]
//! user = "testPI"
//! role = "PI"
//! object = "1"
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use shield_core::{AclBackend, AclContext, AclQuestion, Result, ShieldError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Assertion {
    pub user: String,
    pub role: String,
    pub object: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationsConfig {
    #[serde(default)]
    pub roles: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AclFile {
    #[serde(default)]
    contexts: BTreeMap<String, RelationsConfig>,
}

/// A context answering from its role and assertion tables.
#[derive(Debug, Clone)]
pub struct RelationsAcl {
    name: String,
    config: RelationsConfig,
}

impl RelationsAcl {
    /// Every asserted role must be declared.
    pub fn new(name: impl Into<String>, config: RelationsConfig) -> Result<Self> {
        let name = name.into();
        if let Some(assertion) = config
            .assertions
            .iter()
            .find(|a| !config.roles.contains_key(&a.role))
        {
            return Err(ShieldError::configuration(format!(
                "acl context `{}` asserts unknown role `{}`",
                name, assertion.role
            )));
        }
        Ok(Self { name, config })
    }

    pub fn allows(&self, question: &AclQuestion) -> bool {
        self.config.assertions.iter().any(|a| {
            a.user == question.principal
                && a.object == question.object
                && self
                    .config
                    .roles
                    .get(&a.role)
                    .is_some_and(|perms| perms.contains(&question.permission))
        })
    }
}

#[async_trait]
impl AclContext for RelationsAcl {
    async fn ask(&self, question: &str) -> Result<bool> {
        let parsed = AclQuestion::parse(question)?;
        let allowed = self.allows(&parsed);
        debug!(context = %self.name, %question, allowed, "ACL question answered");
        Ok(allowed)
    }
}

pub fn parse_acl_backend(source: &str) -> Result<AclBackend> {
    let file: AclFile = toml::from_str(source)?;
    let mut backend = AclBackend::new();
    for (name, config) in file.contexts {
        let context = RelationsAcl::new(name.clone(), config)?;
        backend.register(name, Arc::new(context));
    }
    Ok(backend)
}

pub fn load_acl_backend<P: AsRef<Path>>(path: P) -> Result<AclBackend> {
    let path = path.as_ref();
    let backend = parse_acl_backend(&std::fs::read_to_string(path)?)?;
    info!(path = ?path, contexts = ?backend.names(), "Loaded ACL contexts");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACL: &str = r#"
        [contexts.study.roles]
        PI = ["read_Study"]
        siteAdmin = ["read_Study", "update_Study"]

        [[contexts.study.assertions]]
        user = "testPI"
        role = "PI"
        object = "1"

        [[contexts.study.assertions]]
        user = "testAdmin"
        role = "siteAdmin"
        object = "1"

        [contexts.site.roles]
        siteAdmin = ["create_Study"]
    "#;

    #[tokio::test]
    async fn test_answers_from_assertions() {
        let backend = parse_acl_backend(ACL).unwrap();
        assert_eq!(backend.names(), vec!["site", "study"]);

        let study = backend.context("study").unwrap();
        assert!(study.ask("can testPI read_Study from 1").await.unwrap());
        assert!(!study.ask("can testPI update_Study from 1").await.unwrap());
        assert!(study.ask("can testAdmin update_Study from 1").await.unwrap());
        assert!(!study.ask("can testAdmin update_Study from 2").await.unwrap());
        assert!(!study.ask("can stranger read_Study from 1").await.unwrap());

        let site = backend.context("site").unwrap();
        assert!(!site.ask("can testAdmin create_Study from 10").await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_question_is_an_error() {
        let backend = parse_acl_backend(ACL).unwrap();
        let study = backend.context("study").unwrap();
        assert!(study.ask("may I?").await.is_err());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let source = r#"
            [contexts.study.roles]
            PI = ["read_Study"]

            [[contexts.study.assertions]]
            user = "testPI"
            role = "owner"
            object = "1"
        "#;
        let err = parse_acl_backend(source).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("unknown role `owner`"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = parse_acl_backend("[contexts.study]\ngrants = []\n").unwrap_err();
        assert!(matches!(err, ShieldError::Toml(_)));
    }
}
