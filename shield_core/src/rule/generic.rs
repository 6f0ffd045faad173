use super::{Action, Predicate, Rule};
use crate::acl::{AclBackend, AclContext, AclQuestion};
use crate::entity::{display_value, Entity};
use crate::error::{Result, ShieldError};
use crate::principal::Principal;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Declarative fields for a rule whose decision comes from the ACL backend.
#[derive(Debug, Clone, Default)]
pub struct GenericRuleOptions {
    pub action_name: Option<String>,
    pub model_name: Option<String>,
    pub auth_key: Option<String>,
    pub acl_context_name: Option<String>,
    pub acl: AclBackend,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ShieldError::configuration(format!(
            "Invalid rule options: `{}` is required",
            field
        ))),
    }
}

pub(super) fn build<E: Entity>(options: &GenericRuleOptions) -> Result<Rule<E>> {
    let action_name = required(&options.action_name, "action_name")?;
    let auth_key = required(&options.auth_key, "auth_key")?;
    let model_name = required(&options.model_name, "model_name")?;
    let acl_context_name = required(&options.acl_context_name, "acl_context_name")?;

    let context = options.acl.context(acl_context_name).ok_or_else(|| {
        ShieldError::configuration(format!(
            "Invalid rule options: acl context `{}` is not defined",
            acl_context_name
        ))
    })?;

    let action = Action::from(action_name);
    let permission_name = format!("{}_{}", action_name, model_name);
    let description = format!(
        "generic({} via {} on {})",
        permission_name, acl_context_name, auth_key
    );

    let predicate = GenericPredicate {
        action,
        permission_name,
        model_name: model_name.to_string(),
        auth_key: auth_key.to_string(),
        acl_context_name: acl_context_name.to_string(),
        context,
    };

    Ok(Rule {
        action: predicate.action.clone(),
        predicate: Arc::new(predicate),
        description,
    })
}

struct GenericPredicate {
    action: Action,
    permission_name: String,
    model_name: String,
    auth_key: String,
    acl_context_name: String,
    context: Arc<dyn AclContext>,
}

#[async_trait]
impl<E: Entity> Predicate<E> for GenericPredicate {
    async fn check(&self, entity: &E, principal: &Principal) -> Result<()> {
        let auth_val = display_value(entity.get(&self.auth_key).as_ref());
        let question = AclQuestion::new(
            principal.username.clone(),
            self.permission_name.clone(),
            auth_val.clone(),
        );

        debug!(
            context = %self.acl_context_name,
            question = %question,
            "Asking ACL context"
        );

        if self.context.ask(&question.to_string()).await? {
            return Ok(());
        }

        Err(ShieldError::denied(format!(
            "{} cannot {} {} in {} `{}`",
            principal, self.action, self.model_name, self.auth_key, auth_val
        )))
    }
}
