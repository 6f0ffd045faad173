use crate::acl::AclBackend;
use crate::config::AuthConfig;
use crate::entity::Entity;
use crate::error::{Result, ShieldError};
use crate::repository::Repository;
use crate::shield::Shield;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Inputs to [`ShieldRegistry::init`].
pub struct ShieldOptions<R: Repository> {
    pub config: Option<Vec<AuthConfig<R::Entity>>>,
    pub acl: Option<AclBackend>,
    pub models: BTreeMap<String, R>,
}

impl<R: Repository> Default for ShieldOptions<R> {
    fn default() -> Self {
        Self {
            config: None,
            acl: None,
            models: BTreeMap::new(),
        }
    }
}

fn poisoned<T>(_: PoisonError<T>) -> ShieldError {
    ShieldError::Lock("shield registry".to_string())
}

/// Owns the shields of a set of entity types, keyed by model name.
pub struct ShieldRegistry<R: Repository> {
    acl: AclBackend,
    configs: Vec<AuthConfig<R::Entity>>,
    shields: Arc<RwLock<BTreeMap<String, Arc<Shield<R>>>>>,
}

impl<R: Repository> ShieldRegistry<R> {
    pub fn new(acl: AclBackend, configs: Vec<AuthConfig<R::Entity>>) -> Self {
        Self {
            acl,
            configs,
            shields: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Validate `options`, then guard every model with the configs whose
    /// `defaults.model_name` matches it.
    pub fn init(options: ShieldOptions<R>) -> Result<Self> {
        let acl = options
            .acl
            .ok_or_else(|| ShieldError::configuration("Invalid shield options: `acl` is required"))?;
        let configs = match options.config {
            Some(configs) if !configs.is_empty() => configs,
            _ => {
                return Err(ShieldError::configuration(
                    "Invalid shield options: `config` is required",
                ))
            }
        };
        if options.models.is_empty() {
            return Err(ShieldError::configuration(
                "Invalid shield options: `models` is required",
            ));
        }

        let registry = Self::new(acl, configs);
        for (name, repo) in options.models {
            registry.guard(name, repo)?;
        }

        info!(models = ?registry.names()?, "Shield registry initialised");
        Ok(registry)
    }

    /// Guard one more model. A model name can only be guarded once.
    pub fn guard(&self, model_name: impl Into<String>, repo: R) -> Result<Arc<Shield<R>>> {
        let model_name = model_name.into();
        let mut shield = Shield::new(model_name.clone(), repo, self.acl.clone())?;
        for config in self.configs.iter().filter(|c| c.applies_to(&model_name)) {
            shield.add_rules(config)?;
        }

        let shield = Arc::new(shield);
        let mut shields = self.shields.write().map_err(poisoned)?;
        if shields.contains_key(&model_name) {
            return Err(ShieldError::configuration(format!(
                "Model {} is already guarded",
                model_name
            )));
        }
        shields.insert(model_name.clone(), Arc::clone(&shield));
        debug!(model = %model_name, rules = shield.rules().len(), "Model guarded");
        Ok(shield)
    }

    pub fn get(&self, model_name: &str) -> Result<Option<Arc<Shield<R>>>> {
        let shields = self.shields.read().map_err(poisoned)?;
        Ok(shields.get(model_name).cloned())
    }

    /// The shield guarding `entity`'s type.
    pub fn shield_for(&self, entity: &R::Entity) -> Result<Arc<Shield<R>>> {
        self.get(entity.model_name())?.ok_or_else(|| {
            ShieldError::configuration(format!("Model {} is not guarded", entity.model_name()))
        })
    }

    pub fn names(&self) -> Result<Vec<String>> {
        let shields = self.shields.read().map_err(poisoned)?;
        Ok(shields.keys().cloned().collect())
    }

    /// Drop every shield. Shields still held elsewhere stay usable.
    pub fn teardown(&self) -> Result<()> {
        let mut shields = self.shields.write().map_err(poisoned)?;
        info!(models = shields.len(), "Tearing down shield registry");
        shields.clear();
        Ok(())
    }
}

impl<R: Repository> Clone for ShieldRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            acl: self.acl.clone(),
            configs: self.configs.clone(),
            shields: Arc::clone(&self.shields),
        }
    }
}
