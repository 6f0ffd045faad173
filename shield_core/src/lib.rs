//! Rule-based authorization guard for CRUD persistence.
//!
//! A [`Shield`] wraps the raw fetch/fetch_all/save/destroy primitives of a
//! [`Repository`] and exposes only guarded `read`, `read_all`, `create`,
//! `update` and `delete` operations. Each operation runs every [`Rule`]
//! registered for its action and touches storage only when all of them pass.

pub mod acl;
pub mod config;
pub mod entity;
pub mod error;
pub mod principal;
pub mod registry;
pub mod repository;
pub mod rule;
pub mod shield;

pub use acl::{acl_fn, AclBackend, AclContext, AclQuestion};
pub use config::{load_auth_configs, parse_auth_configs, AuthConfig, RuleDefaults, RuleOverride};
pub use entity::{Entity, Record};
pub use error::{Result, ShieldError};
pub use principal::Principal;
pub use registry::{ShieldOptions, ShieldRegistry};
pub use repository::{Repository, StorageError};
pub use rule::{predicate_fn, Action, GenericRuleOptions, Predicate, Rule};
pub use shield::Shield;
