//! The guarded operations: read, read_all, create, update, delete.
//!
//! Every operation resolves the rules for its action, evaluates all of them
//! concurrently against one (entity, principal) pair and only forwards to the
//! raw primitive when every rule passed. Rules are never short-circuited:
//! all of them run to completion and the first failure in registration
//! order is reported.

use super::Shield;
use crate::entity::Entity;
use crate::error::{Result, ShieldError};
use crate::principal::Principal;
use crate::repository::Repository;
use crate::rule::{Action, Rule};
use futures::future::join_all;
use tracing::debug;

/// Proof that every rule of `action` passed for one call.
struct Clearance {
    action: Action,
}

/// The persisted version of a record, loaded through a guarded read.
struct Authoritative<E>(E);

async fn apply_rules<E: Entity>(
    rules: &[&Rule<E>],
    entity: &E,
    principal: &Principal,
) -> Result<()> {
    let outcomes = join_all(rules.iter().map(|rule| rule.apply(entity, principal))).await;
    outcomes
        .into_iter()
        .try_for_each(|outcome| outcome.map_err(ShieldError::into_denial))
}

impl<R: Repository> Shield<R> {
    /// Only records of the guarded model may pass through this shield.
    fn check_model(&self, entity: &R::Entity) -> Result<()> {
        if entity.model_name() != self.model_name {
            return Err(ShieldError::configuration(format!(
                "Shield for {} cannot guard a {} record",
                self.model_name,
                entity.model_name()
            )));
        }
        Ok(())
    }

    async fn clear(
        &self,
        action: Action,
        rules: &[&Rule<R::Entity>],
        entity: &R::Entity,
        principal: &Principal,
    ) -> Result<Clearance> {
        debug!(
            model = %self.model_name,
            action = %action,
            principal = %principal,
            rules = rules.len(),
            "Evaluating rules"
        );
        apply_rules(rules, entity, principal).await?;
        Ok(Clearance { action })
    }

    /// Re-fetch the stored version of `entity` through a guarded read, so
    /// the caller needs read permission on the record as it is persisted.
    async fn load_authoritative_record(
        &self,
        entity: &R::Entity,
        principal: &Principal,
    ) -> Result<Authoritative<R::Entity>> {
        let key = entity
            .primary_key()
            .ok_or_else(|| ShieldError::state("record has no primary key"))?;
        let lookup = entity.keyed(key);
        let record = self.read(&lookup, principal, &R::Options::default()).await?;
        Ok(Authoritative(record))
    }

    async fn commit_save(
        &self,
        clearance: Clearance,
        entity: &R::Entity,
        options: &R::Options,
    ) -> Result<R::Entity> {
        debug!(model = %self.model_name, action = %clearance.action, "Committing save");
        self.repo.save(entity, options).await
    }

    async fn commit_destroy(
        &self,
        clearance: Clearance,
        entity: &R::Entity,
        options: &R::Options,
    ) -> Result<()> {
        debug!(model = %self.model_name, action = %clearance.action, "Committing destroy");
        self.repo.destroy(entity, options).await
    }

    /// Fetch a record, then check the read rules against what was fetched.
    /// Nothing is returned unless every rule passes.
    pub async fn read(
        &self,
        entity: &R::Entity,
        principal: &Principal,
        options: &R::Options,
    ) -> Result<R::Entity> {
        self.check_model(entity)?;
        let rules = self.applicable_rules(&Action::Read)?;
        let record = self.repo.fetch(entity, options).await?;
        self.clear(Action::Read, &rules, &record, principal).await?;
        Ok(record)
    }

    /// Fetch every record matching `filter`; each one must pass every read
    /// rule for the collection to be returned.
    pub async fn read_all(
        &self,
        filter: &R::Entity,
        principal: &Principal,
        options: &R::Options,
    ) -> Result<Vec<R::Entity>> {
        self.check_model(filter)?;
        let rules = self.applicable_rules(&Action::Read)?;
        let collection = self.repo.fetch_all(filter, options).await?;
        debug!(
            model = %self.model_name,
            principal = %principal,
            records = collection.len(),
            "Evaluating read rules for collection"
        );

        let checks = collection
            .iter()
            .map(|record| apply_rules(&rules, record, principal));
        join_all(checks).await.into_iter().collect::<Result<()>>()?;
        Ok(collection)
    }

    /// Persist a new record. Rejected before any rule runs when the record
    /// already has an identity.
    pub async fn create(
        &self,
        entity: &R::Entity,
        principal: &Principal,
        options: &R::Options,
    ) -> Result<R::Entity> {
        self.check_model(entity)?;
        if !entity.is_new() {
            return Err(ShieldError::state("attempt to create a record that exists"));
        }

        let rules = self.applicable_rules(&Action::Create)?;
        let clearance = self.clear(Action::Create, &rules, entity, principal).await?;
        self.commit_save(clearance, entity, options).await
    }

    /// Save changes to a persisted record.
    ///
    /// The update rules are checked against the stored record, not against
    /// the caller's modified copy, and read permission is required as well.
    /// The record can still change between that check and the save.
    pub async fn update(
        &self,
        entity: &R::Entity,
        principal: &Principal,
        options: &R::Options,
    ) -> Result<R::Entity> {
        self.check_model(entity)?;
        if entity.is_new() {
            return Err(ShieldError::state("attempt to update a new record"));
        }

        let rules = self.applicable_rules(&Action::Update)?;
        let Authoritative(original) = self.load_authoritative_record(entity, principal).await?;
        let clearance = self.clear(Action::Update, &rules, &original, principal).await?;
        self.commit_save(clearance, entity, options).await
    }

    /// Destroy a persisted record. Same protocol as [`Shield::update`].
    pub async fn delete(
        &self,
        entity: &R::Entity,
        principal: &Principal,
        options: &R::Options,
    ) -> Result<()> {
        self.check_model(entity)?;
        if entity.is_new() {
            return Err(ShieldError::state("attempt to delete a new record"));
        }

        let rules = self.applicable_rules(&Action::Delete)?;
        let Authoritative(original) = self.load_authoritative_record(entity, principal).await?;
        let clearance = self.clear(Action::Delete, &rules, &original, principal).await?;
        self.commit_destroy(clearance, entity, options).await
    }

    /// Evaluate the rules of any action without touching persistence.
    pub async fn authorize(
        &self,
        action: impl Into<Action>,
        entity: &R::Entity,
        principal: &Principal,
    ) -> Result<()> {
        self.check_model(entity)?;
        let action = action.into();
        let rules = self.applicable_rules(&action)?;
        self.clear(action, &rules, entity, principal).await?;
        Ok(())
    }
}
