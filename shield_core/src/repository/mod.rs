//! The raw persistence contract a shield wraps.

mod error;

pub use error::StorageError;

use crate::entity::Entity;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Raw, unguarded persistence primitives for one entity type.
///
/// Once a repository is handed to a [`Shield`](crate::Shield) these methods
/// are only reachable through the shield's guarded operations.
#[async_trait]
pub trait Repository: Send + Sync {
    type Entity: Entity;
    type Options: Default + Send + Sync;

    /// Load the persisted record matching `entity`'s key.
    async fn fetch(&self, entity: &Self::Entity, options: &Self::Options) -> Result<Self::Entity>;

    /// Load every persisted record matching `filter`.
    async fn fetch_all(
        &self,
        filter: &Self::Entity,
        options: &Self::Options,
    ) -> Result<Vec<Self::Entity>>;

    /// Insert or update `entity`, returning the stored version.
    async fn save(&self, entity: &Self::Entity, options: &Self::Options) -> Result<Self::Entity>;

    async fn destroy(&self, entity: &Self::Entity, options: &Self::Options) -> Result<()>;

    /// Whether this repository already sits behind a shield.
    fn is_guarded(&self) -> bool {
        false
    }
}

#[async_trait]
impl<R: Repository + ?Sized> Repository for Arc<R> {
    type Entity = R::Entity;
    type Options = R::Options;

    async fn fetch(&self, entity: &Self::Entity, options: &Self::Options) -> Result<Self::Entity> {
        (**self).fetch(entity, options).await
    }

    async fn fetch_all(
        &self,
        filter: &Self::Entity,
        options: &Self::Options,
    ) -> Result<Vec<Self::Entity>> {
        (**self).fetch_all(filter, options).await
    }

    async fn save(&self, entity: &Self::Entity, options: &Self::Options) -> Result<Self::Entity> {
        (**self).save(entity, options).await
    }

    async fn destroy(&self, entity: &Self::Entity, options: &Self::Options) -> Result<()> {
        (**self).destroy(entity, options).await
    }

    fn is_guarded(&self) -> bool {
        (**self).is_guarded()
    }
}

#[async_trait]
impl<R: Repository + ?Sized> Repository for Box<R> {
    type Entity = R::Entity;
    type Options = R::Options;

    async fn fetch(&self, entity: &Self::Entity, options: &Self::Options) -> Result<Self::Entity> {
        (**self).fetch(entity, options).await
    }

    async fn fetch_all(
        &self,
        filter: &Self::Entity,
        options: &Self::Options,
    ) -> Result<Vec<Self::Entity>> {
        (**self).fetch_all(filter, options).await
    }

    async fn save(&self, entity: &Self::Entity, options: &Self::Options) -> Result<Self::Entity> {
        (**self).save(entity, options).await
    }

    async fn destroy(&self, entity: &Self::Entity, options: &Self::Options) -> Result<()> {
        (**self).destroy(entity, options).await
    }

    fn is_guarded(&self) -> bool {
        (**self).is_guarded()
    }
}
