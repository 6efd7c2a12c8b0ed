//! Entity-to-record translation.
//!
//! A `DataMapper` is stateless per call: every operation receives the
//! executor it should run against, so the same mapper serves reads on the
//! ambient connection and writes inside a flush transaction.

pub mod entity_mapper;

pub use entity_mapper::EntityDataMapper;

use crate::errors::Result;
use crate::identity::Identity;
use crate::provider::Executor;
use crate::query::Filter;
use crate::version::VersionStamp;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Anything the kernel can track: a type with a structural image
pub trait Entity: Serialize + DeserializeOwned + 'static {}

impl<T> Entity for T where T: Serialize + DeserializeOwned + 'static {}

/// An entity rebuilt from a stored row, with the row's version
#[derive(Debug, Clone, PartialEq)]
pub struct Hydrated<E> {
    pub entity: E,
    pub version: VersionStamp,
}

pub trait DataMapper<E> {
    /// Identity-map key for `entity`
    ///
    /// # Errors
    ///
    /// Returns `UowError::Path` when an identity path does not resolve.
    fn identity(&self, entity: &E) -> Result<Identity>;

    /// Store a new row. True iff a row was written.
    ///
    /// # Errors
    ///
    /// Propagates provider and property transform failures.
    fn insert(&self, exec: &dyn Executor, entity: &E, version: &mut VersionStamp) -> Result<bool>;

    /// Rewrite the row matching the entity's identity (and expected version).
    /// True iff a row was written; `version` advances only then.
    ///
    /// # Errors
    ///
    /// Propagates provider and property transform failures.
    fn update(&self, exec: &dyn Executor, entity: &E, version: &mut VersionStamp) -> Result<bool>;

    /// Remove the row matching the entity's identity (and expected version).
    ///
    /// # Errors
    ///
    /// Propagates provider and property transform failures.
    fn delete(&self, exec: &dyn Executor, entity: &E, version: &VersionStamp) -> Result<bool>;

    /// At most one entity matching `filter`
    ///
    /// # Errors
    ///
    /// Propagates provider, transform and hydration failures.
    fn find(&self, exec: &dyn Executor, filter: &Filter) -> Result<Option<Hydrated<E>>>;

    /// Every entity matching `filter`
    ///
    /// # Errors
    ///
    /// Propagates provider, transform and hydration failures.
    fn find_all(&self, exec: &dyn Executor, filter: &Filter) -> Result<Vec<Hydrated<E>>> {
        Ok(self.find(exec, filter)?.into_iter().collect())
    }

    /// The entity stored under `identity`
    ///
    /// # Errors
    ///
    /// Propagates provider, transform and hydration failures.
    fn find_by_identity(&self, exec: &dyn Executor, identity: &Identity) -> Result<Option<Hydrated<E>>>;
}
