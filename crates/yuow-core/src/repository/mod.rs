//! Identity-mapped repositories.
//!
//! A repository tracks entities, answers lookups from its identity map
//! before the store, and writes the tracked changes when its transaction
//! flushes.

pub mod identity_map;

pub use identity_map::{track, EntityState, EntityWrapper, IdentityMap, Tracked};

use crate::errors::{PersistenceError, PersistenceOperation, Result};
use crate::events::{EventChannel, ListenerId};
use crate::identity::Identity;
use crate::mapper::{DataMapper, Entity, Hydrated};
use crate::provider::Executor;
use crate::query::Filter;
use crate::state::SharedState;
use crate::transaction::Transaction;
use crate::version::VersionStamp;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, warn};

/// Builds the mapper and name for a repository
pub trait RepositoryConstructor<E> {
    type Mapper: DataMapper<E> + 'static;

    fn repository_name(&self) -> &str;

    fn data_mapper(&self) -> Self::Mapper;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryEventKind {
    Inserted,
    Updated,
    Deleted,
}

/// Delivered to repository listeners after a successful flush write
pub struct RepositoryEvent<'a, E, S> {
    pub kind: RepositoryEventKind,
    pub entity: &'a Tracked<E>,
    pub state: &'a SharedState<S>,
}

pub type RepositoryListener<E, S> = dyn Fn(&RepositoryEvent<'_, E, S>) -> Result<()>;

enum FlushAction {
    Insert,
    Update,
    Delete,
}

impl FlushAction {
    fn operation(&self) -> PersistenceOperation {
        match self {
            FlushAction::Insert => PersistenceOperation::Insert,
            FlushAction::Update => PersistenceOperation::Update,
            FlushAction::Delete => PersistenceOperation::Delete,
        }
    }
}

/// State shared between a repository handle and its flush handler
struct RepositoryInner<E, M, S> {
    name: String,
    mapper: M,
    identity_map: RefCell<IdentityMap<E>>,
    inserted: EventChannel<RepositoryListener<E, S>>,
    updated: EventChannel<RepositoryListener<E, S>>,
    deleted: EventChannel<RepositoryListener<E, S>>,
    state: SharedState<S>,
}

fn snapshot_of<E: Entity>(entity: &Tracked<E>) -> Result<Value> {
    Ok(serde_json::to_value(&*entity.borrow())?)
}

impl<E: Entity, M: DataMapper<E>, S: 'static> RepositoryInner<E, M, S> {
    fn channel(&self, kind: RepositoryEventKind) -> &EventChannel<RepositoryListener<E, S>> {
        match kind {
            RepositoryEventKind::Inserted => &self.inserted,
            RepositoryEventKind::Updated => &self.updated,
            RepositoryEventKind::Deleted => &self.deleted,
        }
    }

    fn emit(&self, kind: RepositoryEventKind, entity: &Tracked<E>) {
        let event = RepositoryEvent {
            kind,
            entity,
            state: &self.state,
        };
        self.channel(kind).notify(|listener| listener(&event));
    }

    fn identity_key(&self, entity: &Tracked<E>) -> Result<(Identity, String)> {
        let identity = self.mapper.identity(&entity.borrow())?;
        let key = identity.key();
        Ok((identity, key))
    }

    /// Decide what a wrapper needs, taking a fresh snapshot for dirty checks
    fn pending_action(&self, key: &str) -> Result<Option<(FlushAction, Tracked<E>, VersionStamp, Identity)>> {
        let map = self.identity_map.borrow();
        let Some(wrapper) = map.get(key) else {
            return Ok(None);
        };
        let action = match wrapper.state {
            EntityState::Created => FlushAction::Insert,
            EntityState::Deleted => FlushAction::Delete,
            EntityState::Persisted => {
                if snapshot_of(&wrapper.entity)? == wrapper.snapshot {
                    return Ok(None);
                }
                FlushAction::Update
            }
        };
        Ok(Some((
            action,
            Rc::clone(&wrapper.entity),
            wrapper.version,
            wrapper.identity.clone(),
        )))
    }

    /// Write every pending change, in tracking order
    fn flush(&self, exec: &dyn Executor) -> Result<()> {
        let keys = self.identity_map.borrow().keys();
        for key in keys {
            let Some((action, entity, mut version, identity)) = self.pending_action(&key)? else {
                continue;
            };

            let written = match action {
                FlushAction::Insert => self.mapper.insert(exec, &entity.borrow(), &mut version)?,
                FlushAction::Update => self.mapper.update(exec, &entity.borrow(), &mut version)?,
                FlushAction::Delete => self.mapper.delete(exec, &entity.borrow(), &version)?,
            };
            let operation = action.operation();
            if !written {
                warn!(
                    repository = %self.name,
                    identity = %identity,
                    operation = %operation,
                    "flush write affected no rows"
                );
                return Err(PersistenceError {
                    repository: self.name.clone(),
                    identity: identity.to_string(),
                    operation,
                }
                .into());
            }
            debug!(
                repository = %self.name,
                identity = %identity,
                operation = %operation,
                version = version.current(),
                "flush write"
            );

            let kind = match action {
                FlushAction::Delete => {
                    self.identity_map.borrow_mut().remove(&key);
                    RepositoryEventKind::Deleted
                }
                FlushAction::Insert | FlushAction::Update => {
                    let snapshot = snapshot_of(&entity)?;
                    if let Some(wrapper) = self.identity_map.borrow_mut().get_mut(&key) {
                        wrapper.state = EntityState::Persisted;
                        wrapper.snapshot = snapshot;
                        wrapper.version = version;
                    }
                    match action {
                        FlushAction::Insert => RepositoryEventKind::Inserted,
                        _ => RepositoryEventKind::Updated,
                    }
                }
            };
            self.emit(kind, &entity);
        }
        Ok(())
    }

    /// Track a loaded entity, or hand back the already tracked instance.
    /// Entities pending deletion are hidden.
    fn track_loaded(&self, hydrated: Hydrated<E>) -> Result<Option<Tracked<E>>> {
        let identity = self.mapper.identity(&hydrated.entity)?;
        let key = identity.key();
        let mut map = self.identity_map.borrow_mut();
        if let Some(existing) = map.get(&key) {
            return Ok(match existing.state {
                EntityState::Deleted => None,
                EntityState::Created | EntityState::Persisted => Some(Rc::clone(&existing.entity)),
            });
        }

        let snapshot = serde_json::to_value(&hydrated.entity)?;
        let entity = track(hydrated.entity);
        map.insert(
            key,
            EntityWrapper {
                entity: Rc::clone(&entity),
                identity,
                state: EntityState::Persisted,
                snapshot,
                version: hydrated.version,
            },
        );
        Ok(Some(entity))
    }
}

/// Repository bound to one transaction
pub struct Repository<'t, E, M, S> {
    tx: &'t dyn Transaction<S>,
    inner: Rc<RepositoryInner<E, M, S>>,
}

impl<'t, E, M, S> Repository<'t, E, M, S>
where
    E: Entity,
    M: DataMapper<E> + 'static,
    S: 'static,
{
    /// Build a repository and register its flush handler on `tx`
    pub fn new(tx: &'t dyn Transaction<S>, name: impl Into<String>, mapper: M) -> Self {
        let inner = Rc::new(RepositoryInner {
            name: name.into(),
            mapper,
            identity_map: RefCell::new(IdentityMap::new()),
            inserted: EventChannel::new("inserted"),
            updated: EventChannel::new("updated"),
            deleted: EventChannel::new("deleted"),
            state: tx.state().clone(),
        });

        let handler = Rc::clone(&inner);
        tx.events().flush.subscribe(Rc::new(move |exec: &dyn Executor| {
            let start = Instant::now();
            let outcome = handler.flush(exec);
            debug!(
                repository = %handler.name,
                ok = outcome.is_ok(),
                duration_ms = start.elapsed().as_millis() as u64,
                "repository flushed"
            );
            outcome
        }));

        Self { tx, inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of tracked entities, including those pending deletion
    pub fn len(&self) -> usize {
        self.inner.identity_map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lifecycle state of this exact instance, if it is tracked
    pub fn state_of(&self, entity: &Tracked<E>) -> Option<EntityState> {
        self.inner
            .identity_map
            .borrow()
            .iter()
            .find(|(_, wrapper)| Rc::ptr_eq(&wrapper.entity, entity))
            .map(|(_, wrapper)| wrapper.state)
    }

    /// Version stamp of this exact instance, if it is tracked
    pub fn version_of(&self, entity: &Tracked<E>) -> Option<u64> {
        self.inner
            .identity_map
            .borrow()
            .iter()
            .find(|(_, wrapper)| Rc::ptr_eq(&wrapper.entity, entity))
            .map(|(_, wrapper)| wrapper.version.current())
    }

    /// Track a new entity for insertion.
    ///
    /// Returns false, without tracking, when an entity with the same identity
    /// is already tracked.
    ///
    /// # Errors
    ///
    /// Returns `UowError::Path` or `UowError::Serialization` when the
    /// identity or snapshot cannot be taken.
    pub fn add(&self, entity: &Tracked<E>) -> Result<bool> {
        let (identity, key) = self.inner.identity_key(entity)?;
        if self.inner.identity_map.borrow().contains(&key) {
            debug!(repository = %self.inner.name, identity = %identity, "duplicate add ignored");
            return Ok(false);
        }
        let snapshot = snapshot_of(entity)?;
        Ok(self.inner.identity_map.borrow_mut().insert(
            key,
            EntityWrapper {
                entity: Rc::clone(entity),
                identity,
                state: EntityState::Created,
                snapshot,
                version: VersionStamp::new(),
            },
        ))
    }

    /// Schedule the entity's row for deletion at the next flush.
    ///
    /// A created-but-unflushed entity is simply dropped from tracking.
    /// An untracked entity becomes tracked as deleted. Returns whether the
    /// identity was tracked before the call.
    ///
    /// # Errors
    ///
    /// Returns `UowError::Path` or `UowError::Serialization` when the
    /// identity or snapshot cannot be taken.
    pub fn delete(&self, entity: &Tracked<E>) -> Result<bool> {
        let (identity, key) = self.inner.identity_key(entity)?;
        let mut map = self.inner.identity_map.borrow_mut();
        let Some(state) = map.get(&key).map(|wrapper| wrapper.state) else {
            let snapshot = snapshot_of(entity)?;
            map.insert(
                key,
                EntityWrapper {
                    entity: Rc::clone(entity),
                    identity,
                    state: EntityState::Deleted,
                    snapshot,
                    version: VersionStamp::new(),
                },
            );
            return Ok(false);
        };

        match state {
            EntityState::Created => {
                map.remove(&key);
            }
            EntityState::Persisted => {
                if let Some(wrapper) = map.get_mut(&key) {
                    wrapper.state = EntityState::Deleted;
                }
            }
            EntityState::Deleted => {}
        }
        Ok(true)
    }

    /// Stop tracking the entity immediately; nothing is written for it.
    /// Returns whether it was tracked.
    ///
    /// # Errors
    ///
    /// Returns `UowError::Path` when the identity cannot be extracted.
    pub fn detach(&self, entity: &Tracked<E>) -> Result<bool> {
        let (_, key) = self.inner.identity_key(entity)?;
        Ok(self.inner.identity_map.borrow_mut().remove(&key).is_some())
    }

    /// First entity matching `filter`
    ///
    /// # Errors
    ///
    /// Propagates provider, mapping and `TransactionClosed` errors.
    pub fn find_one(&self, filter: Filter) -> Result<Option<Tracked<E>>> {
        let exec = self.tx.executor()?;
        let hides_deleted = self
            .inner
            .identity_map
            .borrow()
            .iter()
            .any(|(_, wrapper)| wrapper.state == EntityState::Deleted);
        if !hides_deleted {
            return match self.inner.mapper.find(exec, &filter)? {
                Some(hydrated) => self.inner.track_loaded(hydrated),
                None => Ok(None),
            };
        }

        // A pending delete may shadow the first row; scan past it
        for hydrated in self.inner.mapper.find_all(exec, &filter)? {
            if let Some(entity) = self.inner.track_loaded(hydrated)? {
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }

    /// Every entity matching `filter`
    ///
    /// # Errors
    ///
    /// Propagates provider, mapping and `TransactionClosed` errors.
    pub fn find(&self, filter: Filter) -> Result<Vec<Tracked<E>>> {
        let exec = self.tx.executor()?;
        let mut found = Vec::new();
        for hydrated in self.inner.mapper.find_all(exec, &filter)? {
            if let Some(entity) = self.inner.track_loaded(hydrated)? {
                found.push(entity);
            }
        }
        Ok(found)
    }

    /// Entity stored under `identity`; tracked entities are answered
    /// without touching the store
    ///
    /// # Errors
    ///
    /// Propagates provider, mapping and `TransactionClosed` errors.
    pub fn find_by_identity(&self, identity: impl Into<Identity>) -> Result<Option<Tracked<E>>> {
        let identity = identity.into();
        if let Some(wrapper) = self.inner.identity_map.borrow().get(&identity.key()) {
            return Ok(match wrapper.state {
                EntityState::Deleted => None,
                EntityState::Created | EntityState::Persisted => Some(Rc::clone(&wrapper.entity)),
            });
        }
        let exec = self.tx.executor()?;
        match self.inner.mapper.find_by_identity(exec, &identity)? {
            Some(hydrated) => self.inner.track_loaded(hydrated),
            None => Ok(None),
        }
    }

    /// Listen for successful flush writes of one kind
    pub fn on<F>(&self, kind: RepositoryEventKind, listener: F) -> ListenerId
    where
        F: Fn(&RepositoryEvent<'_, E, S>) -> Result<()> + 'static,
    {
        self.inner.channel(kind).subscribe(Rc::new(listener))
    }

    /// Returns whether `id` was subscribed to `kind`
    pub fn off(&self, kind: RepositoryEventKind, id: ListenerId) -> bool {
        self.inner.channel(kind).unsubscribe(id)
    }
}

impl<E, M, S> std::fmt::Debug for Repository<'_, E, M, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.inner.name)
            .field("tracked", &self.inner.identity_map.borrow().len())
            .finish()
    }
}
