use crate::identity::Identity;
use crate::version::VersionStamp;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Entity handle shared between the caller and the identity map
pub type Tracked<E> = Rc<RefCell<E>>;

/// Wrap a fresh entity for tracking
pub fn track<E>(entity: E) -> Tracked<E> {
    Rc::new(RefCell::new(entity))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Added, no row yet
    Created,
    /// Matches a stored row as of the last snapshot
    Persisted,
    /// Row is removed at the next flush
    Deleted,
}

pub struct EntityWrapper<E> {
    pub entity: Tracked<E>,
    pub identity: Identity,
    pub state: EntityState,
    pub snapshot: Value,
    pub version: VersionStamp,
}

/// Tracked entities keyed by canonical identity, in insertion order
pub struct IdentityMap<E> {
    order: Vec<String>,
    entries: HashMap<String, EntityWrapper<E>>,
}

impl<E> Default for IdentityMap<E> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }
}

impl<E> IdentityMap<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&EntityWrapper<E>> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut EntityWrapper<E>> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Track `wrapper` under `key` unless the key is taken.
    /// Returns whether it was inserted.
    pub fn insert(&mut self, key: String, wrapper: EntityWrapper<E>) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.order.push(key.clone());
        self.entries.insert(key, wrapper);
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<EntityWrapper<E>> {
        let removed = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(removed)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityWrapper<E>)> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key).map(|w| (key.as_str(), w)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wrapper(name: &str) -> EntityWrapper<String> {
        EntityWrapper {
            entity: track(name.to_string()),
            identity: Identity::from(name),
            state: EntityState::Created,
            snapshot: json!(name),
            version: VersionStamp::new(),
        }
    }

    #[test]
    fn test_insert_keeps_first() {
        let mut map = IdentityMap::new();
        assert!(map.insert("a".into(), wrapper("a")));
        assert!(!map.insert("a".into(), wrapper("other")));
        assert_eq!(*map.get("a").unwrap().entity.borrow(), "a");
    }

    #[test]
    fn test_order_survives_removal() {
        let mut map = IdentityMap::new();
        for key in ["c", "a", "b"] {
            map.insert(key.into(), wrapper(key));
        }
        map.remove("a");
        map.insert("a".into(), wrapper("a"));

        assert_eq!(map.keys(), vec!["c", "b", "a"]);
        assert_eq!(map.iter().count(), 3);
    }
}
