//! Synchronous publish/subscribe channels.

use crate::errors::Result;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Listeners of one event, delivered in registration order.
///
/// Delivery iterates a snapshot of the listener list, so a listener may
/// subscribe or unsubscribe others while being called.
pub struct EventChannel<L: ?Sized> {
    name: &'static str,
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, Rc<L>)>>,
}

impl<L: ?Sized> EventChannel<L> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&self, listener: Rc<L>) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Returns whether `id` was subscribed
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    fn snapshot(&self) -> Vec<Rc<L>> {
        self.listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect()
    }

    /// Call every listener, stopping at the first failure
    ///
    /// # Errors
    ///
    /// Returns the first listener error unchanged.
    pub fn dispatch<F>(&self, mut call: F) -> Result<()>
    where
        F: FnMut(&L) -> Result<()>,
    {
        for listener in self.snapshot() {
            call(&listener)?;
        }
        Ok(())
    }

    /// Call every listener; failures are logged and swallowed
    pub fn notify<F>(&self, mut call: F)
    where
        F: FnMut(&L) -> Result<()>,
    {
        for listener in self.snapshot() {
            if let Err(err) = call(&listener) {
                warn!(
                    channel = self.name,
                    err.code = err.code(),
                    error = %err,
                    "listener failed; continuing"
                );
            }
        }
    }
}

impl<L: ?Sized> fmt::Debug for EventChannel<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("listeners", &self.len())
            .finish()
    }
}
