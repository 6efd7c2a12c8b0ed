//! Caller-supplied state threaded through one transaction.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Shared handle to a transaction's state payload
pub struct SharedState<S>(Rc<RefCell<S>>);

impl<S> SharedState<S> {
    pub fn new(state: S) -> Self {
        Self(Rc::new(RefCell::new(state)))
    }

    /// # Panics
    ///
    /// Panics if the state is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, S> {
        self.0.borrow()
    }

    /// # Panics
    ///
    /// Panics if the state is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, S> {
        self.0.borrow_mut()
    }

    pub fn replace(&self, state: S) -> S {
        self.0.replace(state)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl<S: Clone> SharedState<S> {
    pub fn get(&self) -> S {
        self.0.borrow().clone()
    }
}

impl<S> Clone for SharedState<S> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<S: fmt::Debug> fmt::Debug for SharedState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedState").field(&self.0.borrow()).finish()
    }
}
