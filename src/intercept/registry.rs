//! Ordered listener registry.
//!
//! The registry is copy-on-write: [`ListenerRegistry::snapshot`] clones a
//! single `Arc`, and every mutation swaps in a new list. A dispatch keeps
//! iterating its own snapshot even if a listener adds or removes listeners
//! (itself included) from inside its callback.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};

use super::listener::{Listener, same_listener};

// ============================================================================
// Types
// ============================================================================

/// Immutable view of the registered listeners, in dispatch order.
pub type Snapshot<M> = Arc<Vec<Arc<dyn Listener<M>>>>;

struct RegistryState<M> {
    listeners: Snapshot<M>,
    sealed: bool,
}

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Ordered collection of listeners attached to one interception handle.
///
/// Insertion order is dispatch order. The same listener may be registered
/// more than once and is then called once per registration.
pub struct ListenerRegistry<M> {
    state: Mutex<RegistryState<M>>,
}

impl<M> Default for ListenerRegistry<M> {
    fn default() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                listeners: Arc::new(Vec::new()),
                sealed: false,
            }),
        }
    }
}

impl<M> ListenerRegistry<M> {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the registry was sealed.
    pub fn add(&self, listener: Arc<dyn Listener<M>>) -> Result<()> {
        let mut state = self.state.lock();
        if state.sealed {
            return Err(Error::Closed);
        }

        let mut listeners = Vec::with_capacity(state.listeners.len() + 1);
        listeners.extend(state.listeners.iter().cloned());
        listeners.push(listener);
        state.listeners = Arc::new(listeners);
        Ok(())
    }

    /// Removes the first registration of this listener instance.
    ///
    /// Returns `false` if it was not registered.
    pub fn remove(&self, listener: &Arc<dyn Listener<M>>) -> bool {
        let mut state = self.state.lock();

        let Some(index) = state
            .listeners
            .iter()
            .position(|l| same_listener(l, listener))
        else {
            return false;
        };

        let mut listeners: Vec<_> = state.listeners.iter().cloned().collect();
        listeners.remove(index);
        state.listeners = Arc::new(listeners);
        true
    }

    /// Returns the current listeners for one dispatch.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<M> {
        Arc::clone(&self.state.lock().listeners)
    }

    /// Returns the number of registrations.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Returns `true` if no listener is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`seal`](Self::seal) was called.
    #[inline]
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.state.lock().sealed
    }

    /// Removes every listener and rejects all future additions.
    pub fn seal(&self) {
        let mut state = self.state.lock();
        state.sealed = true;
        state.listeners = Arc::new(Vec::new());
    }
}

// ============================================================================
// Tests
// ============================================================================
