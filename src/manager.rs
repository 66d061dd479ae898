//! Interceptor manager for many sessions.
//!
//! Keeps one [`InterceptionHandle`] per connected session, keyed by
//! [`SessionId`], and a set of global listeners that every current and
//! future session receives.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │           InterceptorManager             │
//! │  global listeners: [ L1, L2 ]            │
//! │  ┌────────────────────────────────────┐  │
//! │  │ SessionId=a → InterceptionHandle   │  │
//! │  │ SessionId=b → InterceptionHandle   │  │
//! │  └────────────────────────────────────┘  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let manager = InterceptorManager::new(PeerSessionLocator, InterceptConfig::default())?;
//! manager.add_global_listener(Arc::new(AuditLog::default()))?;
//!
//! // On join
//! manager.inject(&session)?;
//! // On quit
//! manager.eject(session.id());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::config::InterceptConfig;
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::intercept::{InterceptionHandle, Listener, ListenerRegistry, PipelineLocator};
use crate::session::Session;

// ============================================================================
// InterceptorManager
// ============================================================================

/// Owns the interception handles of every tapped session.
///
/// Thread-safe; sessions may join and leave from any thread.
pub struct InterceptorManager<M: Send + 'static> {
    /// Resolves a session to its pipeline.
    locator: Arc<dyn PipelineLocator<M>>,

    /// Stage placement for every handle.
    config: InterceptConfig,

    /// Active handles by session ID.
    handles: RwLock<FxHashMap<SessionId, InterceptionHandle<M>>>,

    /// Listeners registered on every handle.
    global: ListenerRegistry<M>,

    /// Shutdown flag.
    shutdown: AtomicBool,
}

// ============================================================================
// InterceptorManager - Constructor
// ============================================================================

impl<M: Send + 'static> InterceptorManager<M> {
    /// Creates a manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` is invalid.
    pub fn new(
        locator: impl PipelineLocator<M> + 'static,
        config: InterceptConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            locator: Arc::new(locator),
            config,
            handles: RwLock::new(FxHashMap::default()),
            global: ListenerRegistry::new(),
            shutdown: AtomicBool::new(false),
        })
    }
}

// ============================================================================
// InterceptorManager - Sessions
// ============================================================================

impl<M: Send + 'static> InterceptorManager<M> {
    /// Attaches a handle to `session` and registers every global listener on it.
    ///
    /// A handle already registered for the same session is detached and
    /// replaced. Injections are serialized, so the handle kept in the
    /// manager is always the one whose stage is in the pipeline.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] after [`shutdown`](Self::shutdown)
    /// - Any attach error from [`InterceptionHandle::attach`]
    pub fn inject<S: Session>(&self, session: &Arc<S>) -> Result<()> {
        if self.is_shutdown() {
            return Err(Error::Closed);
        }

        let previous = {
            let mut handles = self.handles.write();

            // Checked again under the lock so shutdown cannot miss this handle.
            if self.is_shutdown() {
                return Err(Error::Closed);
            }

            // Attaching replaces any stage of the same name, so it must not
            // interleave with another injection of this session.
            let handle =
                InterceptionHandle::attach(session, self.locator.as_ref(), &self.config)?;

            for listener in self.global.snapshot().iter() {
                handle.add_listener(Arc::clone(listener))?;
            }

            handles.insert(handle.session_id(), handle)
        };

        let session_id = session.id();

        if let Some(previous) = previous {
            previous.detach();
            debug!(session = %session_id, "Replaced existing interception handle");
        }

        debug!(session = %session_id, peer = session.name(), "Session injected");
        Ok(())
    }

    /// Detaches and forgets the handle of `session_id`.
    ///
    /// Returns `false` if the session was not injected.
    pub fn eject(&self, session_id: SessionId) -> bool {
        let Some(handle) = self.handles.write().remove(&session_id) else {
            return false;
        };

        handle.detach();
        debug!(session = %session_id, "Session ejected");
        true
    }

    /// Returns `true` if `session_id` has a handle.
    #[inline]
    #[must_use]
    pub fn contains(&self, session_id: SessionId) -> bool {
        self.handles.read().contains_key(&session_id)
    }

    /// Returns the number of tapped sessions.
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.handles.read().len()
    }

    /// Returns the number of listeners on a session's handle.
    #[must_use]
    pub fn listener_count(&self, session_id: SessionId) -> Option<usize> {
        self.handles
            .read()
            .get(&session_id)
            .map(InterceptionHandle::listener_count)
    }
}

// ============================================================================
// InterceptorManager - Listeners
// ============================================================================

impl<M: Send + 'static> InterceptorManager<M> {
    /// Registers a listener on one session only.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionNotFound`] if the session was not injected
    /// - [`Error::Closed`] if its handle was detached
    pub fn add_listener(&self, session_id: SessionId, listener: Arc<dyn Listener<M>>) -> Result<()> {
        let handles = self.handles.read();
        let handle = handles
            .get(&session_id)
            .ok_or_else(|| Error::session_not_found(session_id))?;
        handle.add_listener(listener)
    }

    /// Unregisters a listener from one session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the session was not injected.
    pub fn remove_listener(
        &self,
        session_id: SessionId,
        listener: &Arc<dyn Listener<M>>,
    ) -> Result<bool> {
        let handles = self.handles.read();
        let handle = handles
            .get(&session_id)
            .ok_or_else(|| Error::session_not_found(session_id))?;
        Ok(handle.remove_listener(listener))
    }

    /// Registers a listener on every current and future session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after [`shutdown`](Self::shutdown).
    pub fn add_global_listener(&self, listener: Arc<dyn Listener<M>>) -> Result<()> {
        let handles = self.handles.write();

        self.global.add(Arc::clone(&listener))?;

        for (session_id, handle) in handles.iter() {
            if let Err(e) = handle.add_listener(Arc::clone(&listener)) {
                debug!(
                    error = %e,
                    session = %session_id,
                    "Skipped global listener on detached handle"
                );
            }
        }

        debug!(listener = listener.name(), sessions = handles.len(), "Global listener added");
        Ok(())
    }

    /// Unregisters a global listener from the manager and every session.
    ///
    /// Returns `false` if it was not registered globally.
    pub fn remove_global_listener(&self, listener: &Arc<dyn Listener<M>>) -> bool {
        let handles = self.handles.write();

        if !self.global.remove(listener) {
            return false;
        }

        for handle in handles.values() {
            handle.remove_listener(listener);
        }
        true
    }

    /// Returns the number of global listeners.
    #[inline]
    #[must_use]
    pub fn global_listener_count(&self) -> usize {
        self.global.len()
    }
}

// ============================================================================
// InterceptorManager - Shutdown
// ============================================================================

impl<M: Send + 'static> InterceptorManager<M> {
    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Detaches every handle and rejects further injections.
    pub fn shutdown(&self) {
        let mut handles = self.handles.write();

        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        self.global.seal();

        let count = handles.len();
        for (_, handle) in handles.drain() {
            handle.detach();
        }

        info!(sessions = count, "Interceptor manager shut down");
    }
}

// ============================================================================
// Tests
// ============================================================================
