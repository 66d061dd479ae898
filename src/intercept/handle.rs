//! Interception handle.
//!
//! An [`InterceptionHandle`] taps one connection. Attaching inserts a named
//! stage right before the host's terminal stage, so every inbound message
//! is observed before host logic sees it and every outbound message is
//! observed on its way out. Each observed message is wrapped in an
//! [`InterceptedMessage`], handed to every listener in registration order,
//! and forwarded unless a listener cancelled it.
//!
//! # Lifecycle
//!
//! 1. `attach` - Locate the pipeline and insert the stage (fails loudly)
//! 2. `add_listener` / `remove_listener` - Any thread, any time before detach
//! 3. Dispatch - Synchronous, on the connection loop
//! 4. `detach` - Clears state immediately, removes the stage on the loop
//!
//! Dropping a handle detaches it.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::InterceptConfig;
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::session::Session;
use crate::transport::{Flow, Pipeline, Stage};

use super::listener::Listener;
use super::locator::PipelineLocator;
use super::message::{Direction, InterceptedMessage};
use super::registry::ListenerRegistry;

// ============================================================================
// Interceptor
// ============================================================================

/// State shared between the handle and the pipeline stage.
struct Interceptor<M> {
    /// Name the stage is registered under.
    stage_name: String,
    /// Owning session, kept for log context after the session is gone.
    session_id: SessionId,
    /// Set once by `detach`.
    closed: AtomicBool,
    /// Registered listeners.
    listeners: ListenerRegistry<M>,
    /// Non-owning reference to the peer.
    session: Mutex<Option<Weak<dyn Session>>>,
    /// Non-owning reference to the pipeline the stage lives in, between
    /// attach and detach. The pipeline owns the stage, not the other way.
    pipeline: Mutex<Option<Weak<dyn Pipeline<M>>>>,
    /// Listener callbacks that returned an error or panicked.
    failures: AtomicU64,
}

impl<M> Interceptor<M> {
    fn session(&self) -> Option<Arc<dyn Session>> {
        self.session.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Delivers one message to every listener and decides whether it moves on.
    fn dispatch(&self, direction: Direction, payload: M) -> Flow<M> {
        if self.closed.load(Ordering::Acquire) {
            return Flow::Continue(payload);
        }

        let listeners = self.listeners.snapshot();
        if listeners.is_empty() {
            return Flow::Continue(payload);
        }

        let mut message = InterceptedMessage::new(payload, direction, self.session());

        for listener in listeners.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match direction {
                Direction::Outbound => listener.on_send(&mut message),
                Direction::Inbound => listener.on_receive(&mut message),
            }));

            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                listener = listener.name(),
                %direction,
                session = %self.session_id,
                error = %failure,
                "Listener failed, message flow continues"
            );
        }

        if message.is_cancelled() {
            trace!(%direction, session = %self.session_id, "Message cancelled by listener");
            Flow::Stop
        } else {
            Flow::Continue(message.into_payload())
        }
    }
}

impl<M: Send + 'static> Stage<M> for Interceptor<M> {
    fn inbound(&self, message: M) -> Flow<M> {
        self.dispatch(Direction::Inbound, message)
    }

    fn outbound(&self, message: M) -> Flow<M> {
        self.dispatch(Direction::Outbound, message)
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

// ============================================================================
// InterceptionHandle
// ============================================================================

/// Interception stage attached to one connection's pipeline.
///
/// # Thread Safety
///
/// `InterceptionHandle` is `Send + Sync`. Listener registration and
/// [`detach`](Self::detach) may be called from any thread; dispatch always
/// runs on the connection loop.
pub struct InterceptionHandle<M: Send + 'static> {
    inner: Arc<Interceptor<M>>,
}

// ============================================================================
// InterceptionHandle - Constructors
// ============================================================================

impl<M: Send + 'static> InterceptionHandle<M> {
    /// Attaches to `session` with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`attach`](Self::attach).
    pub fn new<S, L>(session: &Arc<S>, locator: &L) -> Result<Self>
    where
        S: Session,
        L: PipelineLocator<M> + ?Sized,
    {
        Self::attach(session, locator, &InterceptConfig::default())
    }

    /// Locates the session's pipeline and inserts the interception stage
    /// before `config.anchor`.
    ///
    /// A stage already registered as `config.stage_name` (left behind by a
    /// handle that never detached) is removed first.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `config` is invalid
    /// - [`Error::Attach`] if the locator cannot resolve the pipeline
    /// - [`Error::StageNotFound`] if the anchor stage does not exist
    ///
    /// On error nothing is left inserted in the pipeline.
    pub fn attach<S, L>(session: &Arc<S>, locator: &L, config: &InterceptConfig) -> Result<Self>
    where
        S: Session,
        L: PipelineLocator<M> + ?Sized,
    {
        config.validate()?;

        let pipeline = locator.locate(session.as_ref())?;
        let session_ref: Weak<S> = Arc::downgrade(session);

        let inner = Arc::new(Interceptor {
            stage_name: config.stage_name.clone(),
            session_id: session.id(),
            closed: AtomicBool::new(false),
            listeners: ListenerRegistry::new(),
            session: Mutex::new(Some(session_ref as Weak<dyn Session>)),
            pipeline: Mutex::new(None),
            failures: AtomicU64::new(0),
        });

        if pipeline.remove(&config.stage_name).is_some() {
            debug!(
                stage = %config.stage_name,
                session = %session.id(),
                "Removed stale interception stage"
            );
        }

        let stage: Arc<dyn Stage<M>> = Arc::clone(&inner) as Arc<dyn Stage<M>>;
        pipeline.add_before(&config.anchor, &config.stage_name, stage)?;

        *inner.pipeline.lock() = Some(Arc::downgrade(&pipeline));

        debug!(
            stage = %config.stage_name,
            anchor = %config.anchor,
            session = %session.id(),
            peer = session.name(),
            "Interception stage attached"
        );

        Ok(Self { inner })
    }
}

// ============================================================================
// InterceptionHandle - Public API
// ============================================================================

impl<M: Send + 'static> InterceptionHandle<M> {
    /// Registers a listener at the end of the dispatch order.
    ///
    /// A message already being dispatched does not see the new listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the handle was detached.
    pub fn add_listener(&self, listener: Arc<dyn Listener<M>>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.inner.listeners.add(listener)
    }

    /// Unregisters the first registration of this listener instance.
    ///
    /// Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn Listener<M>>) -> bool {
        self.inner.listeners.remove(listener)
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Returns how many listener callbacks failed so far.
    #[inline]
    #[must_use]
    pub fn listener_failures(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }

    /// Returns `true` once the handle was detached.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns the ID of the session this handle was attached for.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.inner.session_id
    }

    /// Returns the session, if it is still alive and the handle is attached.
    #[must_use]
    pub fn session(&self) -> Option<Arc<dyn Session>> {
        self.inner.session()
    }

    /// Returns the name the stage is registered under.
    #[inline]
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.inner.stage_name
    }

    /// Detaches from the pipeline.
    ///
    /// Listeners and the session reference are released immediately on the
    /// calling thread. Removing the stage is submitted to the connection
    /// loop, so it never races with a read or write in progress. If the
    /// pipeline is already gone there is nothing to remove. Calling this
    /// again is a no-op.
    pub fn detach(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.inner.listeners.seal();
        *self.inner.session.lock() = None;

        let Some(pipeline_ref) = self.inner.pipeline.lock().take() else {
            return;
        };

        let Some(pipeline) = pipeline_ref.upgrade() else {
            debug!(session = %self.inner.session_id, "Pipeline dropped, nothing to remove");
            return;
        };

        if !pipeline.is_open() {
            debug!(session = %self.inner.session_id, "Pipeline already closed, nothing to remove");
            return;
        }

        let stage: Arc<dyn Stage<M>> = Arc::clone(&self.inner) as Arc<dyn Stage<M>>;
        let target = pipeline_ref;
        let stage_name = self.inner.stage_name.clone();
        let session_id = self.inner.session_id;

        let scheduled = pipeline.execute(Box::new(move || {
            let Some(target) = target.upgrade() else {
                return;
            };
            if target.remove_stage(&stage) {
                debug!(stage = %stage_name, session = %session_id, "Interception stage detached");
            }
        }));

        if let Err(e) = scheduled {
            warn!(
                error = %e,
                session = %self.inner.session_id,
                "Failed to schedule interception stage removal"
            );
        }
    }
}

impl<M: Send + 'static> Drop for InterceptionHandle<M> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<M: Send + 'static> fmt::Debug for InterceptionHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptionHandle")
            .field("stage_name", &self.inner.stage_name)
            .field("session_id", &self.inner.session_id)
            .field("closed", &self.is_closed())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
