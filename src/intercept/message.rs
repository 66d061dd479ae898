//! Intercepted message types.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::mem;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identifiers::SessionId;
use crate::session::Session;

// ============================================================================
// Direction
// ============================================================================

/// The direction a message is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From the remote peer towards the host.
    Inbound,

    /// From the host towards the remote peer.
    Outbound,
}

impl Direction {
    /// Returns `true` for [`Direction::Inbound`].
    #[inline]
    #[must_use]
    pub const fn is_inbound(self) -> bool {
        matches!(self, Self::Inbound)
    }

    /// Returns `true` for [`Direction::Outbound`].
    #[inline]
    #[must_use]
    pub const fn is_outbound(self) -> bool {
        matches!(self, Self::Outbound)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => f.write_str("inbound"),
            Self::Outbound => f.write_str("outbound"),
        }
    }
}

// ============================================================================
// InterceptedMessage
// ============================================================================

/// One observed message, passed by reference to each listener in turn.
///
/// Listeners may replace or mutate the payload, which changes what is
/// forwarded. Cancellation is one-way: once [`cancel`](Self::cancel) was
/// called, no later listener can undo it.
pub struct InterceptedMessage<M> {
    payload: M,
    direction: Direction,
    session: Option<Arc<dyn Session>>,
    cancelled: bool,
}

impl<M> InterceptedMessage<M> {
    /// Creates a message that is not cancelled.
    #[inline]
    #[must_use]
    pub fn new(payload: M, direction: Direction, session: Option<Arc<dyn Session>>) -> Self {
        Self {
            payload,
            direction,
            session,
            cancelled: false,
        }
    }

    /// Returns the payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &M {
        &self.payload
    }

    /// Returns the payload for in-place mutation.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut M {
        &mut self.payload
    }

    /// Replaces the payload, returning the previous one.
    #[inline]
    pub fn set_payload(&mut self, payload: M) -> M {
        mem::replace(&mut self.payload, payload)
    }

    /// Returns the direction the message is travelling.
    #[inline]
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the owning session.
    ///
    /// `None` once the peer has disconnected or the handle was detached.
    #[inline]
    #[must_use]
    pub fn session(&self) -> Option<&Arc<dyn Session>> {
        self.session.as_ref()
    }

    /// Returns the owning session's ID, if the session is still alive.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id())
    }

    /// Returns `true` if a listener cancelled the message.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Suppresses forwarding of this message.
    #[inline]
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Consumes the message, returning the payload.
    #[inline]
    #[must_use]
    pub fn into_payload(self) -> M {
        self.payload
    }
}

impl<M: fmt::Debug> fmt::Debug for InterceptedMessage<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptedMessage")
            .field("payload", &self.payload)
            .field("direction", &self.direction)
            .field("session", &self.session_id())
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
