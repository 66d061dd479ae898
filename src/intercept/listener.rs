//! Listener capability.
//!
//! # Example
//!
//! ```ignore
//! use pipeline_tap::{InterceptedMessage, Listener, ListenerResult};
//!
//! struct DropPings;
//!
//! impl Listener<String> for DropPings {
//!     fn on_send(&self, message: &mut InterceptedMessage<String>) -> ListenerResult {
//!         if message.payload() == "ping" {
//!             message.cancel();
//!         }
//!         Ok(())
//!     }
//! }
//!
//! handle.add_listener(Arc::new(DropPings))?;
//! handle.add_listener(pipeline_tap::on_receive(|message| {
//!     tracing::info!(payload = ?message.payload(), "received");
//!     Ok(())
//! }))?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::any::type_name;
use std::sync::Arc;

use crate::error::ListenerResult;

use super::message::{Direction, InterceptedMessage};

// ============================================================================
// Listener
// ============================================================================

/// Observer of intercepted messages.
///
/// Callbacks run synchronously on the connection loop and must not block
/// it; long work has to be handed off by the listener itself. Returning an
/// error (or panicking) is logged and otherwise ignored: other listeners
/// still run and the message is still forwarded unless cancelled.
///
/// Both callbacks default to doing nothing, so implementors only override
/// the direction they care about.
pub trait Listener<M>: Send + Sync {
    /// Called for every outbound message.
    fn on_send(&self, message: &mut InterceptedMessage<M>) -> ListenerResult {
        let _ = message;
        Ok(())
    }

    /// Called for every inbound message.
    fn on_receive(&self, message: &mut InterceptedMessage<M>) -> ListenerResult {
        let _ = message;
        Ok(())
    }

    /// Name used when logging failures of this listener.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// Returns `true` if both handles point at the same listener instance.
#[inline]
#[must_use]
pub fn same_listener<M>(a: &Arc<dyn Listener<M>>, b: &Arc<dyn Listener<M>>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

// ============================================================================
// FnListener
// ============================================================================

/// Listener backed by a closure for one direction.
struct FnListener<F> {
    direction: Direction,
    callback: F,
}

impl<M, F> Listener<M> for FnListener<F>
where
    F: Fn(&mut InterceptedMessage<M>) -> ListenerResult + Send + Sync,
{
    fn on_send(&self, message: &mut InterceptedMessage<M>) -> ListenerResult {
        match self.direction {
            Direction::Outbound => (self.callback)(message),
            Direction::Inbound => Ok(()),
        }
    }

    fn on_receive(&self, message: &mut InterceptedMessage<M>) -> ListenerResult {
        match self.direction {
            Direction::Inbound => (self.callback)(message),
            Direction::Outbound => Ok(()),
        }
    }

    fn name(&self) -> &str {
        type_name::<F>()
    }
}

/// Creates a listener that runs `callback` for outbound messages.
#[must_use]
pub fn on_send<M, F>(callback: F) -> Arc<dyn Listener<M>>
where
    M: 'static,
    F: Fn(&mut InterceptedMessage<M>) -> ListenerResult + Send + Sync + 'static,
{
    Arc::new(FnListener {
        direction: Direction::Outbound,
        callback,
    })
}

/// Creates a listener that runs `callback` for inbound messages.
#[must_use]
pub fn on_receive<M, F>(callback: F) -> Arc<dyn Listener<M>>
where
    M: 'static,
    F: Fn(&mut InterceptedMessage<M>) -> ListenerResult + Send + Sync + 'static,
{
    Arc::new(FnListener {
        direction: Direction::Inbound,
        callback,
    })
}

// ============================================================================
// Tests
// ============================================================================
