//! Peer session abstraction.
//!
//! A session is owned by the host platform. Interception code only ever
//! holds a [`Weak`](std::sync::Weak) reference to it and upgrades before
//! use, so a disconnected peer is never kept alive by an interceptor.

use std::any::Any;

use crate::identifiers::SessionId;

/// One remote peer's connection identity, as seen by the host.
pub trait Session: Send + Sync + 'static {
    /// Returns the session's identifier.
    fn id(&self) -> SessionId;

    /// Returns a human readable peer name, used in logs.
    fn name(&self) -> &str;

    /// Returns `self` as [`Any`] so host adapters can recover the concrete type.
    fn as_any(&self) -> &dyn Any;
}
