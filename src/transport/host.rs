//! Host object graph.
//!
//! The host reaches a peer's channel through a chain of objects:
//!
//! ```text
//! PeerSession ──► ConnectionHandler ──► NetworkManager ──► Channel
//! ```
//!
//! Every link is optional. A session whose connection was torn down, or
//! whose manager never finished setting up, simply has a missing link;
//! [`PeerSessionLocator`](crate::PeerSessionLocator) reports which one.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::sync::Arc;

use crate::identifiers::SessionId;
use crate::session::Session;

use super::channel::Channel;

// ============================================================================
// NetworkManager
// ============================================================================

/// Owns the channel of one connection.
pub struct NetworkManager<M> {
    channel: Option<Arc<Channel<M>>>,
}

impl<M> NetworkManager<M> {
    /// Creates a network manager.
    #[inline]
    #[must_use]
    pub fn new(channel: Option<Arc<Channel<M>>>) -> Arc<Self> {
        Arc::new(Self { channel })
    }

    /// Returns the channel, if one is bound.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> Option<&Arc<Channel<M>>> {
        self.channel.as_ref()
    }
}

// ============================================================================
// ConnectionHandler
// ============================================================================

/// The host's per-peer connection handler.
pub struct ConnectionHandler<M> {
    network_manager: Option<Arc<NetworkManager<M>>>,
}

impl<M> ConnectionHandler<M> {
    /// Creates a connection handler.
    #[inline]
    #[must_use]
    pub fn new(network_manager: Option<Arc<NetworkManager<M>>>) -> Arc<Self> {
        Arc::new(Self { network_manager })
    }

    /// Returns the network manager, if one is bound.
    #[inline]
    #[must_use]
    pub fn network_manager(&self) -> Option<&Arc<NetworkManager<M>>> {
        self.network_manager.as_ref()
    }
}

// ============================================================================
// PeerSession
// ============================================================================

/// A connected peer as tracked by the host.
pub struct PeerSession<M> {
    id: SessionId,
    name: String,
    connection: Option<Arc<ConnectionHandler<M>>>,
}

impl<M> PeerSession<M> {
    /// Creates a session whose full chain leads to `channel`.
    #[must_use]
    pub fn connected(name: impl Into<String>, channel: Arc<Channel<M>>) -> Arc<Self> {
        let manager = NetworkManager::new(Some(channel));
        let connection = ConnectionHandler::new(Some(manager));
        Self::with_connection(name, Some(connection))
    }

    /// Creates a session with an arbitrary (possibly missing) connection handler.
    #[must_use]
    pub fn with_connection(
        name: impl Into<String>,
        connection: Option<Arc<ConnectionHandler<M>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::generate(),
            name: name.into(),
            connection,
        })
    }

    /// Returns the connection handler, if one is bound.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> Option<&Arc<ConnectionHandler<M>>> {
        self.connection.as_ref()
    }
}

impl<M: Send + 'static> Session for PeerSession<M> {
    fn id(&self) -> SessionId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
