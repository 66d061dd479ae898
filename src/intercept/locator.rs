//! Pipeline discovery.
//!
//! [`PipelineLocator`] is the only place that knows how a host session maps
//! to its pipeline. The interception core calls it once at attach time and
//! never looks at host internals itself.
//!
//! A locator must fail with [`Error::Attach`](crate::Error::Attach) naming the missing link; it
//! never falls back to some other pipeline.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

#[cfg(feature = "host")]
use tracing::trace;

#[cfg(feature = "host")]
use crate::error::Error;
use crate::error::Result;
use crate::session::Session;
use crate::transport::Pipeline;
#[cfg(feature = "host")]
use crate::transport::PeerSession;

// ============================================================================
// PipelineLocator
// ============================================================================

/// Resolves the pipeline of a session's connection.
pub trait PipelineLocator<M>: Send + Sync {
    /// Returns the pipeline to attach to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Attach`](crate::Error::Attach) naming the first structure that could not
    /// be resolved.
    fn locate(&self, session: &dyn Session) -> Result<Arc<dyn Pipeline<M>>>;
}

impl<M, F> PipelineLocator<M> for F
where
    F: Fn(&dyn Session) -> Result<Arc<dyn Pipeline<M>>> + Send + Sync,
{
    fn locate(&self, session: &dyn Session) -> Result<Arc<dyn Pipeline<M>>> {
        self(session)
    }
}

// ============================================================================
// PeerSessionLocator
// ============================================================================

/// Locator for the bundled host transport.
///
/// Walks `PeerSession → connection → network_manager → channel`.
#[cfg(feature = "host")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerSessionLocator;

#[cfg(feature = "host")]
impl<M: Send + 'static> PipelineLocator<M> for PeerSessionLocator {
    fn locate(&self, session: &dyn Session) -> Result<Arc<dyn Pipeline<M>>> {
        let peer = session
            .as_any()
            .downcast_ref::<PeerSession<M>>()
            .ok_or_else(|| {
                Error::attach("session", "session is not a PeerSession of this message type")
            })?;

        let connection = peer
            .connection()
            .ok_or_else(|| Error::attach("connection", "session has no connection handler"))?;

        let manager = connection.network_manager().ok_or_else(|| {
            Error::attach("network_manager", "connection handler has no network manager")
        })?;

        let channel = manager
            .channel()
            .ok_or_else(|| Error::attach("channel", "network manager has no channel"))?;

        trace!(session = %session.id(), "Pipeline located");

        let pipeline: Arc<dyn Pipeline<M>> = Arc::clone(channel) as Arc<dyn Pipeline<M>>;
        Ok(pipeline)
    }
}

// ============================================================================
// Tests
// ============================================================================
