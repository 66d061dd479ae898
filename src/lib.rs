//! pipeline-tap - Per-connection message interception.
//!
//! This library inserts an interception stage into an already established
//! connection's message pipeline. Every inbound and outbound message is
//! shown to registered listeners, which may inspect it, replace or mutate
//! its payload, or cancel it, before it continues to its normal destination.
//! The stage can be removed again without disturbing the connection.
//!
//! # Architecture
//!
//! - **Host transport** owns the connection, its pipeline and its
//!   single-threaded connection loop (reference implementation behind the
//!   default `host` feature)
//! - **Locator** maps a host session to that pipeline (the only host-coupled code)
//! - **Interception handle** sits in the pipeline and dispatches to listeners
//!
//! Key design principles:
//!
//! - Dispatch is synchronous on the connection loop, in registration order
//! - A failing or panicking listener never breaks message flow
//! - Sessions are held weakly; a handle never keeps a peer alive
//! - Attach failures are loud; detach is idempotent and safe from any thread
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pipeline_tap::{
//!     Channel, InterceptedMessage, InterceptionHandle, PeerSession, PeerSessionLocator, Result,
//!     on_send,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (channel, _ends) = Channel::<String>::open();
//!     let session = PeerSession::connected("alice", Arc::clone(&channel));
//!
//!     let handle = InterceptionHandle::<String>::new(&session, &PeerSessionLocator)?;
//!     handle.add_listener(on_send(|message: &mut InterceptedMessage<String>| {
//!         if message.payload() == "DROP" {
//!             message.cancel();
//!         }
//!         Ok(())
//!     }))?;
//!
//!     channel.write("hello".to_string()).await?;
//!     channel.write("DROP".to_string()).await?; // resolves Ok, never sent
//!
//!     handle.detach();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`intercept`] | Handle, listeners, registry, locator |
//! | [`manager`] | One handle per session plus global listeners |
//! | [`transport`] | Pipeline seam and reference tokio transport |
//! | [`config`] | Stage name and anchor configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`session`] | Peer session abstraction |

// ============================================================================
// Modules
// ============================================================================

/// Interception stage configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Transport interception core.
///
/// - [`InterceptionHandle`] - Attach, dispatch, detach
/// - [`Listener`] - Observer capability
/// - [`InterceptedMessage`] - One observed message
pub mod intercept;

/// Interceptor manager for many sessions.
pub mod manager;

/// Peer session abstraction.
pub mod session;

/// Host transport layer.
///
/// Pipeline seam plus a tokio-driven reference transport.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Interception types
pub use intercept::{
    Direction, InterceptedMessage, InterceptionHandle, Listener, ListenerRegistry,
    PipelineLocator, on_receive, on_send,
};

#[cfg(feature = "host")]
pub use intercept::PeerSessionLocator;

// Manager
pub use manager::InterceptorManager;

// Transport types
pub use transport::{Flow, Pipeline, Stage};

#[cfg(feature = "host")]
pub use transport::{Channel, ChannelEnds, ConnectionHandler, NetworkManager, PeerSession};

// Configuration
pub use config::InterceptConfig;

// Error types
pub use error::{Error, ListenerError, ListenerResult, Result};

// Identifier types
pub use identifiers::SessionId;

// Session
pub use session::Session;
