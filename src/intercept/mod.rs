//! Transport interception core.
//!
//! # Architecture
//!
//! ```text
//!              attach (any thread)
//! Session ──► PipelineLocator ──► Pipeline
//!                                    │ add_before(anchor)
//!                                    ▼
//!   ... ──► [ InterceptionHandle stage ] ──► [ host stage ]
//!                     │
//!                     │ snapshot, in registration order
//!                     ▼
//!            ListenerRegistry ──► Listener::on_send / on_receive
//!                                    (&mut InterceptedMessage)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `handle` | Attach, dispatch, detach |
//! | `listener` | Listener capability and closure adapters |
//! | `locator` | Session to pipeline resolution |
//! | `message` | Intercepted message and direction |
//! | `registry` | Ordered copy-on-write listener list |

// ============================================================================
// Submodules
// ============================================================================

/// Interception handle.
pub mod handle;

/// Listener capability.
pub mod listener;

/// Pipeline discovery.
pub mod locator;

/// Intercepted message types.
pub mod message;

/// Ordered listener registry.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use handle::InterceptionHandle;
pub use listener::{Listener, on_receive, on_send, same_listener};
pub use locator::PipelineLocator;
#[cfg(feature = "host")]
pub use locator::PeerSessionLocator;
pub use message::{Direction, InterceptedMessage};
pub use registry::ListenerRegistry;
