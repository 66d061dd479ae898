//! Host transport layer.
//!
//! The interception core only taps an existing pipeline. This module holds
//! the seam it taps ([`Pipeline`], [`Stage`]) and, behind the `host`
//! feature, a reference host transport built on tokio.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Channel (one per connection)                         │
//! │                                                      │
//! │   StageList:  [ ... ] → [ pipeline_tap ] → [ host ]  │
//! │                                                      │
//! │   connection loop (one tokio task)                   │
//! │     Read / Write / Execute / Close, strictly serial  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `pipeline` | Stage and pipeline traits, ordered stage list |
//! | `channel` | Channel and connection loop |
//! | `host` | Session → connection → network manager → channel graph |

// ============================================================================
// Submodules
// ============================================================================

/// Channel and connection loop.
#[cfg(feature = "host")]
pub mod channel;

/// Host object graph.
#[cfg(feature = "host")]
pub mod host;

/// Pipeline stages and the pipeline seam.
pub mod pipeline;

// ============================================================================
// Re-exports
// ============================================================================

#[cfg(feature = "host")]
pub use channel::{Channel, ChannelEnds};
#[cfg(feature = "host")]
pub use host::{ConnectionHandler, NetworkManager, PeerSession};
pub use pipeline::{Flow, Pipeline, Stage, StageList, Task, same_stage};
