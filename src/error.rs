//! Error types for pipeline-tap.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use pipeline_tap::{InterceptionHandle, Result};
//!
//! fn tap(session: &Arc<PeerSession<String>>) -> Result<InterceptionHandle<String>> {
//!     let handle = InterceptionHandle::attach(session, &PeerSessionLocator, &config)?;
//!     handle.add_listener(listener)?;
//!     Ok(handle)
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Attach | [`Error::Attach`], [`Error::StageNotFound`], [`Error::DuplicateStage`] |
//! | Lifecycle | [`Error::Closed`], [`Error::SessionNotFound`] |
//! | Connection | [`Error::ConnectionClosed`], [`Error::ChannelClosed`] |
//! | Configuration | [`Error::Config`], [`Error::Json`] |
//!
//! Failures raised by listener code are not represented here. They are
//! isolated at the dispatch boundary as [`ListenerError`] and never reach
//! the caller.

// ============================================================================
// Imports
// ============================================================================

use std::error::Error as StdError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::SessionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

/// Error type returned by listener callbacks.
pub type ListenerError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type returned by listener callbacks.
pub type ListenerResult = StdResult<(), ListenerError>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Attach Errors
    // ========================================================================
    /// A host structure required to reach the pipeline is missing.
    ///
    /// Returned by a [`PipelineLocator`](crate::PipelineLocator) when one link
    /// of the session → connection → network manager → channel chain
    /// cannot be resolved.
    #[error("Attach failed: could not locate {field}: {message}")]
    Attach {
        /// Name of the missing link.
        field: String,
        /// Description of the failure.
        message: String,
    },

    /// Anchor stage does not exist in the pipeline.
    #[error("Stage not found: {name}")]
    StageNotFound {
        /// The missing stage name.
        name: String,
    },

    /// A stage with this name is already part of the pipeline.
    #[error("Duplicate stage: {name}")]
    DuplicateStage {
        /// The conflicting stage name.
        name: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Interception handle or manager was already detached.
    #[error("Interception handle already detached")]
    Closed,

    /// No interception handle is registered for the session.
    #[error("Session not found: {session_id}")]
    SessionNotFound {
        /// The unknown session ID.
        session_id: SessionId,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The connection loop is no longer running.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an attach error for a missing link.
    #[inline]
    pub fn attach(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Attach {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a stage not found error.
    #[inline]
    pub fn stage_not_found(name: impl Into<String>) -> Self {
        Self::StageNotFound { name: name.into() }
    }

    /// Creates a duplicate stage error.
    #[inline]
    pub fn duplicate_stage(name: impl Into<String>) -> Self {
        Self::DuplicateStage { name: name.into() }
    }

    /// Creates a session not found error.
    #[inline]
    pub fn session_not_found(session_id: SessionId) -> Self {
        Self::SessionNotFound { session_id }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the interception stage could not be attached.
    #[inline]
    #[must_use]
    pub fn is_attach_error(&self) -> bool {
        matches!(
            self,
            Self::Attach { .. } | Self::StageNotFound { .. } | Self::DuplicateStage { .. }
        )
    }

    /// Returns `true` if the target was already detached or shut down.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::ChannelClosed(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
