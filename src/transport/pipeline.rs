//! Pipeline stages and the pipeline seam.
//!
//! A pipeline is an ordered chain of named [`Stage`]s. Inbound messages
//! travel head to tail; outbound messages travel tail to head. Each stage
//! either passes a (possibly replaced) message on with [`Flow::Continue`]
//! or consumes it with [`Flow::Stop`].
//!
//! ```text
//!   fire_read ──► [ decoder ] ──► [ pipeline_tap ] ──► [ packet_handler ]
//!                                                            │
//!   socket   ◄── [ decoder ] ◄── [ pipeline_tap ] ◄──  write ┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::ptr;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Zero-argument task submitted to a connection loop.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

// ============================================================================
// Flow
// ============================================================================

/// Outcome of one stage processing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow<M> {
    /// Pass the message to the next stage.
    Continue(M),

    /// Consume the message; no later stage sees it.
    Stop,
}

// ============================================================================
// Stage
// ============================================================================

/// One processing stage of a pipeline.
///
/// Both methods run on the connection loop and must not block it.
pub trait Stage<M>: Send + Sync {
    /// Handles a message travelling towards the host.
    fn inbound(&self, message: M) -> Flow<M> {
        Flow::Continue(message)
    }

    /// Handles a message travelling towards the remote peer.
    fn outbound(&self, message: M) -> Flow<M> {
        Flow::Continue(message)
    }
}

/// Returns `true` if both handles point at the same stage instance.
#[inline]
#[must_use]
pub fn same_stage<M>(a: &Arc<dyn Stage<M>>, b: &Arc<dyn Stage<M>>) -> bool {
    ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

// ============================================================================
// Pipeline
// ============================================================================

/// A connection's pipeline, as exposed by the host transport.
///
/// Structural mutation is allowed from any thread. Work that must not race
/// with in-flight reads and writes is submitted through [`Pipeline::execute`],
/// which runs it on the connection loop.
pub trait Pipeline<M>: Send + Sync {
    /// Returns `true` if a stage with this name exists.
    fn contains(&self, name: &str) -> bool;

    /// Returns stage names in head to tail order.
    fn names(&self) -> Vec<String>;

    /// Inserts `stage` immediately before the stage named `anchor`.
    ///
    /// # Errors
    ///
    /// - [`Error::StageNotFound`] if `anchor` does not exist
    /// - [`Error::DuplicateStage`] if `name` is already taken
    fn add_before(&self, anchor: &str, name: &str, stage: Arc<dyn Stage<M>>) -> Result<()>;

    /// Appends `stage` at the tail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateStage`] if `name` is already taken.
    fn add_last(&self, name: &str, stage: Arc<dyn Stage<M>>) -> Result<()>;

    /// Removes the stage with this name.
    fn remove(&self, name: &str) -> Option<Arc<dyn Stage<M>>>;

    /// Removes this exact stage instance, wherever it is.
    fn remove_stage(&self, stage: &Arc<dyn Stage<M>>) -> bool;

    /// Returns `true` while the underlying connection is open.
    fn is_open(&self) -> bool;

    /// Schedules `task` on the connection loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the loop is gone.
    fn execute(&self, task: Task) -> Result<()>;
}

// ============================================================================
// StageList
// ============================================================================

struct NamedStage<M> {
    name: String,
    stage: Arc<dyn Stage<M>>,
}

impl<M> Clone for NamedStage<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            stage: Arc::clone(&self.stage),
        }
    }
}

/// Ordered, thread-safe list of named stages.
///
/// Traversal works on a snapshot, so stages may be added or removed while
/// a message is in flight without affecting that message.
pub struct StageList<M> {
    stages: RwLock<Vec<NamedStage<M>>>,
}

impl<M> Default for StageList<M> {
    fn default() -> Self {
        Self {
            stages: RwLock::new(Vec::new()),
        }
    }
}

impl<M> StageList<M> {
    /// Creates an empty stage list.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a stage with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stages.read().iter().any(|s| s.name == name)
    }

    /// Returns stage names in head to tail order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.stages.read().iter().map(|s| s.name.clone()).collect()
    }

    /// Returns the number of stages.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.read().len()
    }

    /// Returns `true` if there are no stages.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.read().is_empty()
    }

    /// Inserts `stage` immediately before `anchor`.
    ///
    /// # Errors
    ///
    /// - [`Error::StageNotFound`] if `anchor` does not exist
    /// - [`Error::DuplicateStage`] if `name` is already taken
    pub fn add_before(&self, anchor: &str, name: &str, stage: Arc<dyn Stage<M>>) -> Result<()> {
        let mut stages = self.stages.write();

        if stages.iter().any(|s| s.name == name) {
            return Err(Error::duplicate_stage(name));
        }

        let index = stages
            .iter()
            .position(|s| s.name == anchor)
            .ok_or_else(|| Error::stage_not_found(anchor))?;

        stages.insert(
            index,
            NamedStage {
                name: name.to_string(),
                stage,
            },
        );
        Ok(())
    }

    /// Appends `stage` at the tail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateStage`] if `name` is already taken.
    pub fn add_last(&self, name: &str, stage: Arc<dyn Stage<M>>) -> Result<()> {
        let mut stages = self.stages.write();

        if stages.iter().any(|s| s.name == name) {
            return Err(Error::duplicate_stage(name));
        }

        stages.push(NamedStage {
            name: name.to_string(),
            stage,
        });
        Ok(())
    }

    /// Removes the stage with this name.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn Stage<M>>> {
        let mut stages = self.stages.write();
        let index = stages.iter().position(|s| s.name == name)?;
        Some(stages.remove(index).stage)
    }

    /// Removes this exact stage instance.
    pub fn remove_stage(&self, stage: &Arc<dyn Stage<M>>) -> bool {
        let mut stages = self.stages.write();
        match stages.iter().position(|s| same_stage(&s.stage, stage)) {
            Some(index) => {
                let removed = stages.remove(index);
                trace!(name = %removed.name, "Stage removed");
                true
            }
            None => false,
        }
    }

    /// Runs `message` through every stage, head to tail.
    ///
    /// Returns the message if it passed the last stage, `None` if a stage
    /// consumed it.
    pub fn fire_inbound(&self, message: M) -> Option<M> {
        let snapshot = self.snapshot();
        let mut message = message;

        for entry in &snapshot {
            match entry.stage.inbound(message) {
                Flow::Continue(next) => message = next,
                Flow::Stop => {
                    trace!(stage = %entry.name, "Inbound message consumed");
                    return None;
                }
            }
        }

        Some(message)
    }

    /// Runs `message` through every stage, tail to head.
    ///
    /// Returns the message if it passed the head stage, `None` if a stage
    /// consumed it.
    pub fn fire_outbound(&self, message: M) -> Option<M> {
        let snapshot = self.snapshot();
        let mut message = message;

        for entry in snapshot.iter().rev() {
            match entry.stage.outbound(message) {
                Flow::Continue(next) => message = next,
                Flow::Stop => {
                    trace!(stage = %entry.name, "Outbound message consumed");
                    return None;
                }
            }
        }

        Some(message)
    }

    fn snapshot(&self) -> Vec<NamedStage<M>> {
        self.stages.read().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Stage<String> for Upper {
        fn inbound(&self, message: String) -> Flow<String> {
            Flow::Continue(message.to_uppercase())
        }
    }

    struct Swallow;

    impl Stage<String> for Swallow {
        fn outbound(&self, _message: String) -> Flow<String> {
            Flow::Stop
        }
    }

    fn stage<S: Stage<String> + 'static>(s: S) -> Arc<dyn Stage<String>> {
        Arc::new(s)
    }

    #[test]
    fn test_add_before_orders_stages() {
        let list = StageList::new();
        list.add_last("decoder", stage(Upper)).unwrap();
        list.add_last("packet_handler", stage(Upper)).unwrap();
        list.add_before("packet_handler", "tap", stage(Upper)).unwrap();

        assert_eq!(list.names(), vec!["decoder", "tap", "packet_handler"]);
    }

    #[test]
    fn test_add_before_missing_anchor() {
        let list: StageList<String> = StageList::new();
        let err = list.add_before("packet_handler", "tap", stage(Upper)).unwrap_err();
        assert!(matches!(err, Error::StageNotFound { ref name } if name == "packet_handler"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let list = StageList::new();
        list.add_last("tap", stage(Upper)).unwrap();
        let err = list.add_last("tap", stage(Upper)).unwrap_err();
        assert!(matches!(err, Error::DuplicateStage { .. }));
    }

    #[test]
    fn test_remove_stage_by_identity() {
        let list = StageList::new();
        let a = stage(Upper);
        let b = stage(Upper);
        list.add_last("a", Arc::clone(&a)).unwrap();
        list.add_last("b", Arc::clone(&b)).unwrap();

        assert!(list.remove_stage(&b));
        assert!(!list.remove_stage(&b));
        assert_eq!(list.names(), vec!["a"]);
    }

    #[test]
    fn test_fire_inbound_and_outbound() {
        let list = StageList::new();
        list.add_last("upper", stage(Upper)).unwrap();

        assert_eq!(list.fire_inbound("hi".to_string()), Some("HI".to_string()));
        assert_eq!(list.fire_outbound("hi".to_string()), Some("hi".to_string()));

        list.add_last("swallow", stage(Swallow)).unwrap();
        assert_eq!(list.fire_outbound("hi".to_string()), None);
    }
}
