//! Channel and connection loop.
//!
//! A [`Channel`] is the reference host transport: a [`StageList`] ending in
//! a terminal host stage, driven by one tokio task that serializes every
//! read, write and submitted task for the connection.
//!
//! # Connection Loop
//!
//! The loop task handles:
//!
//! - Inbound reads, run head to tail and delivered to the host
//! - Outbound writes, run tail to head and handed to the socket side
//! - Tasks submitted through [`Pipeline::execute`]
//! - Shutdown

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::config::DEFAULT_ANCHOR;
use crate::error::{Error, Result};

use super::pipeline::{Flow, Pipeline, Stage, StageList, Task};

// ============================================================================
// LoopCommand
// ============================================================================

/// Internal commands for the connection loop.
enum LoopCommand<M> {
    /// Run a message received from the peer through the pipeline.
    Read(M),
    /// Run a message through the pipeline and hand it to the socket side.
    Write {
        message: M,
        done_tx: oneshot::Sender<Result<()>>,
    },
    /// Run a submitted task.
    Execute(Task),
    /// Stop the loop.
    Close,
}

// ============================================================================
// HostStage
// ============================================================================

/// Terminal stage delivering inbound messages to the host.
struct HostStage<M> {
    inbound_tx: mpsc::UnboundedSender<M>,
}

impl<M: Send> Stage<M> for HostStage<M> {
    fn inbound(&self, message: M) -> Flow<M> {
        if self.inbound_tx.send(message).is_err() {
            trace!("Host receiver dropped, inbound message discarded");
        }
        Flow::Stop
    }
}

// ============================================================================
// ChannelEnds
// ============================================================================

/// Receiving ends of a [`Channel`].
pub struct ChannelEnds<M> {
    /// Messages that reached the terminal host stage.
    pub inbound: mpsc::UnboundedReceiver<M>,
    /// Messages that left the pipeline towards the peer.
    pub outbound: mpsc::UnboundedReceiver<M>,
}

// ============================================================================
// Channel
// ============================================================================

/// One connection's pipeline plus its single-threaded connection loop.
///
/// # Thread Safety
///
/// `Channel` is `Send + Sync`. Reads, writes and submitted tasks are queued
/// onto the loop and run one at a time in submission order.
pub struct Channel<M> {
    /// Ordered stages (shared with the loop).
    stages: Arc<StageList<M>>,
    /// Channel for sending commands to the loop.
    command_tx: mpsc::UnboundedSender<LoopCommand<M>>,
    /// Cleared when the loop stops.
    open: Arc<AtomicBool>,
}

impl<M: Send + 'static> Channel<M> {
    /// Opens a channel whose terminal stage is named `packet_handler`.
    ///
    /// Spawns the connection loop, so it must be called within a tokio runtime.
    #[must_use]
    pub fn open() -> (Arc<Self>, ChannelEnds<M>) {
        Self::with_terminal(DEFAULT_ANCHOR)
    }

    /// Opens a channel with a custom terminal stage name.
    #[must_use]
    pub fn with_terminal(terminal: &str) -> (Arc<Self>, ChannelEnds<M>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (outbound_tx, outbound) = mpsc::unbounded_channel();

        let stages = Arc::new(StageList::new());
        let host: Arc<dyn Stage<M>> = Arc::new(HostStage { inbound_tx });
        if let Err(e) = stages.add_last(terminal, host) {
            warn!(error = %e, terminal, "Failed to install terminal host stage");
        }

        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::run_loop(
            Arc::clone(&stages),
            command_rx,
            outbound_tx,
            Arc::clone(&open),
        ));

        debug!(terminal, "Channel opened");

        let channel = Arc::new(Self {
            stages,
            command_tx,
            open,
        });

        (channel, ChannelEnds { inbound, outbound })
    }

    /// Queues a message received from the peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the loop has stopped.
    pub fn fire_read(&self, message: M) -> Result<()> {
        self.command_tx
            .send(LoopCommand::Read(message))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Writes a message and waits until the loop has processed it.
    ///
    /// Resolves `Ok(())` both when the message left the pipeline and when a
    /// stage consumed it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the loop has stopped or the
    /// socket side is gone.
    pub async fn write(&self, message: M) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();

        self.command_tx
            .send(LoopCommand::Write { message, done_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        done_rx.await?
    }

    /// Stops the connection loop.
    ///
    /// Commands queued before the call are still processed.
    pub fn close(&self) {
        if self.command_tx.send(LoopCommand::Close).is_err() {
            debug!("Close requested on a stopped connection loop");
        }
    }

    /// Connection loop that owns all message traversal.
    async fn run_loop(
        stages: Arc<StageList<M>>,
        mut command_rx: mpsc::UnboundedReceiver<LoopCommand<M>>,
        outbound_tx: mpsc::UnboundedSender<M>,
        open: Arc<AtomicBool>,
    ) {
        while let Some(command) = command_rx.recv().await {
            match command {
                LoopCommand::Read(message) => {
                    if stages.fire_inbound(message).is_some() {
                        trace!("Inbound message passed every stage unhandled");
                    }
                }

                LoopCommand::Write { message, done_tx } => {
                    let result = match stages.fire_outbound(message) {
                        Some(message) => outbound_tx
                            .send(message)
                            .map_err(|_| Error::ConnectionClosed),
                        None => Ok(()),
                    };
                    let _ = done_tx.send(result);
                }

                LoopCommand::Execute(task) => task(),

                LoopCommand::Close => {
                    debug!("Close command received");
                    break;
                }
            }
        }

        open.store(false, Ordering::Release);
        command_rx.close();

        // Fail writes that were queued behind the close.
        while let Ok(command) = command_rx.try_recv() {
            if let LoopCommand::Write { done_tx, .. } = command {
                let _ = done_tx.send(Err(Error::ConnectionClosed));
            }
        }

        debug!("Connection loop terminated");
    }
}

// ============================================================================
// Channel - Pipeline
// ============================================================================

impl<M: Send + 'static> Pipeline<M> for Channel<M> {
    fn contains(&self, name: &str) -> bool {
        self.stages.contains(name)
    }

    fn names(&self) -> Vec<String> {
        self.stages.names()
    }

    fn add_before(&self, anchor: &str, name: &str, stage: Arc<dyn Stage<M>>) -> Result<()> {
        self.stages.add_before(anchor, name, stage)
    }

    fn add_last(&self, name: &str, stage: Arc<dyn Stage<M>>) -> Result<()> {
        self.stages.add_last(name, stage)
    }

    fn remove(&self, name: &str) -> Option<Arc<dyn Stage<M>>> {
        self.stages.remove(name)
    }

    fn remove_stage(&self, stage: &Arc<dyn Stage<M>>) -> bool {
        self.stages.remove_stage(stage)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.command_tx.is_closed()
    }

    fn execute(&self, task: Task) -> Result<()> {
        self.command_tx
            .send(LoopCommand::Execute(task))
            .map_err(|_| {
                warn!("Task submitted to a stopped connection loop");
                Error::ConnectionClosed
            })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_test::{assert_err, assert_ok};

    struct Suffix(&'static str);

    impl Stage<String> for Suffix {
        fn inbound(&self, message: String) -> Flow<String> {
            Flow::Continue(format!("{message}{}", self.0))
        }

        fn outbound(&self, message: String) -> Flow<String> {
            Flow::Continue(format!("{message}{}", self.0))
        }
    }

    struct DropAll;

    impl Stage<String> for DropAll {
        fn outbound(&self, _message: String) -> Flow<String> {
            Flow::Stop
        }
    }

    #[tokio::test]
    async fn test_read_reaches_host() {
        let (channel, mut ends) = Channel::<String>::open();
        channel
            .add_before(DEFAULT_ANCHOR, "suffix", Arc::new(Suffix("!")))
            .unwrap();

        assert_ok!(channel.fire_read("hello".to_string()));
        assert_eq!(ends.inbound.recv().await.as_deref(), Some("hello!"));
    }

    #[tokio::test]
    async fn test_write_leaves_pipeline() {
        let (channel, mut ends) = Channel::<String>::open();
        channel
            .add_before(DEFAULT_ANCHOR, "suffix", Arc::new(Suffix("?")))
            .unwrap();

        assert_ok!(channel.write("ping".to_string()).await);
        assert_eq!(ends.outbound.recv().await.as_deref(), Some("ping?"));
    }

    #[tokio::test]
    async fn test_consumed_write_still_succeeds() {
        let (channel, mut ends) = Channel::<String>::open();
        channel.add_last("drop", Arc::new(DropAll)).unwrap();

        assert_ok!(channel.write("gone".to_string()).await);
        channel.close();
        assert!(ends.outbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_execute_runs_on_loop_in_order() {
        let (channel, _ends) = Channel::<String>::open();
        let (tx, rx) = oneshot::channel();

        let names_at_run = Arc::clone(&channel);
        channel
            .execute(Box::new(move || {
                let _ = tx.send(names_at_run.names());
            }))
            .unwrap();

        assert_eq!(rx.await.unwrap(), vec![DEFAULT_ANCHOR.to_string()]);
    }

    #[tokio::test]
    async fn test_closed_channel_rejects_work() {
        let (channel, _ends) = Channel::<String>::open();
        channel.close();

        // Wait until the loop has observed the close.
        while channel.is_open() {
            tokio::task::yield_now().await;
        }

        assert_err!(channel.fire_read("late".to_string()));
        assert!(channel.write("late".to_string()).await.is_err());
        assert!(channel.execute(Box::new(|| {})).is_err());
    }
}
