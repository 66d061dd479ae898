//! Shared test fixtures.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_ANCHOR;
use crate::error::{Error, ListenerResult, Result};
use crate::identifiers::SessionId;
use crate::intercept::{Direction, InterceptedMessage, Listener, PipelineLocator};
use crate::session::Session;
use crate::transport::{Flow, Pipeline, Stage, StageList, Task};

/// Installs a test subscriber once; `RUST_LOG` controls verbosity.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MockSession
// ============================================================================

pub(crate) struct MockSession {
    id: SessionId,
    name: String,
}

impl MockSession {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::generate(),
            name: name.to_string(),
        })
    }
}

impl Session for MockSession {
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

// ============================================================================
// MockPipeline
// ============================================================================

/// Terminal stage that lets everything through, so tests can see what the
/// host would have received.
struct PassThrough;

impl<M> Stage<M> for PassThrough {}

/// Synchronous pipeline whose submitted tasks wait for `run_pending`.
pub(crate) struct MockPipeline<M> {
    stages: StageList<M>,
    pending: Mutex<Vec<Task>>,
    open: AtomicBool,
}

impl<M: Send + 'static> MockPipeline<M> {
    pub(crate) fn new() -> Arc<Self> {
        let stages = StageList::new();
        let _ = stages.add_last(DEFAULT_ANCHOR, Arc::new(PassThrough));
        Arc::new(Self {
            stages,
            pending: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
        })
    }

    /// Locator that resolves every session to this pipeline.
    pub(crate) fn locator(self: &Arc<Self>) -> impl PipelineLocator<M> + use<M> {
        let pipeline = Arc::clone(self);
        move |_session: &dyn Session| -> Result<Arc<dyn Pipeline<M>>> {
            Ok(Arc::clone(&pipeline) as Arc<dyn Pipeline<M>>)
        }
    }

    /// Runs every submitted task, returning how many ran.
    pub(crate) fn run_pending(&self) -> usize {
        let tasks: Vec<Task> = self.pending.lock().drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub(crate) fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Release);
    }
}

impl MockPipeline<String> {
    /// Returns what the host would receive.
    pub(crate) fn read(&self, message: &str) -> Option<String> {
        self.stages.fire_inbound(message.to_string())
    }

    /// Returns what would leave the process.
    pub(crate) fn write(&self, message: &str) -> Option<String> {
        self.stages.fire_outbound(message.to_string())
    }
}

impl<M: Send + 'static> Pipeline<M> for MockPipeline<M> {
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
        self.open.load(Ordering::Acquire)
    }

    fn execute(&self, task: Task) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        self.pending.lock().push(task);
        Ok(())
    }
}

/// Stage that swallows every outbound message.
pub(crate) struct Swallow;

impl Stage<String> for Swallow {
    fn outbound(&self, _message: String) -> Flow<String> {
        Flow::Stop
    }
}

// ============================================================================
// Listeners
// ============================================================================

/// Records every message it sees.
#[derive(Default)]
pub(crate) struct Recorder {
    seen: Mutex<Vec<(Direction, String)>>,
    sessions: Mutex<Vec<Option<SessionId>>>,
    saw_cancelled: AtomicBool,
}

impl Recorder {
    fn record(&self, message: &InterceptedMessage<String>) -> ListenerResult {
        self.seen
            .lock()
            .push((message.direction(), message.payload().clone()));
        self.sessions.lock().push(message.session_id());
        if message.is_cancelled() {
            self.saw_cancelled.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    pub(crate) fn seen(&self) -> Vec<(Direction, String)> {
        self.seen.lock().clone()
    }

    pub(crate) fn sessions(&self) -> Vec<Option<SessionId>> {
        self.sessions.lock().clone()
    }

    pub(crate) fn count(&self) -> usize {
        self.seen.lock().len()
    }

    pub(crate) fn saw_cancelled(&self) -> bool {
        self.saw_cancelled.load(Ordering::Relaxed)
    }
}

impl Listener<String> for Recorder {
    fn on_send(&self, message: &mut InterceptedMessage<String>) -> ListenerResult {
        self.record(message)
    }

    fn on_receive(&self, message: &mut InterceptedMessage<String>) -> ListenerResult {
        self.record(message)
    }
}

/// Cancels every message equal to `target`.
pub(crate) struct Canceller {
    target: &'static str,
    cancelled: AtomicUsize,
}

impl Canceller {
    pub(crate) fn new(target: &'static str) -> Self {
        Self {
            target,
            cancelled: AtomicUsize::new(0),
        }
    }

    pub(crate) fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn check(&self, message: &mut InterceptedMessage<String>) -> ListenerResult {
        if message.payload() == self.target {
            message.cancel();
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

impl Listener<String> for Canceller {
    fn on_send(&self, message: &mut InterceptedMessage<String>) -> ListenerResult {
        self.check(message)
    }

    fn on_receive(&self, message: &mut InterceptedMessage<String>) -> ListenerResult {
        self.check(message)
    }
}

/// Returns an error for every message.
pub(crate) struct Failing;

impl Listener<String> for Failing {
    fn on_send(&self, _message: &mut InterceptedMessage<String>) -> ListenerResult {
        Err("send failed".into())
    }

    fn on_receive(&self, _message: &mut InterceptedMessage<String>) -> ListenerResult {
        Err("receive failed".into())
    }
}

/// Panics for every message.
pub(crate) struct Panicking;

impl Listener<String> for Panicking {
    fn on_send(&self, _message: &mut InterceptedMessage<String>) -> ListenerResult {
        panic!("listener exploded on send");
    }

    fn on_receive(&self, _message: &mut InterceptedMessage<String>) -> ListenerResult {
        panic!("listener exploded on receive");
    }
}

/// Appends its ID to a shared log for every message.
pub(crate) struct Ordered {
    id: usize,
    log: Arc<Mutex<Vec<usize>>>,
}

impl Ordered {
    pub(crate) fn new(id: usize, log: Arc<Mutex<Vec<usize>>>) -> Self {
        Self { id, log }
    }
}

impl Listener<String> for Ordered {
    fn on_send(&self, _message: &mut InterceptedMessage<String>) -> ListenerResult {
        self.log.lock().push(self.id);
        Ok(())
    }

    fn on_receive(&self, _message: &mut InterceptedMessage<String>) -> ListenerResult {
        self.log.lock().push(self.id);
        Ok(())
    }
}
