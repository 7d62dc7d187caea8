use crate::error::Result;
use std::io;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::AbortHandle;

/// Non-blocking byte stream to the helper daemon
pub trait HelperStream {
    /// Read what is currently available. `Ok(0)` means the peer closed the
    /// stream; `WouldBlock` means nothing is buffered right now.
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write a whole record or fail
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// Opens helper streams and arranges for readiness notifications
pub trait HelperConnector {
    type Stream: HelperStream;

    fn connect(&mut self) -> Result<Self::Stream>;

    fn register(&mut self, stream: &Self::Stream) -> Result<ReadinessRegistration>;
}

/// Handle on the task watching a stream for readability.
///
/// The watcher reports readiness once and then waits for [`rearm`] before
/// reporting again. Releasing or dropping the registration stops it.
///
/// [`rearm`]: ReadinessRegistration::rearm
#[derive(Debug, Default)]
pub struct ReadinessRegistration {
    task: Option<AbortHandle>,
    rearm: Option<Arc<Notify>>,
}

impl ReadinessRegistration {
    pub fn new(task: AbortHandle, rearm: Arc<Notify>) -> Self {
        Self {
            task: Some(task),
            rearm: Some(rearm),
        }
    }

    /// A registration with no watcher behind it, for transports that are
    /// polled by the caller.
    pub fn inert() -> Self {
        Self::default()
    }

    pub fn rearm(&self) {
        if let Some(rearm) = &self.rearm {
            rearm.notify_one();
        }
    }

    pub fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.rearm = None;
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ReadinessRegistration {
    fn drop(&mut self) {
        self.release();
    }
}
