use crate::bridge::BridgeEvent;
use crate::connection::spawn::HelperSpawner;
use crate::connection::transport::{HelperConnector, HelperStream, ReadinessRegistration};
use crate::error::{BridgeError, Result};
use crate::logging::log_warning;
use socket2::SockRef;
use std::io;
use std::net::Shutdown;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::sync::Notify;
use tokio::sync::mpsc::{UnboundedSender, WeakUnboundedSender};
use tracing::debug;

/// Non-blocking Unix socket to the helper daemon.
///
/// The readiness watcher shares the socket, so dropping this handle shuts it
/// down rather than waiting for the aborted watcher to let go.
#[derive(Debug)]
pub struct UnixHelperStream {
    inner: Arc<UnixStream>,
}

impl Drop for UnixHelperStream {
    fn drop(&mut self) {
        if let Err(e) = SockRef::from(self.inner.as_ref()).shutdown(Shutdown::Both) {
            debug!("Helper socket shutdown failed: {e}");
        }
    }
}

impl HelperStream for UnixHelperStream {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.try_read(buf)
    }

    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        let total = buf.len();
        while !buf.is_empty() {
            match self.inner.try_write(buf) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                // Half a record on the wire would corrupt the stream
                Err(e) if e.kind() == io::ErrorKind::WouldBlock && buf.len() < total => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "helper socket filled up mid-record",
                    ));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Connects to the helper daemon's Unix socket and reports readiness as
/// [`BridgeEvent`]s.
pub struct UnixConnector {
    socket_path: PathBuf,
    // Weak so the bridge's channel still closes once every host handle is gone
    events: WeakUnboundedSender<BridgeEvent>,
    spawner: Option<HelperSpawner>,
}

impl UnixConnector {
    pub fn new(socket_path: PathBuf, events: &UnboundedSender<BridgeEvent>) -> Self {
        Self {
            socket_path,
            events: events.downgrade(),
            spawner: None,
        }
    }

    /// Start the helper server when a connect attempt finds nobody listening
    pub fn with_spawner(mut self, spawner: Option<HelperSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn open(&self) -> io::Result<UnixStream> {
        let stream = std::os::unix::net::UnixStream::connect(&self.socket_path)?;
        stream.set_nonblocking(true)?;
        UnixStream::from_std(stream)
    }
}

impl HelperConnector for UnixConnector {
    type Stream = UnixHelperStream;

    fn connect(&mut self) -> Result<UnixHelperStream> {
        match self.open() {
            Ok(stream) => {
                debug!("Connected to helper at {}", self.socket_path.display());
                Ok(UnixHelperStream {
                    inner: Arc::new(stream),
                })
            }
            Err(e) => {
                if let Some(spawner) = self.spawner.as_mut() {
                    if let Err(spawn_error) = spawner.maybe_spawn() {
                        log_warning("connection", &spawn_error.to_string(), None);
                    }
                }
                Err(BridgeError::ConnectionError(format!(
                    "Failed to connect to helper at {}: {e}",
                    self.socket_path.display()
                )))
            }
        }
    }

    fn register(&mut self, stream: &UnixHelperStream) -> Result<ReadinessRegistration> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            BridgeError::ConnectionError(format!("No runtime to watch helper socket: {e}"))
        })?;

        let rearm = Arc::new(Notify::new());
        let task = runtime.spawn(watch_readiness(
            stream.inner.clone(),
            self.events.clone(),
            rearm.clone(),
        ));

        Ok(ReadinessRegistration::new(task.abort_handle(), rearm))
    }
}

/// Report readability once per arming until the socket errors or the
/// bridge goes away.
async fn watch_readiness(
    stream: Arc<UnixStream>,
    events: WeakUnboundedSender<BridgeEvent>,
    rearm: Arc<Notify>,
) {
    loop {
        let event = match stream.readable().await {
            Ok(()) => BridgeEvent::Readable,
            Err(e) => {
                debug!("Helper socket readiness failed: {e}");
                BridgeEvent::Disconnected
            }
        };
        let delivered = events
            .upgrade()
            .is_some_and(|sender| sender.send(event.clone()).is_ok());
        if !delivered || event == BridgeEvent::Disconnected {
            return;
        }
        rearm.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixListener;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_connect_fails_without_listener() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut connector = UnixConnector::new(temp_dir.path().join("missing.sock"), &tx);

        let result = connector.connect();
        assert!(matches!(result, Err(BridgeError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_failed_connect_triggers_spawner() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let spawner = HelperSpawner::new("true", Duration::from_secs(60)).unwrap();
        let mut connector =
            UnixConnector::new(temp_dir.path().join("missing.sock"), &tx).with_spawner(Some(spawner));

        assert!(connector.connect().is_err());
        assert!(connector.spawner.as_ref().unwrap().cooling_down());
    }

    #[tokio::test]
    async fn test_readiness_reported_and_rearmed() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("helper.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connector = UnixConnector::new(socket_path, &tx);

        let mut stream = connector.connect().unwrap();
        let registration = connector.register(&stream).unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();

        peer.write_all(b"focus_in\n\n").await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(BridgeEvent::Readable));

        let mut buf = [0u8; 64];
        let n = stream.try_read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"focus_in\n\n");
        assert_eq!(
            stream.try_read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );

        registration.rearm();
        peer.write_all(b"im_list_get\n\n").await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(BridgeEvent::Readable));
    }

    #[tokio::test]
    async fn test_dropping_stream_closes_socket_at_once() {
        use std::io::Read;

        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("helper.sock");
        let listener = std::os::unix::net::UnixListener::bind(&socket_path).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut connector = UnixConnector::new(socket_path, &tx);

        let stream = connector.connect().unwrap();
        let registration = connector.register(&stream).unwrap();
        let (mut peer, _) = listener.accept().unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        drop(registration);
        drop(stream);

        // Blocking read keeps the runtime from dropping the aborted watcher
        let mut buf = [0u8; 8];
        assert_eq!(peer.read(&mut buf).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dropped_registration_stops_watcher() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("helper.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connector = UnixConnector::new(socket_path, &tx);

        let stream = connector.connect().unwrap();
        let mut registration = connector.register(&stream).unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();
        assert!(registration.is_active());

        registration.release();
        assert!(!registration.is_active());

        peer.write_all(b"focus_in\n\n").await.unwrap();
        let event = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(event.is_err(), "released watcher still reported {event:?}");
    }

    #[tokio::test]
    async fn test_write_reaches_peer() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("helper.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut connector = UnixConnector::new(socket_path, &tx);

        let mut stream = connector.connect().unwrap();
        let (peer, _) = listener.accept().await.unwrap();
        stream.write_all(b"focus_out\n\n").unwrap();

        let mut buf = [0u8; 64];
        peer.readable().await.unwrap();
        let n = peer.try_read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"focus_out\n\n");
    }
}
