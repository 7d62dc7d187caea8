use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Stand-in for the helper daemon: a listening socket in a temp dir
pub struct FakeHelper {
    _dir: TempDir,
    socket_path: PathBuf,
    listener: UnixListener,
}

impl FakeHelper {
    pub fn bind() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let socket_path = dir.path().join("uim-helper");
        let listener = UnixListener::bind(&socket_path).expect("Failed to bind helper socket");

        Self {
            _dir: dir,
            socket_path,
            listener,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn accept(&self) -> HelperPeer {
        let (stream, _) = tokio::time::timeout(IO_TIMEOUT, self.listener.accept())
            .await
            .expect("Timed out waiting for the bridge to connect")
            .expect("Accept failed");
        HelperPeer::new(stream)
    }

    /// Accept a connection if one arrives within `wait`
    pub async fn try_accept(&self, wait: Duration) -> Option<HelperPeer> {
        match tokio::time::timeout(wait, self.listener.accept()).await {
            Ok(Ok((stream, _))) => Some(HelperPeer::new(stream)),
            _ => None,
        }
    }
}

/// Daemon side of one bridge connection
pub struct HelperPeer {
    stream: UnixStream,
    pending: Vec<u8>,
}

impl HelperPeer {
    fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            pending: Vec::new(),
        }
    }

    pub async fn send(&mut self, data: &str) {
        self.stream.write_all(data.as_bytes()).await.unwrap();
    }

    /// Next record from the bridge, without its terminating empty line
    pub async fn next_record(&mut self) -> String {
        tokio::time::timeout(IO_TIMEOUT, self.read_record())
            .await
            .expect("Timed out waiting for a record from the bridge")
    }

    async fn read_record(&mut self) -> String {
        loop {
            if let Some(end) = self.pending.windows(2).position(|w| w == b"\n\n") {
                let record: Vec<u8> = self.pending.drain(..end + 2).collect();
                return String::from_utf8(record[..=end].to_vec()).unwrap();
            }

            let mut buf = [0u8; 1024];
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "bridge closed the connection");
            self.pending.extend_from_slice(&buf[..n]);
        }
    }
}
