use crate::connection::{HelperConnector, HelperStream, ReadinessRegistration};
use crate::error::{BridgeError, Result};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct PipeState {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    closed: bool,
    read_error: Option<io::ErrorKind>,
    write_error: Option<io::ErrorKind>,
    dropped: bool,
}

/// Both ends of an in-memory helper connection.
///
/// The test keeps one clone to play the daemon while a [`MemoryStream`]
/// hands the other side to the connection manager.
#[derive(Debug, Clone, Default)]
pub struct MemoryPipe {
    state: Arc<Mutex<PipeState>>,
}

impl MemoryPipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the daemon had written them
    pub fn push_inbound(&self, data: &str) {
        self.state.lock().unwrap().inbound.extend(data.as_bytes());
    }

    /// Daemon side closes; reads return end-of-file once drained
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }

    pub fn fail_reads(&self, kind: io::ErrorKind) {
        self.state.lock().unwrap().read_error = Some(kind);
    }

    pub fn fail_writes(&self, kind: io::ErrorKind) {
        self.state.lock().unwrap().write_error = Some(kind);
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().unwrap().written).into_owned()
    }

    /// Records written so far, each without its terminating empty line
    pub fn written_records(&self) -> Vec<String> {
        self.written()
            .split_terminator("\n\n")
            .map(|record| format!("{record}\n"))
            .collect()
    }

    /// Whether the manager has dropped its stream
    pub fn is_dropped(&self) -> bool {
        self.state.lock().unwrap().dropped
    }

    pub fn stream(&self) -> MemoryStream {
        MemoryStream { pipe: self.clone() }
    }
}

/// Manager-side end of a [`MemoryPipe`]
#[derive(Debug)]
pub struct MemoryStream {
    pipe: MemoryPipe,
}

impl HelperStream for MemoryStream {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.pipe.state.lock().unwrap();
        if let Some(kind) = state.read_error.take() {
            return Err(io::Error::from(kind));
        }
        if state.inbound.is_empty() {
            return if state.closed {
                Ok(0)
            } else {
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            };
        }

        let count = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut state = self.pipe.state.lock().unwrap();
        if let Some(kind) = state.write_error {
            return Err(io::Error::from(kind));
        }
        state.written.extend_from_slice(buf);
        Ok(())
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        self.pipe.state.lock().unwrap().dropped = true;
    }
}

#[derive(Debug)]
struct ConnectorState {
    reachable: bool,
    fail_register: bool,
    pipes: Vec<MemoryPipe>,
}

/// Connector handing out [`MemoryPipe`]s, with a switch for the daemon
/// being unreachable. Clones share state.
#[derive(Debug, Clone)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectorState {
                reachable: true,
                fail_register: false,
                pipes: Vec::new(),
            })),
        }
    }

    pub fn unreachable() -> Self {
        let connector = Self::new();
        connector.set_reachable(false);
        connector
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unwrap().reachable = reachable;
    }

    pub fn fail_register(&self, fail: bool) {
        self.state.lock().unwrap().fail_register = fail;
    }

    /// Number of successful connects
    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().pipes.len()
    }

    /// Pipe of the most recent successful connect
    pub fn pipe(&self) -> Option<MemoryPipe> {
        self.state.lock().unwrap().pipes.last().cloned()
    }
}

impl HelperConnector for ScriptedConnector {
    type Stream = MemoryStream;

    fn connect(&mut self) -> Result<MemoryStream> {
        let mut state = self.state.lock().unwrap();
        if !state.reachable {
            return Err(BridgeError::ConnectionError(
                "helper daemon unreachable".to_string(),
            ));
        }

        let pipe = MemoryPipe::new();
        state.pipes.push(pipe.clone());
        Ok(pipe.stream())
    }

    fn register(&mut self, _stream: &MemoryStream) -> Result<ReadinessRegistration> {
        if self.state.lock().unwrap().fail_register {
            return Err(BridgeError::ConnectionError(
                "readiness registration refused".to_string(),
            ));
        }
        Ok(ReadinessRegistration::inert())
    }
}
