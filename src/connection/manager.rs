use crate::connection::transport::{HelperConnector, HelperStream, ReadinessRegistration};
use crate::dispatch::{Delivery, MessageSink};
use crate::logging::{log_debug, log_error, log_helper_event, log_warning};
use crate::protocol::{HelperCodec, InboundMessage, OutboundMessage};
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io;
use tokio_util::codec::{Decoder, Encoder};

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Counters kept over the manager's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    pub connect_attempts: u64,
    pub connects: u64,
    pub disconnects: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub dropped_sends: u64,
    pub last_connected_at: Option<DateTime<Utc>>,
}

enum Link<S> {
    Disconnected,
    Connected {
        stream: S,
        registration: ReadinessRegistration,
    },
}

/// Owns the descriptor to the helper daemon.
///
/// There is at most one live stream. It is opened lazily by
/// [`ensure_connected`](Self::ensure_connected) and torn down by
/// [`on_disconnect`](Self::on_disconnect); nothing reconnects on its own.
pub struct ConnectionManager<C: HelperConnector> {
    connector: C,
    link: Link<C::Stream>,
    codec: HelperCodec,
    buffer: BytesMut,
    stats: ConnectionStats,
}

impl<C: HelperConnector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            link: Link::Disconnected,
            codec: HelperCodec::new(),
            buffer: BytesMut::with_capacity(READ_CHUNK),
            stats: ConnectionStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.link {
            Link::Disconnected => ConnectionState::Disconnected,
            Link::Connected { .. } => ConnectionState::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Connect if disconnected. Failure leaves the manager disconnected and
    /// is only logged; the caller retries on a later trigger.
    pub fn ensure_connected(&mut self) -> ConnectionState {
        if self.is_connected() {
            return ConnectionState::Connected;
        }

        self.stats.connect_attempts += 1;

        let stream = match self.connector.connect() {
            Ok(stream) => stream,
            Err(e) => {
                log_debug("connection", "Helper daemon unreachable", Some(&e.to_string()));
                return ConnectionState::Disconnected;
            }
        };

        let registration = match self.connector.register(&stream) {
            Ok(registration) => registration,
            Err(e) => {
                log_warning(
                    "connection",
                    "Failed to watch helper connection",
                    Some(&e.to_string()),
                );
                return ConnectionState::Disconnected;
            }
        };

        self.link = Link::Connected {
            stream,
            registration,
        };
        self.stats.connects += 1;
        self.stats.last_connected_at = Some(Utc::now());
        log_helper_event("connected", &format!("attempt {}", self.stats.connect_attempts));

        ConnectionState::Connected
    }

    /// Drain everything the daemon has sent so far and return the complete
    /// messages in arrival order.
    ///
    /// End-of-file or a read error disconnects after the drain; messages
    /// already complete are still returned.
    pub fn on_readable(&mut self) -> Vec<InboundMessage> {
        let Link::Connected { stream, .. } = &mut self.link else {
            return Vec::new();
        };

        let mut chunk = [0u8; READ_CHUNK];
        let closed = loop {
            match stream.try_read(&mut chunk) {
                Ok(0) => break true,
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break false,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log_warning("connection", "Helper read failed", Some(&e.to_string()));
                    break true;
                }
            }
        };

        let messages = self.decode_buffered();

        if closed {
            self.on_disconnect();
        } else if let Link::Connected { registration, .. } = &self.link {
            registration.rearm();
        }

        messages
    }

    fn decode_buffered(&mut self) -> Vec<InboundMessage> {
        let mut messages = Vec::new();
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => break,
                Err(e) => {
                    log_warning("connection", "Dropping undecodable input", Some(&e.to_string()));
                    self.buffer.clear();
                    break;
                }
            }
        }
        self.stats.messages_received += messages.len() as u64;
        messages
    }

    /// Release the readiness registration, close the stream and forget any
    /// partial record. Safe to call when already disconnected.
    pub fn on_disconnect(&mut self) {
        let previous = std::mem::replace(&mut self.link, Link::Disconnected);
        self.buffer.clear();
        self.codec = HelperCodec::new();

        if let Link::Connected {
            stream,
            mut registration,
        } = previous
        {
            registration.release();
            drop(stream);
            self.stats.disconnects += 1;
            log_helper_event("disconnected", "connection closed");
        }
    }
}

impl<C: HelperConnector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.on_disconnect();
    }
}

impl<C: HelperConnector> MessageSink for ConnectionManager<C> {
    /// Write one record. Nothing is queued: a message that cannot be written
    /// right now is dropped.
    fn send(&mut self, message: &OutboundMessage) -> Delivery {
        let Link::Connected { stream, .. } = &mut self.link else {
            self.stats.dropped_sends += 1;
            log_debug("connection", "Not connected, dropping message", Some(message.command()));
            return Delivery::Dropped;
        };

        let mut frame = BytesMut::new();
        if let Err(e) = self.codec.encode(message, &mut frame) {
            self.stats.dropped_sends += 1;
            log_warning("connection", "Failed to encode message", Some(&e.to_string()));
            return Delivery::Dropped;
        }

        match stream.write_all(&frame) {
            Ok(()) => {
                self.stats.messages_sent += 1;
                Delivery::Sent
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.stats.dropped_sends += 1;
                log_warning(
                    "connection",
                    "Helper socket full, dropping message",
                    Some(message.command()),
                );
                Delivery::Dropped
            }
            Err(e) => {
                self.stats.dropped_sends += 1;
                log_error("connection", "Helper write failed", Some(&e.to_string()));
                self.on_disconnect();
                Delivery::Dropped
            }
        }
    }
}
