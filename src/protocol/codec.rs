//! Record framing for the helper protocol.
//!
//! A record is a run of text lines closed by an empty line:
//!
//! ```text
//! im_change_whole_desktop\n
//! anthy\n
//! \n          <- record boundary
//! ```
//!
//! The decoded message keeps the newline of its last line; the boundary
//! newline is consumed. Bytes are decoded as UTF-8 lossily so a bad byte
//! sequence never costs the connection.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::BridgeError;
use crate::protocol::message::InboundMessage;
use crate::protocol::outbound::OutboundMessage;

const RECORD_BOUNDARY: &[u8] = b"\n\n";

/// Codec splitting the helper byte stream into records
#[derive(Debug, Default)]
pub struct HelperCodec {
    // Bytes already searched without finding a boundary
    scanned: usize,
}

impl HelperCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for HelperCodec {
    type Item = InboundMessage;
    type Error = BridgeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A boundary may straddle the previous scan end by one byte
        let start = self.scanned.saturating_sub(1).min(src.len());

        let Some(offset) = src[start..]
            .windows(RECORD_BOUNDARY.len())
            .position(|window| window == RECORD_BOUNDARY)
        else {
            self.scanned = src.len();
            return Ok(None);
        };

        let boundary = start + offset;
        let record = src.split_to(boundary + RECORD_BOUNDARY.len());
        self.scanned = 0;

        let text = String::from_utf8_lossy(&record[..=boundary]).into_owned();
        Ok(Some(InboundMessage::parse(text)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None => {
                // An unterminated trailing record is dropped
                src.clear();
                self.scanned = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<&OutboundMessage> for HelperCodec {
    type Error = BridgeError;

    fn encode(&mut self, item: &OutboundMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = item.encode();

        dst.reserve(body.len() + RECORD_BOUNDARY.len());
        dst.put_slice(body.as_bytes());
        if !body.ends_with('\n') {
            dst.put_u8(b'\n');
        }
        dst.put_u8(b'\n');

        Ok(())
    }
}
