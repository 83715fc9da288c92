//! Tokio codec for the newline-terminated handshake

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::record::HandshakeRecord;

/// Maximum length of a handshake line, excluding the newline
pub const MAX_HANDSHAKE_LEN: usize = 64 * 1024;

/// Codec that decodes exactly one JSON line into a [`HandshakeRecord`]
///
/// Bytes after the newline stay in the read buffer untouched, so a
/// `FramedRead` can hand them over to the session once the handshake is done.
#[derive(Debug)]
pub struct HandshakeCodec {
    /// Bytes already scanned for a newline
    next_index: usize,
    /// Upper bound on the line length
    max_length: usize,
}

impl HandshakeCodec {
    /// Create a codec with the default length limit
    pub fn new() -> Self {
        Self::with_max_length(MAX_HANDSHAKE_LEN)
    }

    /// Create a codec with a custom length limit
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
        }
    }
}

impl Default for HandshakeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for HandshakeCodec {
    type Item = HandshakeRecord;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

        let Some(offset) = newline else {
            if src.len() > self.max_length {
                return Err(ProtocolError::TooLong {
                    max: self.max_length,
                });
            }
            self.next_index = src.len();
            return Ok(None);
        };

        let line_end = self.next_index + offset;
        self.next_index = 0;
        if line_end > self.max_length {
            return Err(ProtocolError::TooLong {
                max: self.max_length,
            });
        }

        let line = src.split_to(line_end + 1);
        let record: HandshakeRecord = serde_json::from_slice(&line[..line_end])?;
        tracing::trace!("Decoded handshake ({} bytes)", line_end);
        Ok(Some(record))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(record) => Ok(Some(record)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }
}

impl Encoder<HandshakeRecord> for HandshakeCodec {
    type Error = ProtocolError;

    fn encode(&mut self, record: HandshakeRecord, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&record)?;
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Serialize a record as one JSON line and flush it to `writer`
pub async fn write_record<W, T>(writer: &mut W, record: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
