//! Frame Reading
//!
//! The wire is a TCP stream of consecutive frames, each a varint length
//! prefix followed by exactly that many payload bytes.
//!
//! # Length Prefix
//!
//! This deployment uses the variable-length continuation-bit encoding
//! (LEB128, the protobuf varint): each prefix byte carries seven payload bits
//! and a high continuation bit. A prefix with 32 or more significant bits is
//! malformed. The fixed 4-byte little-endian prefix used by one historical
//! revision of the feed is NOT supported; a deployment speaks exactly one
//! encoding.
//!
//! # Failure Model
//!
//! Any malformed prefix, oversized frame, or mid-frame EOF is a
//! [`ProtocolError`] and terminates the frame sequence; there is no
//! resynchronization. A clean EOF at a frame boundary ends the sequence
//! normally.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Default cap on a single frame's payload size.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1 << 20;

/// Errors raised while framing or decoding the wire stream.
///
/// All variants are fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Length prefix did not terminate within 32 bits.
    #[error("varint length prefix exceeds 32 bits")]
    VarintOverflow,

    /// Frame payload larger than the configured cap.
    #[error("frame of {len} bytes exceeds maximum of {max}")]
    FrameTooLarge {
        /// Declared payload length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Stream ended partway through a prefix or payload.
    #[error("stream truncated mid-frame")]
    Truncated,

    /// Payload failed schema validation.
    #[error("frame payload failed to decode: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Underlying read failed.
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads varint length-prefixed frames off a byte stream.
///
/// `next_frame` suspends until enough bytes are available for the next frame,
/// looping partial reads until the exact frame length is consumed.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    max_frame_bytes: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a byte source with the default frame size cap.
    pub fn new(inner: R) -> Self {
        Self::with_max_frame_bytes(inner, DEFAULT_MAX_FRAME_BYTES)
    }

    /// Wrap a byte source with an explicit frame size cap.
    pub const fn with_max_frame_bytes(inner: R, max_frame_bytes: usize) -> Self {
        Self {
            inner,
            max_frame_bytes,
        }
    }

    /// Read the next frame's payload.
    ///
    /// Returns `Ok(None)` on a clean EOF at a frame boundary.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] on a malformed prefix, an oversized frame,
    /// a mid-frame EOF, or a failed read. After an error the reader must not
    /// be used again.
    pub async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        let Some(len) = self.read_varint().await? else {
            return Ok(None);
        };

        let len = len as usize;
        if len > self.max_frame_bytes {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_frame_bytes,
            });
        }

        let mut payload = vec![0u8; len];
        self.inner
            .read_exact(&mut payload)
            .await
            .map_err(eof_as_truncation)?;
        Ok(Some(payload))
    }

    /// Read one varint, byte at a time.
    ///
    /// EOF before the first byte is a clean end of stream; EOF after it is a
    /// truncation.
    async fn read_varint(&mut self) -> Result<Option<u32>, ProtocolError> {
        let mut result: u32 = 0;
        let mut shift: u32 = 0;
        let mut buf = [0u8; 1];

        loop {
            match self.inner.read_exact(&mut buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    if shift == 0 {
                        return Ok(None);
                    }
                    return Err(ProtocolError::Truncated);
                }
                Err(e) => return Err(e.into()),
            }

            let byte = buf[0];
            if shift >= 32 {
                return Err(ProtocolError::VarintOverflow);
            }
            result |= u32::from(byte & 0x7f) << shift;
            shift += 7;

            if byte & 0x80 == 0 {
                return Ok(Some(result));
            }
        }
    }
}

fn eof_as_truncation(e: std::io::Error) -> ProtocolError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::Truncated
    } else {
        ProtocolError::Io(e)
    }
}

/// Encode one frame: varint length prefix followed by the payload bytes.
///
/// Used by tests and stream-producing tooling.
#[must_use]
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    let mut len = payload.len() as u32;
    loop {
        let byte = (len & 0x7f) as u8;
        len >>= 7;
        if len == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out.extend_from_slice(payload);
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use proptest::prelude::*;

    use super::*;

    /// Byte source that returns at most one preset chunk per read call,
    /// forcing the reader to loop over partial reads.
    struct ChunkedReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkedReader {
        fn new(bytes: &[u8], chunk_sizes: &[usize]) -> Self {
            let mut chunks = VecDeque::new();
            let mut rest = bytes;
            for &size in chunk_sizes {
                if rest.is_empty() {
                    break;
                }
                let take = size.clamp(1, rest.len());
                chunks.push_back(rest[..take].to_vec());
                rest = &rest[take..];
            }
            if !rest.is_empty() {
                chunks.push_back(rest.to_vec());
            }
            Self { chunks }
        }
    }

    impl AsyncRead for ChunkedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let Some(mut chunk) = self.chunks.pop_front() else {
                return Poll::Ready(Ok(())); // EOF
            };
            let take = chunk.len().min(buf.remaining());
            buf.put_slice(&chunk[..take]);
            if take < chunk.len() {
                chunk.drain(..take);
                self.chunks.push_front(chunk);
            }
            Poll::Ready(Ok(()))
        }
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[tokio::test]
    async fn reads_consecutive_frames() {
        let mut wire = encode_frame(b"first");
        wire.extend(encode_frame(b"second"));
        let mut reader = FrameReader::new(wire.as_slice());

        assert_eq!(reader.next_frame().await.unwrap().unwrap(), b"first");
        assert_eq!(reader.next_frame().await.unwrap().unwrap(), b"second");
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_payload_is_a_valid_frame() {
        let wire = encode_frame(b"");
        let mut reader = FrameReader::new(wire.as_slice());
        assert_eq!(reader.next_frame().await.unwrap().unwrap(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn multi_byte_varint_prefix_round_trips() {
        let payload = vec![0xabu8; 300]; // length needs two varint bytes
        let wire = encode_frame(&payload);
        assert_eq!(wire[0] & 0x80, 0x80);
        let mut reader = FrameReader::new(wire.as_slice());
        assert_eq!(reader.next_frame().await.unwrap().unwrap(), payload);
    }

    #[tokio::test]
    async fn truncated_payload_is_an_error() {
        let mut wire = encode_frame(b"hello");
        wire.truncate(wire.len() - 2);
        let mut reader = FrameReader::new(wire.as_slice());
        assert!(matches!(
            reader.next_frame().await,
            Err(ProtocolError::Truncated)
        ));
    }

    #[tokio::test]
    async fn truncated_prefix_is_an_error() {
        // Continuation bit set, then EOF.
        let wire = [0x80u8];
        let mut reader = FrameReader::new(wire.as_slice());
        assert!(matches!(
            reader.next_frame().await,
            Err(ProtocolError::Truncated)
        ));
    }

    #[tokio::test]
    async fn overlong_varint_is_an_error() {
        let wire = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        let mut reader = FrameReader::new(wire.as_slice());
        assert!(matches!(
            reader.next_frame().await,
            Err(ProtocolError::VarintOverflow)
        ));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let wire = encode_frame(&vec![0u8; 64]);
        let mut reader = FrameReader::with_max_frame_bytes(wire.as_slice(), 16);
        assert!(matches!(
            reader.next_frame().await,
            Err(ProtocolError::FrameTooLarge { len: 64, max: 16 })
        ));
    }

    proptest! {
        /// Splitting the encoded frame into arbitrarily-sized chunks and
        /// feeding them one at a time yields exactly the original payload.
        #[test]
        fn framing_round_trips_under_arbitrary_chunking(
            payload in proptest::collection::vec(any::<u8>(), 0..512),
            chunk_sizes in proptest::collection::vec(1usize..16, 1..64),
        ) {
            let wire = encode_frame(&payload);
            let reader = ChunkedReader::new(&wire, &chunk_sizes);
            let mut framed = FrameReader::new(reader);

            let decoded = block_on(async {
                let frame = framed.next_frame().await.unwrap().unwrap();
                prop_assert!(framed.next_frame().await.unwrap().is_none());
                Ok(frame)
            })?;
            prop_assert_eq!(decoded, payload);
        }
    }
}
