//! Length-prefixed framing over a byte stream.
//!
//! Every message on the wire, in both directions and on the duel engine's
//! stdio, looks like this:
//!
//! ```text
//! ┌────────────┬──────────────────────────────┐
//! │ len: u16le │ payload: [u8; len]           │
//! └────────────┴──────────────────────────────┘
//! ```
//!
//! TCP delivers bytes in arbitrary chunks, so a single read can hold zero,
//! one, or many frames, and a frame can straddle two reads. The
//! [`FrameDecoder`] buffers bytes until whole frames are available and
//! hands them out strictly in arrival order.

use bytes::{Buf, Bytes, BytesMut};

use crate::ProtocolError;

/// Size of the length header in bytes.
pub const HEADER_LEN: usize = 2;

/// Default upper bound on a client frame's payload.
///
/// The largest legitimate client command (a create-game request) is a
/// little over 500 bytes; a deck update with a generous card count stays
/// well below this.
pub const DEFAULT_MAX_FRAME_LEN: usize = 4096;

/// The largest payload the 16-bit header can describe.
pub const MAX_WIRE_FRAME_LEN: usize = u16::MAX as usize;

/// Reassembles length-prefixed frames from arbitrarily chunked input.
///
/// The buffer belongs to exactly one connection (or one engine process)
/// and is never shared.
///
/// # Example
///
/// ```rust
/// use duelhost_protocol::FrameDecoder;
///
/// let mut decoder = FrameDecoder::new();
/// // One frame ("hi") and the first byte of the next header.
/// decoder.feed(&[2, 0, b'h', b'i', 1]).unwrap();
///
/// let mut frames = Vec::new();
/// while decoder.is_message_ready() {
///     frames.push(decoder.take_message().unwrap());
/// }
/// assert_eq!(frames, vec![&b"hi"[..]]);
/// assert!(!decoder.is_message_ready());
/// ```
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_len: usize,
}

impl FrameDecoder {
    /// Creates a decoder with [`DEFAULT_MAX_FRAME_LEN`].
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Creates a decoder that rejects payloads longer than `max_len`.
    ///
    /// Values above [`MAX_WIRE_FRAME_LEN`] are clamped, since the header
    /// can't express them anyway.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_len: max_len.min(MAX_WIRE_FRAME_LEN),
        }
    }

    /// The configured payload bound.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Appends a chunk of bytes read from the stream.
    ///
    /// # Errors
    /// Returns [`ProtocolError::FrameTooLarge`] as soon as the header at
    /// the front of the buffer declares an oversized payload.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), ProtocolError> {
        self.buf.extend_from_slice(chunk);
        self.check_header()
    }

    /// Returns `true` iff at least one complete frame is buffered.
    pub fn is_message_ready(&self) -> bool {
        match self.declared_len() {
            Some(len) => {
                len <= self.max_len && self.buf.len() >= HEADER_LEN + len
            }
            None => false,
        }
    }

    /// Removes and returns the payload of the first complete frame.
    ///
    /// Any bytes after it (another frame, or part of one) stay buffered.
    ///
    /// # Errors
    /// - [`ProtocolError::FrameTooLarge`] if the front header is oversized
    /// - [`ProtocolError::Incomplete`] if no full frame is buffered
    pub fn take_message(&mut self) -> Result<Bytes, ProtocolError> {
        self.check_header()?;
        let len = self.declared_len().ok_or(ProtocolError::Incomplete)?;
        if self.buf.len() < HEADER_LEN + len {
            return Err(ProtocolError::Incomplete);
        }
        self.buf.advance(HEADER_LEN);
        Ok(self.buf.split_to(len).freeze())
    }

    /// Validates the header at the front of the buffer, if one is there.
    ///
    /// `feed` already does this. Call it again after draining, so a bad
    /// header that arrived behind good frames is caught right away instead
    /// of on the next read.
    pub fn check_header(&self) -> Result<(), ProtocolError> {
        match self.declared_len() {
            Some(len) if len > self.max_len => {
                Err(ProtocolError::FrameTooLarge {
                    len,
                    max: self.max_len,
                })
            }
            _ => Ok(()),
        }
    }

    /// Number of bytes currently buffered (headers included).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn declared_len(&self) -> Option<usize> {
        match self.buf.get(..HEADER_LEN) {
            Some(&[lo, hi]) => Some(u16::from_le_bytes([lo, hi]) as usize),
            _ => None,
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefixes `payload` with its length header.
///
/// # Errors
/// Returns [`ProtocolError::FrameTooLarge`] if the payload can't be
/// described by the 16-bit header.
pub fn encode_frame(payload: &[u8]) -> Result<Bytes, ProtocolError> {
    let len = u16::try_from(payload.len()).map_err(|_| {
        ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_WIRE_FRAME_LEN,
        }
    })?;
    let mut out = BytesMut::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8]) -> Vec<u8> {
        encode_frame(payload).unwrap().to_vec()
    }

    fn drain(decoder: &mut FrameDecoder) -> Vec<Bytes> {
        let mut out = Vec::new();
        while decoder.is_message_ready() {
            out.push(decoder.take_message().unwrap());
        }
        out
    }

    #[test]
    fn test_single_frame_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&frame(b"\x22")).unwrap();

        assert_eq!(drain(&mut decoder), vec![Bytes::from_static(b"\x22")]);
        assert!(!decoder.is_message_ready());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_three_frames_in_one_chunk_come_out_in_order() {
        let mut chunk = frame(b"\x10alice");
        chunk.extend(frame(b"\x02deck"));
        chunk.extend(frame(b"\x22"));

        let mut decoder = FrameDecoder::new();
        decoder.feed(&chunk).unwrap();

        let frames = drain(&mut decoder);
        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][..], b"\x10alice");
        assert_eq!(&frames[1][..], b"\x02deck");
        assert_eq!(&frames[2][..], b"\x22");
    }

    #[test]
    fn test_frame_straddling_chunks() {
        let bytes = frame(b"\x16hello world");
        let mut decoder = FrameDecoder::new();

        decoder.feed(&bytes[..1]).unwrap();
        assert!(!decoder.is_message_ready(), "half a header is not a frame");
        decoder.feed(&bytes[1..5]).unwrap();
        assert!(!decoder.is_message_ready(), "header without full body");
        decoder.feed(&bytes[5..]).unwrap();

        assert_eq!(drain(&mut decoder), vec![Bytes::copy_from_slice(&bytes[2..])]);
    }

    #[test]
    fn test_every_split_point_yields_same_frames() {
        let payloads: Vec<&[u8]> = vec![
            &b"\x10abc"[..],
            &b""[..],
            &b"\x25"[..],
            &b"\x02\x01\x02\x03\x04"[..],
        ];
        let mut stream = Vec::new();
        for p in &payloads {
            stream.extend(frame(p));
        }
        // Trailing partial frame: header says 9, only 3 bytes follow.
        stream.extend_from_slice(&[9, 0, 1, 2, 3]);

        for split in 0..=stream.len() {
            let mut decoder = FrameDecoder::new();
            let mut frames = Vec::new();
            decoder.feed(&stream[..split]).unwrap();
            frames.extend(drain(&mut decoder));
            decoder.feed(&stream[split..]).unwrap();
            frames.extend(drain(&mut decoder));

            assert_eq!(frames.len(), payloads.len(), "split at {split}");
            for (got, want) in frames.iter().zip(&payloads) {
                assert_eq!(&got[..], *want, "split at {split}");
            }
            assert!(!decoder.is_message_ready());
            assert_eq!(decoder.buffered(), 5);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut stream = frame(b"\x13");
        stream.extend(frame(b"\x14xyz"));

        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for b in &stream {
            decoder.feed(std::slice::from_ref(b)).unwrap();
            frames.extend(drain(&mut decoder));
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[1][..], b"\x14xyz");
    }

    #[test]
    fn test_oversized_header_rejected_on_feed() {
        let mut decoder = FrameDecoder::with_max_len(16);
        let err = decoder.feed(&[17, 0]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FrameTooLarge { len: 17, max: 16 }
        ));
        assert!(!decoder.is_message_ready());
    }

    #[test]
    fn test_oversized_header_behind_good_frame() {
        let mut chunk = frame(b"\x22");
        chunk.extend_from_slice(&[0xff, 0xff, 0]);

        let mut decoder = FrameDecoder::with_max_len(64);
        decoder.feed(&chunk).unwrap();
        assert_eq!(drain(&mut decoder).len(), 1, "good frame still delivered");
        assert!(matches!(
            decoder.check_header(),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
        assert!(decoder.take_message().is_err());
    }

    #[test]
    fn test_take_without_frame_is_incomplete() {
        let mut decoder = FrameDecoder::new();
        assert!(matches!(
            decoder.take_message(),
            Err(ProtocolError::Incomplete)
        ));
        decoder.feed(&[4, 0, 1]).unwrap();
        assert!(matches!(
            decoder.take_message(),
            Err(ProtocolError::Incomplete)
        ));
        // The partial frame is still intact.
        assert_eq!(decoder.buffered(), 3);
    }

    #[test]
    fn test_max_len_clamped_to_header_range() {
        let decoder = FrameDecoder::with_max_len(1 << 20);
        assert_eq!(decoder.max_len(), MAX_WIRE_FRAME_LEN);
    }

    #[test]
    fn test_encode_frame_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_WIRE_FRAME_LEN + 1];
        assert!(encode_frame(&payload).is_err());
    }
}
