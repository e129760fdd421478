//! Low-level field readers and writers shared by the message types.

use bytes::{Buf, BufMut};

use crate::ProtocolError;

/// Fails with [`ProtocolError::Truncated`] unless `needed` bytes remain.
pub(crate) fn ensure(
    buf: &mut impl Buf,
    needed: usize,
    what: &'static str,
) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::Truncated {
            what,
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Reads a fixed-width, NUL-padded UTF-16LE string of `units` code units.
pub(crate) fn read_utf16(
    buf: &mut impl Buf,
    units: usize,
    what: &'static str,
) -> Result<String, ProtocolError> {
    ensure(buf, units * 2, what)?;
    let mut chars = Vec::with_capacity(units);
    for _ in 0..units {
        chars.push(buf.get_u16_le());
    }
    Ok(decode_utf16(&chars))
}

/// Reads UTF-16LE code units until the buffer runs out or a NUL appears.
pub(crate) fn read_utf16_rest(buf: &mut impl Buf) -> String {
    let mut chars = Vec::with_capacity(buf.remaining() / 2);
    while buf.remaining() >= 2 {
        chars.push(buf.get_u16_le());
    }
    decode_utf16(&chars)
}

fn decode_utf16(units: &[u16]) -> String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}

/// Writes `s` as a fixed-width UTF-16LE array of `units` code units.
///
/// The string is cut so at least one NUL terminator always fits.
pub(crate) fn write_utf16(buf: &mut impl BufMut, s: &str, units: usize) {
    let mut written = 0;
    for unit in s.encode_utf16().take(units.saturating_sub(1)) {
        buf.put_u16_le(unit);
        written += 1;
    }
    for _ in written..units {
        buf.put_u16_le(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_utf16_fixed_width_round_trip() {
        let mut buf = BytesMut::new();
        write_utf16(&mut buf, "Yugi", 20);
        assert_eq!(buf.len(), 40);

        let mut reader = buf.freeze();
        assert_eq!(read_utf16(&mut reader, 20, "name").unwrap(), "Yugi");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_write_utf16_truncates_and_keeps_terminator() {
        let mut buf = BytesMut::new();
        write_utf16(&mut buf, "abcdef", 4);
        assert_eq!(&buf[..], &[b'a', 0, b'b', 0, b'c', 0, 0, 0]);
    }

    #[test]
    fn test_read_utf16_truncated() {
        let mut reader: &[u8] = &[b'a', 0, b'b'];
        let err = read_utf16(&mut reader, 2, "name").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated { what: "name", needed: 4, .. }
        ));
    }

    #[test]
    fn test_read_utf16_rest_stops_at_nul() {
        let mut reader: &[u8] = &[b'h', 0, b'i', 0, 0, 0, b'x', 0];
        assert_eq!(read_utf16_rest(&mut reader), "hi");
    }
}
