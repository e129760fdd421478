//! Deck submissions.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::wire::ensure;

/// Hard cap on cards in one submission, main and side together.
///
/// Far above any legal deck; it only stops a hostile count from driving
/// a huge allocation.
pub const MAX_DECK_CARDS: usize = 256;

/// A submitted deck: lists of card codes.
///
/// The wire format does not separate the extra deck from the main deck
/// (telling them apart needs the card database), so `main` holds both.
/// The server treats the deck as opaque; legality is the engine's call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    /// Main and extra deck card codes.
    pub main: Vec<u32>,
    /// Side deck card codes.
    pub side: Vec<u32>,
}

impl Deck {
    /// Parses a deck body: `main_count u32, side_count u32, codes...`.
    ///
    /// # Errors
    /// - [`ProtocolError::Truncated`] if the counts or codes are cut short
    /// - [`ProtocolError::InvalidMessage`] if the counts exceed
    ///   [`MAX_DECK_CARDS`]
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        ensure(buf, 8, "deck counts")?;
        let main_count = buf.get_u32_le() as usize;
        let side_count = buf.get_u32_le() as usize;

        let total = main_count.saturating_add(side_count);
        if total > MAX_DECK_CARDS {
            return Err(ProtocolError::InvalidMessage(format!(
                "deck of {total} cards exceeds {MAX_DECK_CARDS}"
            )));
        }
        ensure(buf, total * 4, "deck cards")?;

        let main = (0..main_count).map(|_| buf.get_u32_le()).collect();
        let side = (0..side_count).map(|_| buf.get_u32_le()).collect();
        Ok(Self { main, side })
    }

    /// Encodes the deck in the same layout `decode` reads.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.main.len() as u32);
        buf.put_u32_le(self.side.len() as u32);
        for code in self.main.iter().chain(&self.side) {
            buf.put_u32_le(*code);
        }
    }

    /// The encoded body as a standalone buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Size of the encoded body in bytes.
    pub fn encoded_len(&self) -> usize {
        8 + 4 * (self.main.len() + self.side.len())
    }

    /// Total card count.
    pub fn len(&self) -> usize {
        self.main.len() + self.side.len()
    }

    /// Returns `true` if the deck has no cards at all.
    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.side.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_splits_main_and_side() {
        let mut body = BytesMut::new();
        body.put_u32_le(3);
        body.put_u32_le(1);
        for code in [89631139u32, 46986414, 89631139, 5318639] {
            body.put_u32_le(code);
        }

        let deck = Deck::decode(&mut body.freeze()).unwrap();
        assert_eq!(deck.main, vec![89631139, 46986414, 89631139]);
        assert_eq!(deck.side, vec![5318639]);
        assert_eq!(deck.len(), 4);
    }

    #[test]
    fn test_decode_rejects_missing_cards() {
        let mut body = BytesMut::new();
        body.put_u32_le(2);
        body.put_u32_le(0);
        body.put_u32_le(1);

        let err = Deck::decode(&mut body.freeze()).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { what: "deck cards", .. }));
    }

    #[test]
    fn test_decode_rejects_absurd_counts() {
        let mut body = BytesMut::new();
        body.put_u32_le(u32::MAX);
        body.put_u32_le(u32::MAX);

        let err = Deck::decode(&mut body.freeze()).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_encoded_len_matches_bytes() {
        let deck = Deck {
            main: vec![1, 2, 3],
            side: vec![4],
        };
        assert_eq!(deck.to_bytes().len(), deck.encoded_len());
        assert_eq!(Deck::decode(&mut deck.to_bytes()).unwrap(), deck);
    }
}
