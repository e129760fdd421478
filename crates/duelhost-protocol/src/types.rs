//! Identity types shared across the duelhost crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The id of a room, as clients see it in the lobby list and send back in
/// a join request.
///
/// A newtype so a room id can't be mixed up with the other `u32` fields
/// in the same messages (versions, counts, card codes).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

impl From<u32> for RoomId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}
