//! Decoding of the controller's fixed-size event records.

use crate::defs::{EventId, EVENT_BUFF_SIZE, MAX_EVENT_COUNT};

mod gesture;
mod status;
mod touchpoint;

pub use gesture::*;
pub use status::*;
pub use touchpoint::*;

/// One raw record as it comes off the bus.
pub type RawEvent = [u8; EVENT_BUFF_SIZE];

/// Protocol violations detected while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
  /// The device claims more pending records than one burst can hold.
  #[error("event stack overflow ({0} pending)")]
  Overflow(u8),
  /// Both tag bits set: the record was mangled on the bus.
  #[error("corrupt event record (byte0 {0:#04x})")]
  Corrupt(u8),
}

/// A decoded event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  Coordinate(Coordinate),
  Status(Status),
  Gesture(Gesture),
  /// Nothing queued on the device.
  Empty,
}

impl Event {
  /// Records still queued behind this one, as reported by the device.
  pub const fn left_event(raw: &RawEvent) -> u8 {
    raw[7] & 0x1F
  }

  /// Number of extra records to burst-read after `first`.
  pub fn pending(first: &RawEvent) -> Result<usize, DecodeError> {
    let left = Self::left_event(first);
    if usize::from(left) > MAX_EVENT_COUNT - 1 {
      return Err(DecodeError::Overflow(left));
    }
    Ok(usize::from(left))
  }
}

impl TryFrom<&RawEvent> for Event {
  type Error = DecodeError;

  fn try_from(raw: &RawEvent) -> Result<Self, Self::Error> {
    if raw[0] == 0 {
      return Ok(Self::Empty);
    }
    match EventId::from_bits(raw[0]) {
      EventId::Coordinate => Ok(Self::Coordinate(Coordinate::from(raw))),
      EventId::Status => Ok(Self::Status(Status::from(raw))),
      EventId::Gesture => Ok(Self::Gesture(Gesture::from(raw))),
      EventId::Reserved => Err(DecodeError::Corrupt(raw[0])),
    }
  }
}
