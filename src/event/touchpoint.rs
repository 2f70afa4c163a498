use crate::defs::{Action, TouchType, EVENT_BUFF_SIZE, SLOT_COUNT};

/// Decoded coordinate record.
///
/// Byte layout (bit 0 is the least significant):
///
/// | byte | bits                                             |
/// |------|--------------------------------------------------|
/// | 0    | eid 1:0, tid 5:2, tchsta 7:6                     |
/// | 1    | x 11:4                                           |
/// | 2    | y 11:4                                           |
/// | 3    | y 3:0 in 3:0, x 3:0 in 7:4                       |
/// | 4, 5 | major, minor                                     |
/// | 6    | z 5:0, ttype 3:2 in 7:6                          |
/// | 7    | left_event 4:0, max_energy 5, ttype 1:0 in 7:6   |
/// | 8, 9 | noise_level, max_strength                        |
/// | 10   | hover_id_num 3:0, noise_status 5:4               |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
  /// Wire track id, 1-based.
  pub tid: u8,
  pub action: Action,
  pub x: u16,
  pub y: u16,
  pub major: u8,
  pub minor: u8,
  /// Pressure, never reported below 1.
  pub z: u8,
  pub touch_type: TouchType,
  pub left_event: u8,
  pub max_energy: bool,
  pub noise_level: u8,
  pub max_strength: u8,
  pub hover_id_num: u8,
  pub noise_status: u8,
}

impl Coordinate {
  pub const fn new(tid: u8, action: Action, x: u16, y: u16) -> Self {
    Self {
      tid,
      action,
      x,
      y,
      major: 0,
      minor: 0,
      z: 1,
      touch_type: TouchType::Normal,
      left_event: 0,
      max_energy: false,
      noise_level: 0,
      max_strength: 0,
      hover_id_num: 0,
      noise_status: 0,
    }
  }

  pub const fn with_touch_type(mut self, touch_type: TouchType) -> Self {
    self.touch_type = touch_type;
    self
  }

  pub const fn with_max_energy(mut self, max_energy: bool) -> Self {
    self.max_energy = max_energy;
    self
  }

  pub const fn with_z(mut self, z: u8) -> Self {
    self.z = z;
    self
  }

  pub const fn with_noise(mut self, noise_level: u8, max_strength: u8, hover_id_num: u8) -> Self {
    self.noise_level = noise_level;
    self.max_strength = max_strength;
    self.hover_id_num = hover_id_num;
    self
  }

  /// Zero-based slot index, or `None` when the track id is out of range.
  pub fn slot(&self) -> Option<usize> {
    usize::from(self.tid).checked_sub(1).filter(|slot| *slot < SLOT_COUNT)
  }

  /// Pack into the on-wire layout. Fields wider than their slot are truncated.
  pub fn to_bytes(&self) -> [u8; EVENT_BUFF_SIZE] {
    let ttype = self.touch_type.bits();
    let mut raw = [0u8; EVENT_BUFF_SIZE];
    raw[0] = ((self.tid & 0xF) << 2) | (self.action.bits() << 6);
    raw[1] = (self.x >> 4) as u8;
    raw[2] = (self.y >> 4) as u8;
    raw[3] = ((self.x & 0xF) as u8) << 4 | (self.y & 0xF) as u8;
    raw[4] = self.major;
    raw[5] = self.minor;
    raw[6] = (self.z & 0x3F) | ((ttype >> 2) & 0x3) << 6;
    raw[7] = (self.left_event & 0x1F) | u8::from(self.max_energy) << 5 | (ttype & 0x3) << 6;
    raw[8] = self.noise_level;
    raw[9] = self.max_strength;
    raw[10] = (self.hover_id_num & 0xF) | (self.noise_status & 0x3) << 4;
    raw
  }
}

impl From<&[u8; EVENT_BUFF_SIZE]> for Coordinate {
  fn from(raw: &[u8; EVENT_BUFF_SIZE]) -> Self {
    let z = raw[6] & 0x3F;
    Self {
      tid: (raw[0] >> 2) & 0xF,
      action: Action::from_bits(raw[0] >> 6),
      x: u16::from(raw[1]) << 4 | u16::from(raw[3] >> 4),
      y: u16::from(raw[2]) << 4 | u16::from(raw[3] & 0xF),
      major: raw[4],
      minor: raw[5],
      z: if z == 0 { 1 } else { z },
      touch_type: TouchType::from_bits((raw[6] >> 6) << 2 | raw[7] >> 6),
      left_event: raw[7] & 0x1F,
      max_energy: raw[7] & 0x20 != 0,
      noise_level: raw[8],
      max_strength: raw[9],
      hover_id_num: raw[10] & 0xF,
      noise_status: (raw[10] >> 4) & 0x3,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn coordinates_survive_nibble_packing() {
    let corners = [0u16, 1, 0xF, 0x10, 0x7FF, 0x800, 0xFFE, 0xFFF];
    for &x in &corners {
      for &y in &corners {
        let decoded = Coordinate::from(&Coordinate::new(1, Action::Move, x, y).to_bytes());
        assert_eq!((decoded.x, decoded.y), (x, y));
      }
    }
    for x in (0..=4095u16).step_by(97) {
      let y = 4095 - x;
      let decoded = Coordinate::from(&Coordinate::new(3, Action::Move, x, y).to_bytes());
      assert_eq!((decoded.x, decoded.y), (x, y));
    }
  }

  #[test]
  fn decodes_known_record() {
    // tid 2, press, x 0x123, y 0x456, z 0, palm (5 = 0b01_01), max energy, 4 left
    let raw = [0x48, 0x12, 0x45, 0x36, 7, 5, 0x40, 0x64, 9, 80, 0x23, 0, 0, 0, 0, 0];
    let c = Coordinate::from(&raw);
    assert_eq!(c.tid, 2);
    assert_eq!(c.slot(), Some(1));
    assert_eq!(c.action, Action::Press);
    assert_eq!((c.x, c.y), (0x123, 0x456));
    assert_eq!((c.major, c.minor), (7, 5));
    assert_eq!(c.z, 1);
    assert_eq!(c.touch_type, TouchType::Palm);
    assert!(c.max_energy);
    assert_eq!(c.left_event, 4);
    assert_eq!((c.noise_level, c.max_strength), (9, 80));
    assert_eq!((c.hover_id_num, c.noise_status), (3, 2));
  }

  #[test]
  fn track_id_zero_and_above_range_have_no_slot() {
    assert_eq!(Coordinate::new(0, Action::Press, 0, 0).slot(), None);
    assert_eq!(Coordinate::new(11, Action::Press, 0, 0).slot(), Some(10));
    assert_eq!(Coordinate::new(12, Action::Press, 0, 0).slot(), None);
  }
}
