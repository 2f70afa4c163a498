use crate::defs::{GestureCode, EVENT_BUFF_SIZE};

/// Decoded wake-gesture record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gesture {
  pub code: GestureCode,
  pub gesture_id: u8,
  pub data: [u8; 4],
}

impl Gesture {
  /// 12-bit gesture location carried in the first three data bytes.
  pub fn position(&self) -> (u16, u16) {
    let [d1, d2, d3, _] = self.data;
    let x = u16::from(d1) << 4 | u16::from(d3 >> 4);
    let y = u16::from(d2) << 4 | u16::from(d3 & 0x0F);
    (x, y)
  }
}

impl From<&[u8; EVENT_BUFF_SIZE]> for Gesture {
  fn from(raw: &[u8; EVENT_BUFF_SIZE]) -> Self {
    Self {
      code: GestureCode::from_bits((raw[0] >> 2) & 0xF),
      gesture_id: raw[1],
      data: [raw[2], raw[3], raw[4], raw[5]],
    }
  }
}
