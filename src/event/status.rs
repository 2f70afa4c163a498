use crate::defs::{
  StatusType, ACK_BOOT_COMPLETE, ACK_WET_MODE, ERR_EVENT_ESD, ERR_EVENT_QUEUE_FULL, EVENT_BUFF_SIZE,
  VENDOR_ACK_NOISE_STATUS_NOTI, VENDOR_ACK_PRE_NOISE_STATUS_NOTI, VENDOR_PROXIMITY, VENDOR_STATE_CHANGED,
  WATCHDOG_BOOT_MARKER,
};

/// Decoded status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
  pub stype: StatusType,
  pub status_id: u8,
  pub data: [u8; 5],
  pub left_event: u8,
}

/// Status records the driver acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
  /// The controller rebooted on its own and lost its configuration.
  WatchdogReset,
  QueueFull,
  Esd,
  WetMode(bool),
  /// Scan mode changed; `mode` is the new vendor mode word.
  StateChanged { mode: u16, scan: Option<ScanChange> },
  Noise(bool),
  PreNoise(bool),
  Proximity(u8),
  Other,
}

/// Scan transitions the vendor state word reports to the gesture layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanChange {
  Normal,
  LowPower,
  Sleep,
}

impl Status {
  /// `true` if this record acknowledges `ack` with an informational sub-type.
  pub fn is_ack(&self, ack: u8) -> bool {
    matches!(self.stype, StatusType::Info | StatusType::VendorInfo) && self.status_id == ack
  }

  pub fn notification(&self) -> Notification {
    let [d1, d2, _, _, _] = self.data;
    match (self.stype, self.status_id) {
      (StatusType::Info, ACK_BOOT_COMPLETE) if d1 == WATCHDOG_BOOT_MARKER => Notification::WatchdogReset,
      (StatusType::Info, ACK_WET_MODE) => Notification::WetMode(d1 != 0),
      (StatusType::Error, ERR_EVENT_QUEUE_FULL) => Notification::QueueFull,
      (StatusType::Error, ERR_EVENT_ESD) => Notification::Esd,
      (StatusType::VendorInfo, VENDOR_STATE_CHANGED) => {
        let scan = match (d1, d2) {
          (2, 2) => Some(ScanChange::Normal),
          (5, 2) => Some(ScanChange::LowPower),
          (6, _) => Some(ScanChange::Sleep),
          _ => None,
        };
        Notification::StateChanged { mode: u16::from_be_bytes([d1, d2]), scan }
      }
      (StatusType::VendorInfo, VENDOR_ACK_NOISE_STATUS_NOTI) => Notification::Noise(d1 != 0),
      (StatusType::VendorInfo, VENDOR_ACK_PRE_NOISE_STATUS_NOTI) => Notification::PreNoise(d1 != 0),
      (StatusType::VendorInfo, VENDOR_PROXIMITY) => Notification::Proximity(d1),
      _ => Notification::Other,
    }
  }
}

impl From<&[u8; EVENT_BUFF_SIZE]> for Status {
  fn from(raw: &[u8; EVENT_BUFF_SIZE]) -> Self {
    Self {
      stype: StatusType::from_bits((raw[0] >> 2) & 0xF),
      status_id: raw[1],
      data: [raw[2], raw[3], raw[4], raw[5], raw[6]],
      left_event: raw[7] & 0x1F,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn status(stype: u8, id: u8, data: [u8; 5]) -> Status {
    let mut raw = [0u8; EVENT_BUFF_SIZE];
    raw[0] = 0x01 | stype << 2;
    raw[1] = id;
    raw[2..7].copy_from_slice(&data);
    Status::from(&raw)
  }

  #[test]
  fn watchdog_reboot_needs_marker() {
    assert_eq!(status(2, 0x00, [0x20, 0, 0, 0, 0]).notification(), Notification::WatchdogReset);
    assert_eq!(status(2, 0x00, [0x10, 0, 0, 0, 0]).notification(), Notification::Other);
  }

  #[test]
  fn error_sub_cases() {
    assert_eq!(status(1, 0x01, [0; 5]).notification(), Notification::QueueFull);
    assert_eq!(status(1, 0x02, [0; 5]).notification(), Notification::Esd);
    assert_eq!(status(2, 0x02, [0; 5]).notification(), Notification::Other);
  }

  #[test]
  fn vendor_state_word_is_big_endian() {
    let n = status(7, 0x61, [0x05, 0x02, 0, 0, 0]).notification();
    assert_eq!(n, Notification::StateChanged { mode: 0x0502, scan: Some(ScanChange::LowPower) });
  }

  #[test]
  fn boot_ack_accepts_info_and_vendor_info() {
    assert!(status(2, 0x00, [0; 5]).is_ack(0x00));
    assert!(status(7, 0x00, [0; 5]).is_ack(0x00));
    assert!(!status(1, 0x00, [0; 5]).is_ack(0x00));
    assert!(!status(2, 0x01, [0; 5]).is_ack(0x00));
  }
}
