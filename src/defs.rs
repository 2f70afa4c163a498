/******************************************************************************
 * Samsung sec_ts touch controller - command set & event protocol constants  *
 * ========================================================================== *
 * Every command is a single register byte, optionally followed by payload.  *
*******************************************************************************/

/// Default 7-bit bus address of the controller.
pub const I2C_ADDR: u8 = 0x48;

pub(crate) const MAX_SUPPORT_TOUCH_COUNT: usize = 10;
pub(crate) const MAX_SUPPORT_HOVER_COUNT: usize = 1;
/// Number of tracked contact slots (fingers plus hover).
pub const SLOT_COUNT: usize = MAX_SUPPORT_TOUCH_COUNT + MAX_SUPPORT_HOVER_COUNT;

/// Size of one event record on the wire.
pub const EVENT_BUFF_SIZE: usize = 16;
/// Records that fit in one interrupt burst, including the first one.
pub const MAX_EVENT_COUNT: usize = 31;

/// Largest frame accepted by the transport, register byte included.
pub(crate) const I2C_LEN_MAX: usize = 0xFFFF;

/// A press that pushes the live contact count above this marks a multi-touch session.
pub(crate) const MULTI_TOUCH_THRESHOLD: u8 = 4;

pub(crate) const PRINT_INFO_COUNTER_WRAP: u32 = 0xFFF0;

#[allow(dead_code)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Cmd {
  SenseOn = 0x10,
  SenseOff = 0x11,
  SwReset = 0x12,
  SetTouchFunction = 0x30,
  SetChargerMode = 0x32,
  SetCoverType = 0x38,
  ReadBootStatus = 0x55,
  ReadOneEvent = 0x60,
  ReadAllEvent = 0x61,
  ClearEventStack = 0x62,
  Nvm = 0x85,
  StateManageOn = 0x8E,
  SpongeGetInfo = 0x90,
  SpongeWriteParam = 0x91,
  SpongeReadParam = 0x92,
  SpongeNotifyPacket = 0x93,
  LpmAodOffOn = 0x9B,
  ProxPowerOff = 0xBD,
  SetLowTemperatureMode = 0xBE,
  ChangeSysMode = 0xD7,
  SetPowerMode = 0xE4,
  SetEarDetect = 0xEA,
  SetTouchableArea = 0xED,
  SetBrushMode = 0xEF,
  SetScanMode = 0xF3,
}

impl From<Cmd> for u8 {
  fn from(cmd: Cmd) -> Self {
    cmd as u8
  }
}

/// Payload of [`Cmd::SetPowerMode`].
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerMode {
  Touch = 0,
  LowPower = 1,
}

impl PowerMode {
  pub const fn from_bits(bits: u8) -> Option<Self> {
    match bits {
      0 => Some(Self::Touch),
      1 => Some(Self::LowPower),
      _ => None,
    }
  }
}

pub(crate) const AOD_OFF: u8 = 1;
pub(crate) const AOD_ON: u8 = 2;

pub(crate) const SPONGE_AOD_RECT_OFFSET: u8 = 0x02;
pub(crate) const SPONGE_LIB_OFFSET: u8 = 0x00;

/// Byte offsets into the user NVM area.
pub const NVM_OFFSET_FAC_RESULT: u8 = 0;
pub const NVM_OFFSET_CAL_COUNT: u8 = 2;

pub(crate) const NVM_SETTLE_MS: u32 = 100;
pub(crate) const NVM_READ_DELAY_MS: u32 = 20;

pub(crate) const STATE_MANAGE_OFF: u8 = 0;
pub(crate) const TOUCH_SYSTEM_MODE_TOUCH: u8 = 2;
pub(crate) const TOUCH_MODE_STATE_TOUCH: u8 = 2;

/// Bits of the touch-function mask.
pub const SETFUNC_TOUCH: u16 = 1 << 0;
pub const SETFUNC_COVER: u16 = 1 << 2;
pub const SETFUNC_PALM: u16 = 1 << 5;
pub const SETFUNC_WET: u16 = 1 << 6;
pub(crate) const DEFAULT_TOUCH_FUNCTIONS: u16 = SETFUNC_TOUCH | SETFUNC_PALM | SETFUNC_WET;

/// Sponge gesture bits of `Settings::lowpower_mode`.
pub const SPONGE_MODE_SWIPE: u8 = 1 << 1;
pub const SPONGE_MODE_AOD: u8 = 1 << 2;
pub const SPONGE_MODE_SINGLE_TAP: u8 = 1 << 3;
pub const SPONGE_MODE_PRESS: u8 = 1 << 4;
pub const SPONGE_MODE_DOUBLETAP_TO_WAKEUP: u8 = 1 << 5;

/// Charger payload meaning "no charger attached"; not re-sent on reinit.
pub const CHARGER_MODE_NONE: u8 = 1 << 0;

/// Acknowledge ids carried in `status_id` of status records.
pub(crate) const ACK_BOOT_COMPLETE: u8 = 0x00;
pub(crate) const ACK_WET_MODE: u8 = 0x01;
pub(crate) const WATCHDOG_BOOT_MARKER: u8 = 0x20;

pub(crate) const ERR_EVENT_QUEUE_FULL: u8 = 0x01;
pub(crate) const ERR_EVENT_ESD: u8 = 0x02;

pub(crate) const VENDOR_STATE_CHANGED: u8 = 0x61;
pub(crate) const VENDOR_ACK_NOISE_STATUS_NOTI: u8 = 0x64;
pub(crate) const VENDOR_PROXIMITY: u8 = 0x6A;
pub(crate) const VENDOR_ACK_PRE_NOISE_STATUS_NOTI: u8 = 0x6D;

pub(crate) const GESTURE_ID_AOD: u8 = 0;
pub(crate) const GESTURE_ID_DOUBLETAP_TO_WAKEUP: u8 = 1;

/// Two-bit record tag in byte 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventId {
  Coordinate,
  Status,
  Gesture,
  Reserved,
}

impl EventId {
  pub const fn from_bits(bits: u8) -> Self {
    match bits & 0x3 {
      0 => Self::Coordinate,
      1 => Self::Status,
      2 => Self::Gesture,
      _ => Self::Reserved,
    }
  }
}

/// Sub-type of a status record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusType {
  CmdDriven,
  Error,
  Info,
  UserInput,
  SpongeInfo,
  VendorInfo,
  Unknown(u8),
}

impl StatusType {
  pub const fn from_bits(bits: u8) -> Self {
    match bits {
      0 => Self::CmdDriven,
      1 => Self::Error,
      2 => Self::Info,
      3 => Self::UserInput,
      6 => Self::SpongeInfo,
      7 => Self::VendorInfo,
      other => Self::Unknown(other),
    }
  }
}

/// Classification the controller attaches to a contact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TouchType {
  #[default]
  Normal,
  Hover,
  FlipCover,
  Glove,
  Stylus,
  Palm,
  Wet,
  Proximity,
  Jig,
  Unknown(u8),
}

impl TouchType {
  pub const fn from_bits(bits: u8) -> Self {
    match bits {
      0 => Self::Normal,
      1 => Self::Hover,
      2 => Self::FlipCover,
      3 => Self::Glove,
      4 => Self::Stylus,
      5 => Self::Palm,
      6 => Self::Wet,
      7 => Self::Proximity,
      8 => Self::Jig,
      other => Self::Unknown(other),
    }
  }

  pub const fn bits(self) -> u8 {
    match self {
      Self::Normal => 0,
      Self::Hover => 1,
      Self::FlipCover => 2,
      Self::Glove => 3,
      Self::Stylus => 4,
      Self::Palm => 5,
      Self::Wet => 6,
      Self::Proximity => 7,
      Self::Jig => 8,
      Self::Unknown(other) => other,
    }
  }

  /// Only these contact types drive the slot table.
  pub const fn is_tracked(self) -> bool {
    matches!(self, Self::Normal | Self::Palm | Self::Wet | Self::Glove)
  }
}

/// Per-slot action code (`tchsta`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
  #[default]
  None,
  Press,
  Move,
  Release,
}

impl Action {
  pub const fn from_bits(bits: u8) -> Self {
    match bits & 0x3 {
      0 => Self::None,
      1 => Self::Press,
      2 => Self::Move,
      _ => Self::Release,
    }
  }

  pub const fn bits(self) -> u8 {
    match self {
      Self::None => 0,
      Self::Press => 1,
      Self::Move => 2,
      Self::Release => 3,
    }
  }

  /// `true` while a contact is on the panel.
  pub const fn is_active(self) -> bool {
    matches!(self, Self::Press | Self::Move)
  }
}

/// Wake gesture code carried in the sub-type of a gesture record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureCode {
  Swipe,
  DoubleTap,
  Press,
  SingleTap,
  Unknown(u8),
}

impl GestureCode {
  pub const fn from_bits(bits: u8) -> Self {
    match bits {
      0 => Self::Swipe,
      1 => Self::DoubleTap,
      3 => Self::Press,
      4 => Self::SingleTap,
      other => Self::Unknown(other),
    }
  }
}
