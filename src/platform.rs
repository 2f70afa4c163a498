//! Board and host collaborators: power rails, interrupt line, input reporting.

use std::sync::Mutex;
use std::time::Duration;

use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::sync::lock;

/// Board-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
  #[error("failed to switch the touch power rail")]
  Power,
  #[error("battery temperature is not available")]
  Temperature,
}

/// Out-of-band diagnostics raised for the host, e.g. as a uevent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
  /// A reset cycle ran (successfully or not).
  Reset,
  /// A transfer exhausted its retries.
  I2cError,
}

/// Board hooks the driver needs.
pub trait Platform: Send + Sync {
  /// Switch the controller supply.
  fn power(&self, on: bool) -> Result<(), PlatformError>;

  /// Select the active or sleep pin configuration.
  fn pinctrl(&self, _active: bool) {}

  /// Level of the active-low attention line.
  fn irq_line_low(&self) -> bool;

  /// Whether the interrupt may wake the system while in low-power mode.
  fn may_wakeup(&self) -> bool {
    false
  }

  /// Battery temperature in tenths of a degree Celsius.
  fn temperature(&self) -> Option<i32> {
    None
  }

  fn delay_ms(&self, ms: u32) {
    std::thread::sleep(Duration::from_millis(ms.into()));
  }

  fn notify(&self, _notice: Notice) {}
}

/// [`Platform`] driven by a power-enable output and the attention input.
pub struct GpioPlatform<PWR, INT> {
  power_en: Mutex<PWR>,
  int: Mutex<INT>,
  wakeup: bool,
}

impl<PWR, INT> GpioPlatform<PWR, INT>
where
  PWR: OutputPin + Send,
  INT: InputPin + Send,
{
  pub fn new(power_en: PWR, int: INT) -> Self {
    Self { power_en: Mutex::new(power_en), int: Mutex::new(int), wakeup: false }
  }

  pub fn with_wakeup(mut self, wakeup: bool) -> Self {
    self.wakeup = wakeup;
    self
  }
}

impl<PWR, INT> Platform for GpioPlatform<PWR, INT>
where
  PWR: OutputPin + Send,
  INT: InputPin + Send,
{
  fn power(&self, on: bool) -> Result<(), PlatformError> {
    let mut pin = lock(&self.power_en);
    let res = if on { pin.set_high() } else { pin.set_low() };
    res.map_err(|_| PlatformError::Power)
  }

  fn irq_line_low(&self) -> bool {
    match lock(&self.int).is_low() {
      Ok(low) => low,
      Err(_) => {
        warn!("failed to sample the attention line");
        false
      }
    }
  }

  fn may_wakeup(&self) -> bool {
    self.wakeup
  }
}

/// Contact data handed to the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
  pub slot: u8,
  pub x: u16,
  pub y: u16,
  pub major: u8,
  pub minor: u8,
  pub z: u8,
  pub palm: bool,
}

/// Keys the driver can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
  /// Double tap to wake.
  WakeUp,
  /// Sponge gesture notification (swipe, AOD tap, single tap, scan change).
  BlackUiGesture,
  /// Sent when power is cut while proximity-driven power-off is active.
  IntCancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
  Down(Contact),
  Move(Contact),
  Up { slot: u8 },
  /// No fingers left on the panel.
  Idle,
  Key { key: Key, pressed: bool },
  Proximity(u8),
  Sync,
}

/// Receiver for decoded input, typically the host input stack.
pub trait InputSink: Send {
  fn report(&mut self, event: InputEvent);
}

impl<F> InputSink for F
where
  F: FnMut(InputEvent) + Send,
{
  fn report(&mut self, event: InputEvent) {
    self(event)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use core::convert::Infallible;
  use embedded_hal::digital::{ErrorType, PinState};

  struct Pin(PinState);

  impl ErrorType for Pin {
    type Error = Infallible;
  }

  impl OutputPin for Pin {
    fn set_low(&mut self) -> Result<(), Infallible> {
      self.0 = PinState::Low;
      Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
      self.0 = PinState::High;
      Ok(())
    }
  }

  impl InputPin for Pin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
      Ok(self.0 == PinState::High)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
      Ok(self.0 == PinState::Low)
    }
  }

  #[test]
  fn gpio_platform_drives_rail_and_samples_line() {
    let platform = GpioPlatform::new(Pin(PinState::Low), Pin(PinState::Low)).with_wakeup(true);
    platform.power(true).unwrap();
    assert!(lock(&platform.power_en).0 == PinState::High);
    platform.power(false).unwrap();
    assert!(lock(&platform.power_en).0 == PinState::Low);
    assert!(platform.irq_line_low());
    assert!(platform.may_wakeup());
  }

  #[test]
  fn closures_are_sinks() {
    let mut seen = Vec::new();
    {
      let mut sink = |event: InputEvent| seen.push(event);
      sink.report(InputEvent::Sync);
    }
    assert_eq!(seen, vec![InputEvent::Sync]);
  }
}
