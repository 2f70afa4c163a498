use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c, SevenBitAddress};
use log::{error, warn};

use crate::defs::I2C_LEN_MAX;
use crate::sync::{lock, Completion};
use crate::Config;

/// Failures surfaced by a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
  /// The transfer kept failing after the whole retry budget.
  #[error("i2c transfer failed after retries ({0:?})")]
  IoRetryExceeded(ErrorKind),
  /// The platform did not finish resuming within the bounded wait.
  #[error("platform resume not handled")]
  NotResumed,
  #[error("device is powered off")]
  PowerOff,
  #[error("transfer exceeds the maximum frame length")]
  BufferOverflow,
}

/// Controller power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
  Off,
  Lpm,
  On,
}

impl PowerState {
  const fn bits(self) -> u8 {
    match self {
      Self::Off => 0,
      Self::Lpm => 1,
      Self::On => 2,
    }
  }

  const fn from_bits(bits: u8) -> Self {
    match bits {
      1 => Self::Lpm,
      2 => Self::On,
      _ => Self::Off,
    }
  }
}

/// State shared between a transport and the driver that owns it.
///
/// The driver is the only writer of the power state; the transport consults
/// it to gate and abort transfers.
#[derive(Debug)]
pub struct DeviceState {
  power: AtomicU8,
  resume: Completion,
}

impl DeviceState {
  pub fn new() -> Self {
    Self { power: AtomicU8::new(PowerState::Off.bits()), resume: Completion::new(true) }
  }

  pub fn power(&self) -> PowerState {
    PowerState::from_bits(self.power.load(Ordering::Acquire))
  }

  pub(crate) fn set_power(&self, state: PowerState) {
    self.power.store(state.bits(), Ordering::Release);
  }

  /// Platform resume handshake awaited before each transfer.
  pub fn resume(&self) -> &Completion {
    &self.resume
  }

  /// Wait for resume, then refuse if the device is off.
  pub(crate) fn gate(&self, timeout: Duration) -> Result<(), TransportError> {
    if !self.resume.is_done() && !self.resume.wait_timeout(timeout) {
      error!("LPM: pm resume is not handled");
      return Err(TransportError::NotResumed);
    }
    if self.power() == PowerState::Off {
      error!("POWER_STATUS : OFF");
      return Err(TransportError::PowerOff);
    }
    Ok(())
  }
}

impl Default for DeviceState {
  fn default() -> Self {
    Self::new()
  }
}

/// Register-level access to the controller.
///
/// Every method is one logical transaction: implementations serialize calls
/// and retry internally.
pub trait Transport: Send + Sync {
  /// Send `reg` followed by `data`.
  fn write(&self, reg: u8, data: &[u8]) -> Result<(), TransportError>;

  /// Fill `buf` from register `reg`. On error `buf` is left untouched.
  fn read(&self, reg: u8, buf: &mut [u8]) -> Result<(), TransportError>;

  /// Send `data` as-is, with no register byte.
  fn write_burst(&self, data: &[u8]) -> Result<(), TransportError>;

  /// Read without a register-select phase.
  fn read_bulk(&self, buf: &mut [u8]) -> Result<(), TransportError>;

  /// Transfers that failed through the whole retry budget.
  fn comm_err_count(&self) -> u32;

  fn device(&self) -> &DeviceState;

  /// Convenience wrapper returning an owned buffer.
  fn read_vec(&self, reg: u8, len: usize) -> Result<Vec<u8>, TransportError> {
    let mut buf = vec![0u8; len];
    self.read(reg, &mut buf)?;
    Ok(buf)
  }
}

struct Bus<I, D> {
  i2c: I,
  delay: D,
}

/// [`Transport`] over an `embedded-hal` blocking I²C bus.
pub struct I2cTransport<I, D> {
  bus: Mutex<Bus<I, D>>,
  addr: SevenBitAddress,
  device: DeviceState,
  retries: u8,
  retry_delay_ms: u32,
  resume_timeout: Duration,
  burst_max: usize,
  comm_err: AtomicU32,
}

impl<I, D> I2cTransport<I, D>
where
  I: I2c<SevenBitAddress> + Send,
  D: DelayNs + Send,
{
  pub fn new(i2c: I, delay: D, addr: SevenBitAddress, config: &Config) -> Self {
    Self {
      bus: Mutex::new(Bus { i2c, delay }),
      addr,
      device: DeviceState::new(),
      retries: config.retries.i2c.max(1),
      retry_delay_ms: config.timing.retry_delay,
      resume_timeout: Duration::from_millis(config.timing.resume_timeout.into()),
      burst_max: config.burst_max.max(1),
      comm_err: AtomicU32::new(0),
    }
  }

  /// Release the bus and delay provider.
  pub fn release(self) -> (I, D) {
    let bus = self.bus.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner);
    (bus.i2c, bus.delay)
  }

  /// Run one transfer through the retry budget while the bus lock is held.
  ///
  /// Only a failure of the final attempt bumps the comm error counter.
  fn with_retry(
    &self,
    bus: &mut Bus<I, D>,
    what: &str,
    mut op: impl FnMut(&mut I, SevenBitAddress) -> Result<(), I::Error>,
  ) -> Result<(), TransportError> {
    let mut kind = ErrorKind::Other;
    for attempt in 1..=self.retries {
      match op(&mut bus.i2c, self.addr) {
        Ok(()) => return Ok(()),
        Err(e) => kind = e.kind(),
      }

      if self.device.power() == PowerState::Off {
        error!("{what}: POWER_STATUS : OFF, retry:{attempt}");
        return Err(TransportError::PowerOff);
      }

      bus.delay.delay_ms(self.retry_delay_ms);

      if attempt == self.retries {
        warn!("{what}: I2C retry {attempt}, {kind:?}");
        self.comm_err.fetch_add(1, Ordering::Relaxed);
      } else {
        warn!("{what}: I2C retry {attempt}");
      }
    }
    error!("{what}: I2C over retry limit");
    Err(TransportError::IoRetryExceeded(kind))
  }
}

impl<I, D> Transport for I2cTransport<I, D>
where
  I: I2c<SevenBitAddress> + Send,
  D: DelayNs + Send,
{
  fn write(&self, reg: u8, data: &[u8]) -> Result<(), TransportError> {
    if data.len() + 1 > I2C_LEN_MAX {
      error!("write: the i2c buffer size is exceeded");
      return Err(TransportError::BufferOverflow);
    }
    self.device.gate(self.resume_timeout)?;

    let mut frame = Vec::with_capacity(data.len() + 1);
    frame.push(reg);
    frame.extend_from_slice(data);

    let mut bus = lock(&self.bus);
    self.with_retry(&mut bus, "write", |i2c, addr| i2c.write(addr, &frame))
  }

  fn read(&self, reg: u8, buf: &mut [u8]) -> Result<(), TransportError> {
    if buf.len() > I2C_LEN_MAX {
      error!("read: the i2c buffer size is exceeded");
      return Err(TransportError::BufferOverflow);
    }
    self.device.gate(self.resume_timeout)?;

    let mut staged = vec![0u8; buf.len()];
    let mut bus = lock(&self.bus);
    if staged.len() <= self.burst_max {
      self.with_retry(&mut bus, "read", |i2c, addr| i2c.write_read(addr, &[reg], &mut staged))?;
    } else {
      self.with_retry(&mut bus, "read", |i2c, addr| i2c.write(addr, &[reg]))?;
      for chunk in staged.chunks_mut(self.burst_max) {
        self.with_retry(&mut bus, "read", |i2c, addr| i2c.read(addr, &mut chunk[..]))?;
      }
    }
    drop(bus);

    buf.copy_from_slice(&staged);
    Ok(())
  }

  fn write_burst(&self, data: &[u8]) -> Result<(), TransportError> {
    if data.len() > I2C_LEN_MAX {
      error!("write_burst: the i2c buffer size is exceeded");
      return Err(TransportError::BufferOverflow);
    }
    self.device.gate(self.resume_timeout)?;

    let mut bus = lock(&self.bus);
    self.with_retry(&mut bus, "write_burst", |i2c, addr| i2c.write(addr, data))
  }

  fn read_bulk(&self, buf: &mut [u8]) -> Result<(), TransportError> {
    if buf.len() > I2C_LEN_MAX {
      error!("read_bulk: the i2c buffer size is exceeded");
      return Err(TransportError::BufferOverflow);
    }
    self.device.gate(self.resume_timeout)?;

    let mut staged = vec![0u8; buf.len()];
    let mut bus = lock(&self.bus);
    self.with_retry(&mut bus, "read_bulk", |i2c, addr| i2c.read(addr, &mut staged))?;
    drop(bus);

    buf.copy_from_slice(&staged);
    Ok(())
  }

  fn comm_err_count(&self) -> u32 {
    self.comm_err.load(Ordering::Relaxed)
  }

  fn device(&self) -> &DeviceState {
    &self.device
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{FakeBus, NoDelay};

  fn transport(bus: FakeBus) -> I2cTransport<FakeBus, NoDelay> {
    let t = I2cTransport::new(bus, NoDelay, 0x48, &Config::default().with_burst_max(8));
    t.device().set_power(PowerState::On);
    t
  }

  #[test]
  fn write_succeeds_within_retry_budget() {
    let bus = FakeBus::new();
    bus.fail_next(2);
    let t = transport(bus.clone());

    assert_eq!(t.write(0xE4, &[0x01]), Ok(()));
    assert_eq!(t.comm_err_count(), 0);
    assert_eq!(bus.calls(), 3);
    assert_eq!(bus.writes().last().map(Vec::as_slice), Some(&[0xE4, 0x01][..]));
  }

  #[test]
  fn write_exhausting_retries_counts_once() {
    let bus = FakeBus::new();
    bus.fail_next(3);
    let t = transport(bus.clone());

    assert_eq!(t.write(0x10, &[]), Err(TransportError::IoRetryExceeded(ErrorKind::Other)));
    assert_eq!(t.comm_err_count(), 1);
    assert_eq!(bus.calls(), 3);
  }

  #[test]
  fn read_exhausting_retries_counts_once() {
    let bus = FakeBus::new();
    bus.fail_next(10);
    let t = transport(bus.clone());

    let mut buf = [0xAAu8; 4];
    assert!(matches!(t.read(0x60, &mut buf), Err(TransportError::IoRetryExceeded(_))));
    assert_eq!(t.comm_err_count(), 1);
    assert_eq!(buf, [0xAA; 4]);
  }

  #[test]
  fn power_off_never_touches_bus() {
    let bus = FakeBus::new();
    let t = transport(bus.clone());
    t.device().set_power(PowerState::Off);

    assert_eq!(t.write(0x10, &[]), Err(TransportError::PowerOff));
    let mut buf = [0u8; 2];
    assert_eq!(t.read(0x60, &mut buf), Err(TransportError::PowerOff));
    assert_eq!(t.write_burst(&[1, 2]), Err(TransportError::PowerOff));
    assert_eq!(bus.calls(), 0);
    assert_eq!(t.comm_err_count(), 0);
  }

  #[test]
  fn unresumed_platform_times_out_without_bus_access() {
    let bus = FakeBus::new();
    let config = Config::default().with_timing(crate::Timing::new().with_resume_timeout(5));
    let t = I2cTransport::new(bus.clone(), NoDelay, 0x48, &config);
    t.device().set_power(PowerState::Lpm);
    t.device().resume().reinit();

    assert_eq!(t.write(0xE4, &[0]), Err(TransportError::NotResumed));
    assert_eq!(bus.calls(), 0);

    t.device().resume().complete_all();
    assert_eq!(t.write(0xE4, &[0]), Ok(()));
  }

  #[test]
  fn long_read_is_chunked_after_register_select() {
    let bus = FakeBus::new();
    bus.queue_read(&(0u8..20).collect::<Vec<_>>());
    let t = transport(bus.clone());

    let mut buf = [0u8; 20];
    t.read(0x61, &mut buf).unwrap();
    assert_eq!(buf.to_vec(), (0u8..20).collect::<Vec<_>>());
    // register select, then 8 + 8 + 4
    assert_eq!(bus.calls(), 4);
    assert_eq!(bus.writes(), vec![vec![0x61]]);
  }

  #[test]
  fn failed_chunk_fails_whole_read() {
    let bus = FakeBus::new();
    bus.queue_read(&[7u8; 20]);
    bus.fail_after(2, 3);
    let t = transport(bus.clone());

    let mut buf = [0u8; 20];
    assert!(matches!(t.read(0x61, &mut buf), Err(TransportError::IoRetryExceeded(_))));
    assert_eq!(buf, [0u8; 20]);
  }

  #[test]
  fn oversized_write_is_rejected() {
    let bus = FakeBus::new();
    let t = transport(bus.clone());
    let data = vec![0u8; I2C_LEN_MAX];
    assert_eq!(t.write(0x91, &data), Err(TransportError::BufferOverflow));
    assert_eq!(bus.calls(), 0);
  }

  #[test]
  fn burst_write_has_no_register_prefix() {
    let bus = FakeBus::new();
    let t = transport(bus.clone());
    t.write_burst(&[0xDE, 0xAD]).unwrap();
    assert_eq!(bus.writes(), vec![vec![0xDE, 0xAD]]);
  }
}
