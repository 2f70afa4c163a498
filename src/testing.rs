//! Test doubles for the bus, the board and the input layer.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};

use crate::defs::{Cmd, EVENT_BUFF_SIZE};
use crate::sync::lock;
use crate::{
  Config, DeviceState, InputEvent, InputSink, Notice, Platform, PlatformError, RawEvent, SecTs, Timing, Transport,
  TransportError,
};

pub(crate) fn init_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct BusState {
  calls: usize,
  writes: Vec<Vec<u8>>,
  reads: VecDeque<u8>,
  skip_ok: usize,
  fail: usize,
}

/// Scriptable `embedded-hal` bus: every transaction counts as one call.
#[derive(Clone, Default)]
pub(crate) struct FakeBus(Arc<Mutex<BusState>>);

impl FakeBus {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_next(&self, n: usize) {
    self.fail_after(0, n);
  }

  /// Let `ok` transactions through, then fail the next `n`.
  pub fn fail_after(&self, ok: usize, n: usize) {
    let mut state = lock(&self.0);
    state.skip_ok = ok;
    state.fail = n;
  }

  pub fn queue_read(&self, data: &[u8]) {
    lock(&self.0).reads.extend(data.iter().copied());
  }

  pub fn calls(&self) -> usize {
    lock(&self.0).calls
  }

  pub fn writes(&self) -> Vec<Vec<u8>> {
    lock(&self.0).writes.clone()
  }
}

impl ErrorType for FakeBus {
  type Error = ErrorKind;
}

impl I2c<SevenBitAddress> for FakeBus {
  fn transaction(&mut self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
    let mut state = lock(&self.0);
    state.calls += 1;
    if state.skip_ok > 0 {
      state.skip_ok -= 1;
    } else if state.fail > 0 {
      state.fail -= 1;
      return Err(ErrorKind::Other);
    }

    for op in operations {
      match op {
        Operation::Write(data) => state.writes.push(data.to_vec()),
        Operation::Read(buf) => {
          for byte in buf.iter_mut() {
            *byte = state.reads.pop_front().unwrap_or(0);
          }
        }
      }
    }
    Ok(())
  }
}

pub(crate) struct NoDelay;

impl DelayNs for NoDelay {
  fn delay_ns(&mut self, _ns: u32) {}
}

/// Status record acknowledging boot completion.
pub(crate) fn boot_ack() -> RawEvent {
  status_event(2, 0x00, [0; 5])
}

pub(crate) fn status_event(stype: u8, id: u8, data: [u8; 5]) -> RawEvent {
  let mut raw = [0u8; EVENT_BUFF_SIZE];
  raw[0] = 0x01 | stype << 2;
  raw[1] = id;
  raw[2..7].copy_from_slice(&data);
  raw
}

pub(crate) fn gesture_event(code: u8, id: u8, data: [u8; 4]) -> RawEvent {
  let mut raw = [0u8; EVENT_BUFF_SIZE];
  raw[0] = 0x02 | code << 2;
  raw[1] = id;
  raw[2..6].copy_from_slice(&data);
  raw
}

/// Coordinate record for 1-based `tid` with action bits and 12-bit position.
pub(crate) fn touch_event(tid: u8, action: u8, x: u16, y: u16) -> RawEvent {
  let mut raw = [0u8; EVENT_BUFF_SIZE];
  raw[0] = (tid & 0xF) << 2 | (action & 0x3) << 6;
  raw[1] = (x >> 4) as u8;
  raw[2] = (y >> 4) as u8;
  raw[3] = ((x & 0xF) as u8) << 4 | (y & 0xF) as u8;
  raw[4] = 10;
  raw[5] = 8;
  raw[6] = 30;
  raw
}

#[derive(Default)]
struct Script {
  registers: HashMap<u8, Vec<u8>>,
  events: VecDeque<RawEvent>,
  writes: Vec<(u8, Vec<u8>)>,
  bursts: Vec<Vec<u8>>,
  fail_writes: usize,
  fail_reads: usize,
  broken: bool,
  auto_boot_ack: bool,
  stuck_power_mode: Option<u8>,
}

/// In-memory controller: a register map plus a queue of pending event records.
///
/// Writes to the power-mode register are echoed back on read unless a stuck
/// value is configured.
pub(crate) struct ScriptedTransport {
  script: Mutex<Script>,
  device: DeviceState,
  comm_err: AtomicU32,
}

impl ScriptedTransport {
  pub fn new() -> Self {
    Self { script: Mutex::new(Script::default()), device: DeviceState::new(), comm_err: AtomicU32::new(0) }
  }

  pub fn push_event(&self, raw: RawEvent) {
    lock(&self.script).events.push_back(raw);
  }

  pub fn push_boot_ack(&self) {
    self.push_event(boot_ack());
  }

  /// Queue a burst: the first record announces how many follow.
  pub fn push_burst(&self, records: &[RawEvent]) {
    let mut script = lock(&self.script);
    for (i, raw) in records.iter().enumerate() {
      let mut raw = *raw;
      if i == 0 {
        raw[7] = (raw[7] & !0x1F) | (records.len() as u8 - 1);
      }
      script.events.push_back(raw);
    }
  }

  pub fn pending_events(&self) -> usize {
    lock(&self.script).events.len()
  }

  pub fn set_auto_boot_ack(&self, enabled: bool) {
    lock(&self.script).auto_boot_ack = enabled;
  }

  pub fn set_broken(&self, broken: bool) {
    lock(&self.script).broken = broken;
  }

  pub fn fail_writes(&self, n: usize) {
    lock(&self.script).fail_writes = n;
  }

  pub fn fail_reads(&self, n: usize) {
    lock(&self.script).fail_reads = n;
  }

  /// Make the power-mode register always read back `value`.
  pub fn stick_power_mode(&self, value: Option<u8>) {
    lock(&self.script).stuck_power_mode = value;
  }

  pub fn set_register(&self, reg: impl Into<u8>, value: &[u8]) {
    lock(&self.script).registers.insert(reg.into(), value.to_vec());
  }

  pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
    lock(&self.script).writes.clone()
  }

  pub fn writes_to(&self, cmd: Cmd) -> Vec<Vec<u8>> {
    let reg = u8::from(cmd);
    lock(&self.script).writes.iter().filter(|(r, _)| *r == reg).map(|(_, d)| d.clone()).collect()
  }

  pub fn wrote(&self, cmd: Cmd) -> bool {
    !self.writes_to(cmd).is_empty()
  }

  pub fn clear_writes(&self) {
    lock(&self.script).writes.clear();
  }

  fn fail(&self) -> TransportError {
    self.comm_err.fetch_add(1, Ordering::Relaxed);
    TransportError::IoRetryExceeded(ErrorKind::Other)
  }
}

impl Transport for ScriptedTransport {
  fn write(&self, reg: u8, data: &[u8]) -> Result<(), TransportError> {
    self.device.gate(std::time::Duration::from_millis(20))?;
    let mut script = lock(&self.script);
    if script.broken {
      return Err(self.fail());
    }
    if script.fail_writes > 0 {
      script.fail_writes -= 1;
      return Err(self.fail());
    }
    script.writes.push((reg, data.to_vec()));
    if reg == u8::from(Cmd::SetPowerMode) {
      script.registers.insert(reg, data.to_vec());
    }
    Ok(())
  }

  fn read(&self, reg: u8, buf: &mut [u8]) -> Result<(), TransportError> {
    self.device.gate(std::time::Duration::from_millis(20))?;
    let mut script = lock(&self.script);
    if script.broken {
      return Err(self.fail());
    }
    if script.fail_reads > 0 {
      script.fail_reads -= 1;
      return Err(self.fail());
    }

    if reg == u8::from(Cmd::ReadOneEvent) || reg == u8::from(Cmd::ReadAllEvent) {
      for chunk in buf.chunks_mut(EVENT_BUFF_SIZE) {
        let raw = match script.events.pop_front() {
          Some(raw) => raw,
          None if script.auto_boot_ack => boot_ack(),
          None => [0; EVENT_BUFF_SIZE],
        };
        chunk.copy_from_slice(&raw[..chunk.len()]);
      }
      return Ok(());
    }

    if reg == u8::from(Cmd::SetPowerMode) {
      if let Some(stuck) = script.stuck_power_mode {
        buf.fill(0);
        if let Some(first) = buf.first_mut() {
          *first = stuck;
        }
        return Ok(());
      }
    }

    buf.fill(0);
    if let Some(value) = script.registers.get(&reg) {
      let n = value.len().min(buf.len());
      buf[..n].copy_from_slice(&value[..n]);
    }
    Ok(())
  }

  fn write_burst(&self, data: &[u8]) -> Result<(), TransportError> {
    self.device.gate(std::time::Duration::from_millis(20))?;
    let mut script = lock(&self.script);
    if script.broken {
      return Err(self.fail());
    }
    script.bursts.push(data.to_vec());
    Ok(())
  }

  fn read_bulk(&self, buf: &mut [u8]) -> Result<(), TransportError> {
    self.device.gate(std::time::Duration::from_millis(20))?;
    if lock(&self.script).broken {
      return Err(self.fail());
    }
    buf.fill(0);
    Ok(())
  }

  fn comm_err_count(&self) -> u32 {
    self.comm_err.load(Ordering::Relaxed)
  }

  fn device(&self) -> &DeviceState {
    &self.device
  }
}

/// Board double recording rail switches, delays and notices.
#[derive(Default)]
pub(crate) struct FakePlatform {
  power_log: Mutex<Vec<bool>>,
  pinctrl_log: Mutex<Vec<bool>>,
  notices: Mutex<Vec<Notice>>,
  irq_high: AtomicBool,
  power_fails: AtomicBool,
  temperature: Mutex<Option<i32>>,
  wakeup: bool,
}

impl FakePlatform {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_wakeup(mut self) -> Self {
    self.wakeup = true;
    self
  }

  pub fn set_irq_low(&self, low: bool) {
    self.irq_high.store(!low, Ordering::SeqCst);
  }

  pub fn fail_power(&self, fail: bool) {
    self.power_fails.store(fail, Ordering::SeqCst);
  }

  pub fn set_temperature(&self, tenths: Option<i32>) {
    *lock(&self.temperature) = tenths;
  }

  pub fn power_log(&self) -> Vec<bool> {
    lock(&self.power_log).clone()
  }

  pub fn pinctrl_log(&self) -> Vec<bool> {
    lock(&self.pinctrl_log).clone()
  }

  pub fn notices(&self) -> Vec<Notice> {
    lock(&self.notices).clone()
  }
}

impl Platform for FakePlatform {
  fn power(&self, on: bool) -> Result<(), PlatformError> {
    if self.power_fails.load(Ordering::SeqCst) {
      return Err(PlatformError::Power);
    }
    lock(&self.power_log).push(on);
    Ok(())
  }

  fn pinctrl(&self, active: bool) {
    lock(&self.pinctrl_log).push(active);
  }

  fn irq_line_low(&self) -> bool {
    !self.irq_high.load(Ordering::SeqCst)
  }

  fn may_wakeup(&self) -> bool {
    self.wakeup
  }

  fn temperature(&self) -> Option<i32> {
    *lock(&self.temperature)
  }

  fn delay_ms(&self, _ms: u32) {}

  fn notify(&self, notice: Notice) {
    lock(&self.notices).push(notice);
  }
}

/// Input sink that keeps everything it is given.
#[derive(Clone, Default)]
pub(crate) struct RecordingSink(Arc<Mutex<Vec<InputEvent>>>);

impl RecordingSink {
  pub fn events(&self) -> Vec<InputEvent> {
    lock(&self.0).clone()
  }

  pub fn take(&self) -> Vec<InputEvent> {
    std::mem::take(&mut *lock(&self.0))
  }
}

impl InputSink for RecordingSink {
  fn report(&mut self, event: InputEvent) {
    lock(&self.0).push(event);
  }
}

pub(crate) type TestTs = SecTs<ScriptedTransport, FakePlatform, RecordingSink>;

/// Short handshake and long reset/print intervals so background work stays
/// out of the way unless a test flushes it.
pub(crate) fn test_config() -> Config {
  Config::default().with_timing(
    Timing::new().with_wait_retries(5).with_reset_backoff(60_000).with_print_info_interval(60_000),
  )
}

pub(crate) fn harness(config: Config) -> (Arc<TestTs>, RecordingSink) {
  harness_with(FakePlatform::new(), config)
}

pub(crate) fn harness_with(platform: FakePlatform, config: Config) -> (Arc<TestTs>, RecordingSink) {
  init_logger();
  let sink = RecordingSink::default();
  let ts = SecTs::new(ScriptedTransport::new(), platform, sink.clone(), config).unwrap();
  (ts, sink)
}

/// A probed and opened device with an empty event log.
pub(crate) fn running(config: Config) -> (Arc<TestTs>, RecordingSink) {
  running_with(FakePlatform::new(), config)
}

pub(crate) fn running_with(platform: FakePlatform, config: Config) -> (Arc<TestTs>, RecordingSink) {
  let (ts, sink) = harness_with(platform, config);
  ts.transport().push_boot_ack();
  ts.probe().unwrap();
  ts.input_open().unwrap();
  ts.print_work.flush();
  ts.transport().clear_writes();
  sink.take();
  (ts, sink)
}
