#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Event-protocol and power-state core for Samsung `sec_ts` touchscreen
//! controllers.
//!
//! The controller queues fixed 16-byte event records and pulls its attention
//! line low while any are pending. This crate owns everything between that
//! line and the host input stack:
//!
//! - A retrying, power-aware register [`Transport`] with an `embedded-hal`
//!   I²C implementation ([`I2cTransport`])
//! - Decoding of coordinate, status and gesture records ([`Event`])
//! - Multi-touch slot tracking with palm and noise telemetry ([`SlotTable`])
//! - The Off / LPM / On power state machine, boot handshake and automatic
//!   reset recovery
//!
//! ```no_run
//! use std::sync::Arc;
//! use sec_ts::{Config, GpioPlatform, I2cTransport, InputEvent, SecTs, I2C_ADDR};
//! # fn example<I, D, PWR, INT>(i2c: I, delay: D, pwr: PWR, int: INT) -> Result<(), sec_ts::Error>
//! # where
//! #   I: embedded_hal::i2c::I2c + Send + 'static,
//! #   D: embedded_hal::delay::DelayNs + Send + 'static,
//! #   PWR: embedded_hal::digital::OutputPin + Send + 'static,
//! #   INT: embedded_hal::digital::InputPin + Send + 'static,
//! # {
//! let config = Config::default();
//! let transport = I2cTransport::new(i2c, delay, I2C_ADDR, &config);
//! let platform = GpioPlatform::new(pwr, int);
//! let sink = |event: InputEvent| println!("{event:?}");
//!
//! let ts = SecTs::new(transport, platform, sink, config)?;
//! ts.probe()?;
//! ts.input_open()?;
//!
//! // From the interrupt thread, on every falling edge of the attention line:
//! ts.handle_irq();
//! # Ok(())
//! # }
//! ```

mod config;
mod control;
mod defs;
mod event;
mod info;
mod init;
mod irq;
mod platform;
mod registry;
mod reset;
mod rw;
mod setup;
mod sync;
#[cfg(test)]
mod testing;
mod touchpad;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::{error, warn};

pub use config::*;
pub use control::StateError;
pub use defs::{
  Action, EventId, GestureCode, PowerMode, StatusType, TouchType, CHARGER_MODE_NONE, EVENT_BUFF_SIZE, I2C_ADDR,
  MAX_EVENT_COUNT, NVM_OFFSET_CAL_COUNT, NVM_OFFSET_FAC_RESULT, SETFUNC_COVER, SETFUNC_PALM, SETFUNC_TOUCH, SETFUNC_WET,
  SLOT_COUNT, SPONGE_MODE_AOD, SPONGE_MODE_DOUBLETAP_TO_WAKEUP, SPONGE_MODE_PRESS, SPONGE_MODE_SINGLE_TAP,
  SPONGE_MODE_SWIPE,
};
pub use event::{Coordinate, DecodeError, Event, Gesture, Notification, RawEvent, ScanChange, Status};
pub use info::{Location, Stats};
pub use irq::{IrqGuard, WakeGesture, WakeKind};
pub use platform::*;
pub use registry::{lookup_instance, register_instance, unregister_instance};
pub use rw::{DeviceState, I2cTransport, PowerState, Transport, TransportError};
pub use sync::Completion;
pub use touchpad::{Ignored, SlotTable, TouchPoint, Transition};

use info::Diagnostics;
use sync::{lock, DelayedWork};

/// Every failure the driver can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error(transparent)]
  Transport(#[from] TransportError),
  #[error(transparent)]
  State(#[from] StateError),
  #[error(transparent)]
  Decode(#[from] DecodeError),
  #[error(transparent)]
  Platform(#[from] PlatformError),
  #[error("failed to spawn worker thread: {0}")]
  Spawn(#[from] std::io::Error),
}

pub(crate) struct EventContext<S> {
  table: SlotTable,
  sink: S,
  last_gesture: Option<WakeGesture>,
}

/// Driver context for one `sec_ts` controller.
///
/// All entry points take `&self` and may be called from any thread. Internal
/// locks are always taken in the order mode-change, device, event, bus.
pub struct SecTs<T, P, S> {
  transport: T,
  platform: P,
  config: Config,
  settings: Mutex<Settings>,
  events: Mutex<EventContext<S>>,
  device_lock: Mutex<()>,
  modechange: Mutex<()>,
  sponge_lock: Mutex<()>,
  reset_in_progress: AtomicBool,
  probe_done: AtomicBool,
  input_closed: AtomicBool,
  irq_enabled: AtomicBool,
  irq_wake: AtomicBool,
  /// Last temperature written to the controller, whole degrees.
  temperature: AtomicU8,
  /// A temperature update was held back while fingers were down.
  temperature_deferred: AtomicBool,
  diag: Diagnostics,
  reset_work: DelayedWork,
  print_work: DelayedWork,
}

impl<T, P, S> SecTs<T, P, S>
where
  T: Transport + 'static,
  P: Platform + 'static,
  S: InputSink + 'static,
{
  /// Build the driver context and its reset and print-info workers.
  ///
  /// The controller is left untouched; call [`SecTs::probe`] to power it up.
  pub fn new(transport: T, platform: P, sink: S, config: Config) -> Result<Arc<Self>, Error> {
    let reset_work = DelayedWork::new("sec_ts-reset")?;
    let print_work = DelayedWork::new("sec_ts-print")?;

    Ok(Arc::new_cyclic(|weak: &Weak<Self>| {
      let ts = weak.clone();
      reset_work.bind(move || {
        if let Some(ts) = ts.upgrade() {
          ts.reset_work();
        }
      });
      let ts = weak.clone();
      print_work.bind(move || {
        if let Some(ts) = ts.upgrade() {
          ts.print_info_work();
        }
      });

      Self {
        transport,
        platform,
        config,
        settings: Mutex::new(Settings::default()),
        events: Mutex::new(EventContext { table: SlotTable::new(), sink, last_gesture: None }),
        device_lock: Mutex::new(()),
        modechange: Mutex::new(()),
        sponge_lock: Mutex::new(()),
        reset_in_progress: AtomicBool::new(false),
        probe_done: AtomicBool::new(false),
        input_closed: AtomicBool::new(true),
        irq_enabled: AtomicBool::new(false),
        irq_wake: AtomicBool::new(false),
        temperature: AtomicU8::new(0),
        temperature_deferred: AtomicBool::new(false),
        diag: Diagnostics::default(),
        reset_work,
        print_work,
      }
    }))
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub fn platform(&self) -> &P {
    &self.platform
  }

  pub fn settings(&self) -> Settings {
    *lock(&self.settings)
  }

  /// Change cached settings. They reach the controller on the next reinit.
  pub fn update_settings(&self, f: impl FnOnce(&mut Settings)) {
    f(&mut lock(&self.settings));
  }

  /// Copy of the contact table taken under the event lock.
  pub fn slots(&self) -> SlotTable {
    lock(&self.events).table.clone()
  }

  pub fn is_reset_in_progress(&self) -> bool {
    self.reset_in_progress.load(Ordering::Acquire)
  }

  /// Register write. Exhausting the retries may schedule a reset.
  pub fn write(&self, reg: impl Into<u8>, data: &[u8]) -> Result<(), TransportError> {
    let res = self.transport.write(reg.into(), data);
    self.check_io(&res);
    res
  }

  /// Register read. Exhausting the retries may schedule a reset.
  pub fn read(&self, reg: impl Into<u8>, buf: &mut [u8]) -> Result<(), TransportError> {
    let res = self.transport.read(reg.into(), buf);
    self.check_io(&res);
    res
  }

  /// Raw write with no register byte. Never schedules a reset.
  pub fn write_burst(&self, data: &[u8]) -> Result<(), TransportError> {
    self.transport.write_burst(data)
  }

  /// Raw read with no register select. Never schedules a reset.
  pub fn read_bulk(&self, buf: &mut [u8]) -> Result<(), TransportError> {
    self.transport.read_bulk(buf)
  }

  fn check_io(&self, res: &Result<(), TransportError>) {
    if !matches!(res, Err(TransportError::IoRetryExceeded(_))) {
      return;
    }
    self.platform.notify(Notice::I2cError);
    if self.config.por_after_retry && self.probe_done.load(Ordering::Acquire) && !self.is_reset_in_progress() {
      if self.reset_work.schedule(self.config.timing.reset_backoff) {
        warn!("POR: reset scheduled after i2c retry exhaustion");
        self.diag.resets_scheduled.fetch_add(1, Ordering::Relaxed);
      }
    }
  }

  /// Power the controller up for the first time and start periodic logging.
  pub fn probe(&self) -> Result<(), Error> {
    self.start_device()?;
    match self.nvm_data(defs::NVM_OFFSET_FAC_RESULT, 1) {
      Ok(nv) => log::info!("fac_nv:{:02X}", nv.first().copied().unwrap_or_default()),
      Err(e) => error!("failed to read factory result: {e}"),
    }
    self.probe_done.store(true, Ordering::Release);
    self.print_work.schedule(0);
    Ok(())
  }

  /// Stop background work and power the controller down.
  pub fn shutdown(&self) -> Result<(), Error> {
    self.probe_done.store(false, Ordering::Release);
    self.print_work.cancel();
    self.reset_work.cancel();
    self.reset_work.flush();
    self.stop_device()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::*;

  #[test]
  fn write_exhaustion_schedules_reset_only_after_probe() {
    let (ts, _) = harness(test_config());
    ts.transport().device().set_power(PowerState::On);
    ts.transport().set_broken(true);

    assert!(ts.write(defs::Cmd::SenseOn, &[]).is_err());
    assert!(!ts.reset_work.is_pending());

    ts.probe_done.store(true, Ordering::Release);
    assert!(ts.write(defs::Cmd::SenseOn, &[]).is_err());
    assert!(ts.reset_work.is_pending());
    assert_eq!(ts.platform().notices(), vec![Notice::I2cError, Notice::I2cError]);
  }

  #[test]
  fn bulk_paths_never_schedule_reset() {
    let (ts, _) = harness(test_config());
    ts.transport().device().set_power(PowerState::On);
    ts.probe_done.store(true, Ordering::Release);
    ts.transport().set_broken(true);

    let mut buf = [0u8; 32];
    assert!(ts.read_bulk(&mut buf).is_err());
    assert!(ts.write_burst(&[1, 2, 3]).is_err());
    assert!(!ts.reset_work.is_pending());
  }

  #[test]
  fn policy_switch_disables_reset_after_retry() {
    let (ts, _) = harness(test_config().with_por_after_retry(false));
    ts.transport().device().set_power(PowerState::On);
    ts.probe_done.store(true, Ordering::Release);
    ts.transport().set_broken(true);

    let mut buf = [0u8; 1];
    assert!(ts.read(defs::Cmd::SetPowerMode, &mut buf).is_err());
    assert!(!ts.reset_work.is_pending());
  }

  #[test]
  fn probe_brings_device_up() {
    let (ts, _) = harness(test_config());
    ts.transport().push_boot_ack();
    ts.probe().unwrap();

    assert_eq!(ts.power_state(), PowerState::On);
    assert!(ts.irq_enabled.load(Ordering::Acquire));
    assert_eq!(ts.platform().power_log(), vec![true]);
    assert!(ts.transport().wrote(defs::Cmd::SenseOn));
  }
}
