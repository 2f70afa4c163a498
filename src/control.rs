use std::sync::atomic::Ordering;

use log::{error, info, warn};

use super::{defs, Error, InputEvent, InputSink, Key, Platform, PowerMode, PowerState, SecTs, Transport};
use crate::sync::lock;

/// Power state machine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
  #[error("already in {0:?}")]
  AlreadyInState(PowerState),
  /// The power-mode register never read back the requested mode.
  #[error("power mode change failed: wanted {wanted:?}, read back {got:#04x}")]
  ModeChangeMismatch { wanted: PowerMode, got: u8 },
  /// Powered up but the controller never acknowledged boot completion.
  #[error("timed out waiting for the boot acknowledge")]
  BootTimeout,
  #[error("sponge library is not in use")]
  SpongeDisabled,
}

impl<T, P, S> SecTs<T, P, S>
where
  T: Transport + 'static,
  P: Platform + 'static,
  S: InputSink + 'static,
{
  pub fn power_state(&self) -> PowerState {
    self.transport.device().power()
  }

  fn set_power_state(&self, state: PowerState) {
    self.transport.device().set_power(state);
  }

  /// Power the controller up and bring it to active scanning.
  ///
  /// A boot handshake timeout is reported as [`StateError::BootTimeout`], but
  /// the device is still left On with sensing and the interrupt enabled.
  pub fn start_device(&self) -> Result<(), Error> {
    self.platform.pinctrl(true);

    let _device = lock(&self.device_lock);
    if self.power_state() == PowerState::On {
      info!("start_device: already power on");
      return Ok(());
    }

    self.release_all();

    self.platform.power(true)?;
    self.platform.delay_ms(self.config.timing.power_settle);

    self.set_power_state(PowerState::On);
    self.diag.clear_noise();

    let ready = self.wait_for_ready(defs::ACK_BOOT_COMPLETE);
    match &ready {
      Ok(()) => {
        info!("start_device: boot complete");
        self.reinit();
        if let Some(mode) = self.settings().scan_mode {
          if let Err(e) = self.write(defs::Cmd::SetScanMode, &[mode]) {
            error!("start_device: failed to restore scan mode: {e}");
          }
        }
      }
      Err(e) => error!("start_device: {e}"),
    }

    let sense = self.write(defs::Cmd::SenseOn, &[]);
    if let Err(e) = &sense {
      error!("start_device: failed to sense on: {e}");
    }
    self.enable_irq();

    ready?;
    sense?;
    Ok(())
  }

  /// Cut power and drop every live contact. Idempotent while already off.
  pub fn stop_device(&self) -> Result<(), Error> {
    let _device = lock(&self.device_lock);
    if self.power_state() == PowerState::Off {
      info!("stop_device: {}", StateError::AlreadyInState(PowerState::Off));
      return Ok(());
    }

    self.disable_irq();
    self.set_power_state(PowerState::Off);

    if self.settings().prox_power_off != 0 {
      let mut ctx = lock(&self.events);
      for pressed in [true, false] {
        ctx.sink.report(InputEvent::Key { key: Key::IntCancel, pressed });
        ctx.sink.report(InputEvent::Sync);
      }
    }

    self.release_all();
    let power = self.platform.power(false);
    self.platform.pinctrl(false);

    info!("stop_device: power off");
    Ok(power?)
  }

  /// Switch between active and low-power gesture scanning.
  pub fn set_low_power_mode(&self, mode: PowerMode) -> Result<(), Error> {
    let _mode = lock(&self.modechange);
    self.set_lowpowermode(mode)
  }

  /// Mode switch for callers already holding the mode-change lock.
  pub(crate) fn set_lowpowermode(&self, mode: PowerMode) -> Result<(), Error> {
    let _device = lock(&self.device_lock);
    let settings = self.settings();
    info!("set_lowpowermode: {:?} lp:0x{:02X}", mode, settings.lowpower_mode);

    if mode == PowerMode::LowPower {
      if settings.prox_power_off != 0 {
        if let Err(e) = self.write(defs::Cmd::ProxPowerOff, &[1]) {
          warn!("set_lowpowermode: failed to set prox power off: {e}");
        }
      }
      self.set_custom_library()?;
    } else if let Err(e) = self.write(defs::Cmd::ProxPowerOff, &[0]) {
      warn!("set_lowpowermode: failed to clear prox power off: {e}");
    }

    let wanted = mode as u8;
    let attempts = self.config.retries.mode_change;
    let mut attempt = 0;
    loop {
      self.write(defs::Cmd::SetPowerMode, &[wanted])?;
      self.platform.delay_ms(self.config.timing.mode_change_delay);

      let mut para = [0u8; 1];
      self.read(defs::Cmd::SetPowerMode, &mut para)?;
      if para[0] == wanted {
        break;
      }

      attempt += 1;
      self.diag.mode_change_failed.fetch_add(1, Ordering::Relaxed);
      warn!("set_lowpowermode: read power mode failed {attempt}/{attempts}, 0x{:02X}", para[0]);
      if attempt >= attempts {
        return Err(StateError::ModeChangeMismatch { wanted: mode, got: para[0] }.into());
      }
    }

    if mode == PowerMode::LowPower {
      self.write(defs::Cmd::ClearEventStack, &[])?;
    }

    self.release_all();

    if self.platform.may_wakeup() {
      self.irq_wake.store(mode == PowerMode::LowPower, Ordering::Release);
    }

    self.set_power_state(match mode {
      PowerMode::LowPower => PowerState::Lpm,
      PowerMode::Touch => PowerState::On,
    });
    info!("set_lowpowermode: {:?} done", self.power_state());
    Ok(())
  }

  /// Whether the interrupt is armed as a system wake source.
  pub fn irq_wake(&self) -> bool {
    self.irq_wake.load(Ordering::Acquire)
  }

  /// The host opened the input device: leave low power, or power up.
  pub fn input_open(&self) -> Result<(), Error> {
    if !self.probe_done.load(Ordering::Acquire) {
      warn!("input_open: device is not probed");
      return Ok(());
    }

    let res = {
      let _mode = lock(&self.modechange);
      self.input_closed.store(false, Ordering::Release);
      self.update_settings(|s| s.prox_power_off = 0);

      let res = if self.power_state() == PowerState::Lpm {
        self.set_lowpowermode(PowerMode::Touch)
      } else {
        self.start_device()
      };
      if let Err(e) = &res {
        error!("input_open: {e}");
      }

      if self.settings().fix_active_mode {
        self.fix_active_mode();
      }
      if let Err(e) = self.set_temp(true) {
        error!("input_open: set_temp: {e}");
      }
      res
    };

    self.print_work.cancel();
    self.diag.print_info_open.store(0, Ordering::Relaxed);
    lock(&self.events).table.reset_release_counter();
    self.print_work.schedule(0);
    res
  }

  /// The host closed the input device: park in low power or power off.
  pub fn input_close(&self) -> Result<(), Error> {
    if !self.probe_done.load(Ordering::Acquire) {
      warn!("input_close: device is not probed");
      return Ok(());
    }

    let _mode = lock(&self.modechange);
    self.input_closed.store(true, Ordering::Release);

    self.print_work.cancel();
    self.print_info();
    self.reset_work.cancel();

    let res = if self.settings().keeps_low_power() {
      self.set_lowpowermode(PowerMode::LowPower)
    } else {
      self.stop_device()
    };
    if let Err(e) = &res {
      error!("input_close: {e}");
    }
    res
  }

  pub fn is_input_closed(&self) -> bool {
    self.input_closed.load(Ordering::Acquire)
  }

  /// System suspend: transfers made while in low power wait for resume.
  pub fn pm_suspend(&self) {
    if self.settings().lowpower_mode != 0 {
      self.transport.device().resume().reinit();
    }
  }

  pub fn pm_resume(&self) {
    self.transport.device().resume().complete_all();
  }
}
