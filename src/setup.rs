use std::sync::atomic::Ordering;

use log::{debug, error, info};

use super::{
  defs, Error, InputSink, Platform, PlatformError, PowerState, SecTs, StateError, Transport, TransportError,
};
use crate::sync::lock;

impl<T, P, S> SecTs<T, P, S>
where
  T: Transport + 'static,
  P: Platform + 'static,
  S: InputSink + 'static,
{
  /// Replay cached settings after the controller lost them (power-up or
  /// watchdog reboot). Stops at the first failed write.
  pub fn reinit(&self) {
    let settings = self.settings();
    info!(
      "reinit: charger=0x{:x}, touch_functions=0x{:x}, Power mode={:?}",
      settings.charger_mode,
      settings.touch_functions,
      self.power_state()
    );
    self.diag.clear_noise();
    if let Err(e) = self.replay_settings() {
      error!("reinit: {e}");
    }
  }

  fn replay_settings(&self) -> Result<(), Error> {
    let settings = self.settings();

    if settings.charger_mode != defs::CHARGER_MODE_NONE {
      self.write(defs::Cmd::SetChargerMode, &[settings.charger_mode])?;
    }

    if settings.touch_functions & defs::SETFUNC_COVER != 0 {
      self.write(defs::Cmd::SetCoverType, &[settings.cover_cmd])?;
    }

    self.write(defs::Cmd::SetTouchFunction, &settings.touch_functions.to_le_bytes())?;

    if let Err(e) = self.set_custom_library() {
      error!("reinit: failed to write sponge: {e}");
    }

    if self.power_state() == PowerState::Lpm {
      self.write(defs::Cmd::SetPowerMode, &[defs::PowerMode::LowPower as u8])?;
      self.platform.delay_ms(self.config.timing.mode_change_delay);
      if let Err(e) = self.set_aod_rect() {
        error!("reinit: failed to set aod rect: {e}");
      }
    } else {
      if settings.brush_mode != 0 {
        info!("reinit: set brush mode");
        self.write(defs::Cmd::SetBrushMode, &[settings.brush_mode])?;
      }
      if settings.touchable_area != 0 {
        info!("reinit: set 16:9 mode");
        self.write(defs::Cmd::SetTouchableArea, &[settings.touchable_area])?;
      }
    }

    if settings.ed_enable != 0 {
      info!("reinit: set ear detect mode");
      self.write(defs::Cmd::SetEarDetect, &[settings.ed_enable])?;
    }
    Ok(())
  }

  /// Write a parameter block to the sponge gesture library and notify it.
  pub fn write_sponge(&self, data: &[u8]) -> Result<(), Error> {
    if !self.settings().use_sponge {
      return Err(StateError::SpongeDisabled.into());
    }

    let _sponge = lock(&self.sponge_lock);
    if let Err(e) = self.write(defs::Cmd::SpongeWriteParam, data) {
      error!("write_sponge: Failed to write offset: {e}");
    }
    self.write(defs::Cmd::SpongeNotifyPacket, &[]).map_err(|e| {
      error!("write_sponge: Failed to send notify: {e}");
      e.into()
    })
  }

  /// Push the enabled gesture mask to the sponge library, if one is in use.
  pub fn set_custom_library(&self) -> Result<(), Error> {
    let settings = self.settings();
    if !settings.use_sponge {
      return Ok(());
    }
    info!("set_custom_library: Sponge (0x{:02x})", settings.lowpower_mode);
    self.write_sponge(&[defs::SPONGE_LIB_OFFSET, 0, settings.lowpower_mode])
  }

  /// Send the AOD rectangle; in LPM also toggle AOD scanning on or off.
  pub fn set_aod_rect(&self) -> Result<(), Error> {
    let settings = self.settings();
    if !settings.use_sponge || settings.lowpower_mode & defs::SPONGE_MODE_AOD == 0 {
      return Ok(());
    }

    let mut data = [0u8; 10];
    data[0] = defs::SPONGE_AOD_RECT_OFFSET;
    for (i, v) in settings.aod_rect.iter().enumerate() {
      data[2 + i * 2..4 + i * 2].copy_from_slice(&v.to_le_bytes());
    }
    let res = self.write_sponge(&data);

    if self.power_state() == PowerState::Lpm {
      let on_off = if settings.aod_rect == [0; 4] { defs::AOD_OFF } else { defs::AOD_ON };
      self.write(defs::Cmd::LpmAodOffOn, &[on_off])?;
    }
    res
  }

  /// Update the AOD rectangle and send it if the device is powered.
  pub fn update_aod_rect(&self, rect: [u16; 4]) -> Result<(), Error> {
    self.update_settings(|s| s.aod_rect = rect);
    if self.power_state() == PowerState::Off {
      return Ok(());
    }
    self.set_aod_rect()
  }

  /// Pin the controller in active touch mode, bypassing its own state manager.
  pub fn fix_active_mode(&self) {
    info!("fix_active_mode");
    let timing = self.config.timing;
    if let Err(e) = self.write(defs::Cmd::StateManageOn, &[defs::STATE_MANAGE_OFF]) {
      error!("fix_active_mode: {e}");
    }
    self.platform.delay_ms(timing.fix_mode_delay);
    if let Err(e) =
      self.write(defs::Cmd::ChangeSysMode, &[defs::TOUCH_SYSTEM_MODE_TOUCH, defs::TOUCH_MODE_STATE_TOUCH])
    {
      error!("fix_active_mode: {e}");
    }
    self.platform.delay_ms(timing.fix_mode_delay);
  }

  /// Charger state; applied now when powered and replayed on every reinit.
  pub fn set_charger_mode(&self, mode: u8) -> Result<(), Error> {
    self.update_settings(|s| s.charger_mode = mode);
    if self.power_state() == PowerState::Off {
      return Ok(());
    }
    Ok(self.write(defs::Cmd::SetChargerMode, &[mode])?)
  }

  /// Feed the battery temperature to the controller's low-temperature
  /// compensation. An unchanged reading is only re-sent when `forced`.
  pub fn set_temp(&self, forced: bool) -> Result<(), Error> {
    let tenths = self.platform.temperature().ok_or(PlatformError::Temperature)?;
    let temp = (tenths / 10).clamp(i8::MIN.into(), i8::MAX.into()) as i8 as u8;

    if !forced && self.temperature.load(Ordering::Relaxed) == temp {
      debug!("set_temp: skip temperature:{}", temp as i8);
      return Ok(());
    }
    self.write(defs::Cmd::SetLowTemperatureMode, &[temp])?;
    self.temperature.store(temp, Ordering::Relaxed);
    info!("set_temp: set temperature:{}", temp as i8);
    Ok(())
  }

  /// Enable or disable cover handling with the given cover command.
  pub fn set_cover(&self, enable: bool, cover_cmd: u8) -> Result<(), Error> {
    self.update_settings(|s| {
      s.cover_cmd = cover_cmd;
      if enable {
        s.touch_functions |= defs::SETFUNC_COVER | defs::DEFAULT_TOUCH_FUNCTIONS;
      } else {
        s.touch_functions = (s.touch_functions & !defs::SETFUNC_COVER) | defs::DEFAULT_TOUCH_FUNCTIONS;
      }
    });

    if self.power_state() == PowerState::Off {
      error!("set_cover: pwr off, close:{enable}");
      return Err(TransportError::PowerOff.into());
    }
    if enable {
      self.write(defs::Cmd::SetCoverType, &[cover_cmd])?;
    }
    let functions = self.settings().touch_functions;
    self.write(defs::Cmd::SetTouchFunction, &functions.to_le_bytes())?;
    info!("set_cover: close:{enable}, status:{functions:x}");
    Ok(())
  }

  /// Read `len` bytes of user NVM at `offset`.
  ///
  /// Sensing is paused for the duration and the event stack is cleared, so
  /// the interrupt is masked and live contacts are released first.
  pub fn nvm_data(&self, offset: u8, len: u8) -> Result<Vec<u8>, Error> {
    let _irq = self.irq_guard();
    let len = len.max(1);

    let res = self.read_nvm(offset, len);

    if let Err(e) = self.write(defs::Cmd::SenseOn, &[]) {
      error!("nvm_data: fail to write Sense_on: {e}");
    }
    debug!("nvm_data: SENSE ON");
    res
  }

  fn read_nvm(&self, offset: u8, len: u8) -> Result<Vec<u8>, Error> {
    self.write(defs::Cmd::SenseOff, &[])?;
    self.platform.delay_ms(defs::NVM_SETTLE_MS);

    self.write(defs::Cmd::ClearEventStack, &[])?;
    self.platform.delay_ms(defs::NVM_SETTLE_MS);

    self.release_all();

    self.write(defs::Cmd::Nvm, &[offset, len - 1])?;
    self.platform.delay_ms(defs::NVM_READ_DELAY_MS);

    let mut buf = vec![0u8; usize::from(len)];
    self.read(defs::Cmd::Nvm, &mut buf)?;
    info!("nvm_data: offset:{offset} data:{buf:02X?}");
    Ok(buf)
  }
}
