use std::sync::atomic::Ordering;

use log::{error, info};

use super::{Error, InputSink, Notice, Platform, PowerMode, PowerState, SecTs, Transport};
use crate::sync::lock;

impl<T, P, S> SecTs<T, P, S>
where
  T: Transport + 'static,
  P: Platform + 'static,
  S: InputSink + 'static,
{
  /// Request a full power-cycle reset on the reset worker.
  ///
  /// Returns `false` if a reset is already running or queued.
  pub fn trigger_reset(&self) -> bool {
    if self.is_reset_in_progress() {
      info!("trigger_reset: reset is ongoing");
      return false;
    }
    self.reset_work.schedule(0)
  }

  /// Block until queued or running reset work has finished.
  pub fn flush_reset(&self) {
    self.reset_work.flush();
  }

  fn notify_reset(&self) {
    if self.config.report_reset {
      self.platform.notify(Notice::Reset);
    }
  }

  /// Give up on this attempt and try again after the backoff.
  fn reset_failed(&self, err: &Error) {
    error!("reset_work: failed to reset, ret:{err}");
    self.reset_in_progress.store(false, Ordering::Release);
    self.reset_work.cancel();
    self.reset_work.schedule(self.config.timing.reset_backoff);
  }

  /// Body of the reset worker: stop, settle, start, then restore whatever
  /// state the input side expects.
  pub(crate) fn reset_work(&self) {
    if self.is_reset_in_progress() {
      error!("reset_work: reset is ongoing");
      return;
    }

    let mode = lock(&self.modechange);
    if self.reset_in_progress.swap(true, Ordering::AcqRel) {
      return;
    }
    self.diag.resets.fetch_add(1, Ordering::Relaxed);
    info!("reset_work: start");

    if let Err(e) = self.stop_device() {
      error!("reset_work: stop failed: {e}");
    }
    self.platform.delay_ms(self.config.timing.reset_settle);

    if let Err(e) = self.start_device() {
      self.reset_failed(&e);
      drop(mode);
      self.notify_reset();
      return;
    }

    if self.is_input_closed() {
      if self.settings().keeps_low_power() {
        if let Err(e) = self.set_lowpowermode(PowerMode::LowPower) {
          self.reset_failed(&e);
          drop(mode);
          self.notify_reset();
          return;
        }
        if let Err(e) = self.set_aod_rect() {
          error!("reset_work: failed to set aod rect: {e}");
        }
      } else if let Err(e) = self.stop_device() {
        error!("reset_work: stop failed: {e}");
      }
    }

    self.reset_in_progress.store(false, Ordering::Release);
    drop(mode);

    if self.power_state() == PowerState::On && self.settings().fix_active_mode {
      self.fix_active_mode();
    }

    info!("reset_work: done");
    self.notify_reset();
  }
}
