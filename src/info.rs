//! Field diagnostics: counters, the periodic status line and contact location
//! tagging.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use log::{debug, info};

use super::{defs, Geometry, InputSink, Platform, SecTs, Transport};
use crate::sync::lock;

#[derive(Default)]
pub(crate) struct Diagnostics {
  pub(crate) mode_change_failed: AtomicU32,
  pub(crate) ic_reset: AtomicU32,
  pub(crate) wet: AtomicU32,
  pub(crate) noise: AtomicU32,
  pub(crate) aod_tap: AtomicU32,
  pub(crate) spay: AtomicU32,
  pub(crate) resets: AtomicU32,
  pub(crate) resets_scheduled: AtomicU32,
  pub(crate) print_info_open: AtomicU32,
  noise_status: AtomicBool,
  pre_noise_status: AtomicBool,
  wet_mode: AtomicBool,
  current_mode: AtomicU16,
}

impl Diagnostics {
  pub(crate) fn clear_noise(&self) {
    self.noise_status.store(false, Ordering::Relaxed);
    self.pre_noise_status.store(false, Ordering::Relaxed);
    self.wet_mode.store(false, Ordering::Relaxed);
  }

  pub(crate) fn set_wet_mode(&self, on: bool) {
    self.wet_mode.store(on, Ordering::Relaxed);
    if on {
      self.wet.fetch_add(1, Ordering::Relaxed);
    }
  }

  pub(crate) fn set_noise(&self, on: bool) {
    self.noise_status.store(on, Ordering::Relaxed);
    if on {
      self.noise.fetch_add(1, Ordering::Relaxed);
    }
  }

  pub(crate) fn set_pre_noise(&self, on: bool) {
    self.pre_noise_status.store(on, Ordering::Relaxed);
  }

  pub(crate) fn set_current_mode(&self, mode: u16) {
    self.current_mode.store(mode, Ordering::Relaxed);
  }
}

/// Point-in-time copy of the driver counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
  /// Transfers that exhausted their retries.
  pub comm_err: u32,
  pub mode_change_failed: u32,
  /// Watchdog reboots reported by the controller.
  pub ic_reset: u32,
  /// Sessions that went above four simultaneous contacts.
  pub multi: u32,
  pub all_finger: u32,
  pub wet: u32,
  pub noise: u32,
  pub aod_tap: u32,
  pub spay: u32,
  /// Reset cycles run.
  pub resets: u32,
  /// Resets queued because a transfer exhausted its retries.
  pub resets_scheduled: u32,
  pub touch_count: u8,
  pub noise_status: bool,
  pub pre_noise_status: bool,
  pub wet_mode: bool,
  /// Vendor scan mode word from the last state-change status.
  pub current_mode: u16,
}

/// Which panel region a contact is in, rendered as e.g. `C.S` or `e.N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
  pub column: Column,
  pub row: Row,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
  LeftEdge,
  Center,
  RightEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
  Indicator,
  Center,
  Navigation,
}

impl Location {
  pub fn detect(geometry: &Geometry, x: u16, y: u16) -> Self {
    let column = if x < geometry.area_edge {
      Column::LeftEdge
    } else if x < geometry.max_x.saturating_sub(geometry.area_edge) {
      Column::Center
    } else {
      Column::RightEdge
    };

    let row = if y < geometry.area_indicator {
      Row::Indicator
    } else if y < geometry.max_y.saturating_sub(geometry.area_navigation) {
      Row::Center
    } else {
      Row::Navigation
    };

    Self { column, row }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let column = match self.column {
      Column::LeftEdge => "E.",
      Column::Center => "C.",
      Column::RightEdge => "e.",
    };
    let row = match self.row {
      Row::Indicator => "S",
      Row::Center => "C",
      Row::Navigation => "N",
    };
    write!(f, "{column}{row}")
  }
}

impl<T, P, S> SecTs<T, P, S>
where
  T: Transport + 'static,
  P: Platform + 'static,
  S: InputSink + 'static,
{
  pub fn stats(&self) -> Stats {
    let (touch_count, multi, all_finger) = {
      let ctx = lock(&self.events);
      (ctx.table.touch_count(), ctx.table.multi_count(), ctx.table.all_finger_count())
    };
    let d = &self.diag;
    Stats {
      comm_err: self.transport.comm_err_count(),
      mode_change_failed: d.mode_change_failed.load(Ordering::Relaxed),
      ic_reset: d.ic_reset.load(Ordering::Relaxed),
      multi,
      all_finger,
      wet: d.wet.load(Ordering::Relaxed),
      noise: d.noise.load(Ordering::Relaxed),
      aod_tap: d.aod_tap.load(Ordering::Relaxed),
      spay: d.spay.load(Ordering::Relaxed),
      resets: d.resets.load(Ordering::Relaxed),
      resets_scheduled: d.resets_scheduled.load(Ordering::Relaxed),
      touch_count,
      noise_status: d.noise_status.load(Ordering::Relaxed),
      pre_noise_status: d.pre_noise_status.load(Ordering::Relaxed),
      wet_mode: d.wet_mode.load(Ordering::Relaxed),
      current_mode: d.current_mode.load(Ordering::Relaxed),
    }
  }

  /// Log the one-line status summary.
  pub fn print_info(&self) {
    let open = self.diag.print_info_open.fetch_add(1, Ordering::Relaxed) + 1;
    if open > defs::PRINT_INFO_COUNTER_WRAP {
      self.diag.print_info_open.store(0, Ordering::Relaxed);
    }

    let release = {
      let mut ctx = lock(&self.events);
      if ctx.table.touch_count() == 0 {
        ctx.table.bump_release_counter();
      }
      ctx.table.release_counter()
    };

    let stats = self.stats();
    let settings = self.settings();
    info!(
      "mode:{:04X} tc:{} noise:{}{} wet:{} wc:{:x} lp:({:x}) fn:{:04X} ED:{} // rst:{} ic_rst:{} comm:{} // #{} {}",
      stats.current_mode,
      stats.touch_count,
      u8::from(stats.noise_status),
      u8::from(stats.pre_noise_status),
      u8::from(stats.wet_mode),
      settings.charger_mode,
      settings.lowpower_mode,
      settings.touch_functions,
      settings.ed_enable,
      stats.resets,
      stats.ic_reset,
      stats.comm_err,
      self.diag.print_info_open.load(Ordering::Relaxed),
      release,
    );
  }

  pub(crate) fn print_info_work(&self) {
    self.print_info();

    let touch_count = lock(&self.events).table.touch_count();
    if touch_count > 0 {
      self.temperature_deferred.store(true, Ordering::Relaxed);
      info!("print_info_work: skip set_temp, t_cnt({touch_count})");
    } else {
      self.temperature_deferred.store(false, Ordering::Relaxed);
      if let Err(e) = self.set_temp(false) {
        debug!("print_info_work: set_temp: {e}");
      }
    }

    if self.probe_done.load(Ordering::Acquire) {
      self.print_work.schedule(self.config.timing.print_info_interval);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::*;

  #[test]
  fn location_bands() {
    let g = Geometry::new(4095, 4095, 133, 266, 341);
    assert_eq!(Location::detect(&g, 10, 10).to_string(), "E.S");
    assert_eq!(Location::detect(&g, 2000, 2000).to_string(), "C.C");
    assert_eq!(Location::detect(&g, 4000, 4000).to_string(), "e.N");
    assert_eq!(Location::detect(&g, 341, 133).to_string(), "C.C");
    assert_eq!(Location::detect(&g, 3754, 3829).to_string(), "e.N");
  }

  #[test]
  fn tiny_geometry_does_not_underflow() {
    let g = Geometry::new(100, 100, 0, 300, 300);
    assert_eq!(Location::detect(&g, 50, 50).to_string(), "E.N");
  }

  #[test]
  fn print_info_counts_idle_periods() {
    let (ts, _) = running(test_config());
    ts.print_work.cancel();
    ts.diag.print_info_open.store(0, Ordering::Relaxed);
    let before = ts.slots().release_counter();

    ts.print_info();
    ts.print_info();
    assert_eq!(ts.diag.print_info_open.load(Ordering::Relaxed), 2);
    assert_eq!(ts.slots().release_counter(), before + 2);

    ts.transport().push_event(touch_event(1, 1, 10, 10));
    ts.handle_irq();
    ts.print_info();
    assert_eq!(ts.slots().release_counter(), before + 2);
  }

  #[test]
  fn print_counter_wraps() {
    let (ts, _) = harness(test_config());
    ts.diag.print_info_open.store(defs::PRINT_INFO_COUNTER_WRAP, Ordering::Relaxed);
    ts.print_info();
    assert_eq!(ts.diag.print_info_open.load(Ordering::Relaxed), 0);
  }

  #[test]
  fn stats_include_slot_counters() {
    let (ts, _) = running(test_config());
    ts.transport().push_burst(&[
      touch_event(1, 1, 10, 10),
      touch_event(2, 1, 10, 10),
      touch_event(3, 1, 10, 10),
      touch_event(4, 1, 10, 10),
      touch_event(5, 1, 10, 10),
    ]);
    ts.handle_irq();

    let stats = ts.stats();
    assert_eq!(stats.touch_count, 5);
    assert_eq!(stats.all_finger, 5);
    assert_eq!(stats.multi, 1);
  }
}
