use crate::defs::{CHARGER_MODE_NONE, DEFAULT_TOUCH_FUNCTIONS};

/// Static driver configuration.
///
/// The defaults mirror the controller's reference timing. Adjust individual
/// groups with the `with_*` helpers before handing the value to
/// [`SecTs::new`](crate::SecTs::new).
///
/// ```no_run
/// use sec_ts::{Config, Geometry, Timing};
///
/// let config = Config::default()
///   .with_timing(Timing::new().with_wait_retries(50))
///   .with_geometry(Geometry::new(1079, 2219, 133, 266, 60))
///   .with_reset_on_esd(false);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  pub retries: Retries,
  pub timing: Timing,
  pub geometry: Geometry,
  /// Largest single read the bus controller accepts; longer reads are chunked.
  pub burst_max: usize,
  /// Schedule a full reset when a register write or read exhausts its retries.
  pub por_after_retry: bool,
  /// Schedule a full reset when the controller reports an ESD error.
  pub reset_on_esd: bool,
  /// Emit a [`Notice::Reset`](crate::Notice::Reset) after every reset attempt.
  pub report_reset: bool,
  pub support_ear_detect: bool,
}

impl Config {
  pub const fn new() -> Self {
    Self {
      retries: Retries::new(),
      timing: Timing::new(),
      geometry: Geometry::reference(),
      burst_max: 256,
      por_after_retry: true,
      reset_on_esd: true,
      report_reset: true,
      support_ear_detect: false,
    }
  }

  pub const fn with_retries(mut self, retries: Retries) -> Self {
    self.retries = retries;
    self
  }

  pub const fn with_timing(mut self, timing: Timing) -> Self {
    self.timing = timing;
    self
  }

  pub const fn with_geometry(mut self, geometry: Geometry) -> Self {
    self.geometry = geometry;
    self
  }

  pub const fn with_burst_max(mut self, burst_max: usize) -> Self {
    self.burst_max = if burst_max == 0 { 1 } else { burst_max };
    self
  }

  pub const fn with_por_after_retry(mut self, enabled: bool) -> Self {
    self.por_after_retry = enabled;
    self
  }

  pub const fn with_reset_on_esd(mut self, enabled: bool) -> Self {
    self.reset_on_esd = enabled;
    self
  }

  pub const fn with_report_reset(mut self, enabled: bool) -> Self {
    self.report_reset = enabled;
    self
  }

  pub const fn with_ear_detect(mut self, supported: bool) -> Self {
    self.support_ear_detect = supported;
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}

/// Retry budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retries {
  /// Attempts per bus transfer.
  pub i2c: u8,
  /// Attempts to get the power-mode register to read back what was written.
  pub mode_change: u8,
}

impl Retries {
  pub const fn new() -> Self {
    Self { i2c: 3, mode_change: 5 }
  }

  pub const fn with_i2c(mut self, attempts: u8) -> Self {
    self.i2c = if attempts == 0 { 1 } else { attempts };
    self
  }

  pub const fn with_mode_change(mut self, attempts: u8) -> Self {
    self.mode_change = if attempts == 0 { 1 } else { attempts };
    self
  }
}

impl Default for Retries {
  fn default() -> Self {
    Self::new()
  }
}

/// Delays, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
  pub retry_delay: u32,
  /// Bounded wait for the platform resume handshake before a transfer.
  pub resume_timeout: u32,
  pub wait_step: u32,
  pub wait_retries: u16,
  /// Rail settle time after power-up.
  pub power_settle: u32,
  /// Gap between stop and start during a reset.
  pub reset_settle: u32,
  /// Delay before re-running a reset that failed to bring the device up.
  pub reset_backoff: u32,
  pub mode_change_delay: u32,
  pub fix_mode_delay: u32,
  pub print_info_interval: u32,
}

impl Timing {
  pub const fn new() -> Self {
    Self {
      retry_delay: 1,
      resume_timeout: 500,
      wait_step: 20,
      wait_retries: 100,
      power_settle: 70,
      reset_settle: 30,
      reset_backoff: 10,
      mode_change_delay: 50,
      fix_mode_delay: 20,
      print_info_interval: 30_000,
    }
  }

  pub const fn with_resume_timeout(mut self, ms: u32) -> Self {
    self.resume_timeout = ms;
    self
  }

  pub const fn with_wait_retries(mut self, retries: u16) -> Self {
    self.wait_retries = retries;
    self
  }

  pub const fn with_reset_backoff(mut self, ms: u32) -> Self {
    self.reset_backoff = ms;
    self
  }

  pub const fn with_print_info_interval(mut self, ms: u32) -> Self {
    self.print_info_interval = ms;
    self
  }
}

impl Default for Timing {
  fn default() -> Self {
    Self::new()
  }
}

/// Panel geometry used to tag contact positions in diagnostics.
///
/// `area_indicator` is the status-bar band at the top, `area_navigation` the
/// navigation band at the bottom and `area_edge` the width of each side edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
  pub max_x: u16,
  pub max_y: u16,
  pub area_indicator: u16,
  pub area_navigation: u16,
  pub area_edge: u16,
}

impl Geometry {
  pub const fn new(max_x: u16, max_y: u16, area_indicator: u16, area_navigation: u16, area_edge: u16) -> Self {
    Self { max_x, max_y, area_indicator, area_navigation, area_edge }
  }

  const fn reference() -> Self {
    Self::new(4095, 4095, 133, 266, 341)
  }
}

impl Default for Geometry {
  fn default() -> Self {
    Self::reference()
  }
}

/// Device settings cached by the host and replayed after every power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
  pub charger_mode: u8,
  pub touch_functions: u16,
  pub cover_cmd: u8,
  pub brush_mode: u8,
  pub touchable_area: u8,
  pub ed_enable: u8,
  /// Sponge gesture mask; any bit set keeps the panel in low-power mode while closed.
  pub lowpower_mode: u8,
  pub use_sponge: bool,
  pub prox_power_off: u8,
  /// AOD active rectangle as x, y, width, height.
  pub aod_rect: [u16; 4],
  pub fix_active_mode: bool,
  pub scan_mode: Option<u8>,
}

impl Settings {
  pub const fn new() -> Self {
    Self {
      charger_mode: CHARGER_MODE_NONE,
      touch_functions: DEFAULT_TOUCH_FUNCTIONS,
      cover_cmd: 0,
      brush_mode: 0,
      touchable_area: 0,
      ed_enable: 0,
      lowpower_mode: 0,
      use_sponge: false,
      prox_power_off: 0,
      aod_rect: [0; 4],
      fix_active_mode: false,
      scan_mode: None,
    }
  }

  /// Whether closing the input should park the panel in low-power mode.
  pub const fn keeps_low_power(&self) -> bool {
    self.lowpower_mode != 0 || self.ed_enable != 0
  }
}

impl Default for Settings {
  fn default() -> Self {
    Self::new()
  }
}
