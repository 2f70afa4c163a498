//! Interrupt-driven event pipeline: burst read, decode, and fan-out to the
//! slot table and the input sink.

use std::sync::atomic::Ordering;
use std::time::Duration;

use log::{debug, error, info, warn};

use super::{
  defs, Contact, EventContext, InputEvent, InputSink, Key, Platform, PowerState, SecTs, Transport,
};
use crate::event::{DecodeError, Event, Gesture, Notification, RawEvent, ScanChange, Status};
use crate::info::Location;
use crate::sync::lock;
use crate::touchpad::{Ignored, TouchPoint, Transition};
use crate::{GestureCode, StatusType};

/// What the last wake gesture or scan change was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeKind {
  Swipe,
  AodDoubleTap,
  SingleTap,
  /// Scanning resumed (normal or low-power scan).
  ScanUnblock,
  /// The controller entered its sleep scan.
  ScanBlock,
}

/// Last gesture reported through [`Key::BlackUiGesture`], with its position
/// when the gesture carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeGesture {
  pub kind: WakeKind,
  pub x: u16,
  pub y: u16,
}

impl WakeGesture {
  const fn at(kind: WakeKind, (x, y): (u16, u16)) -> Self {
    Self { kind, x, y }
  }

  const fn bare(kind: WakeKind) -> Self {
    Self { kind, x: 0, y: 0 }
  }
}

/// Masks interrupt handling while alive; restores the previous state on drop.
pub struct IrqGuard<'a, T, P, S>
where
  T: Transport + 'static,
  P: Platform + 'static,
  S: InputSink + 'static,
{
  ts: &'a SecTs<T, P, S>,
  was_enabled: bool,
}

impl<T, P, S> Drop for IrqGuard<'_, T, P, S>
where
  T: Transport + 'static,
  P: Platform + 'static,
  S: InputSink + 'static,
{
  fn drop(&mut self) {
    if self.was_enabled {
      self.ts.enable_irq();
    }
  }
}

fn contact(p: &TouchPoint) -> Contact {
  Contact { slot: p.id, x: p.x, y: p.y, major: p.major, minor: p.minor, z: p.z, palm: p.palm }
}

impl<T, P, S> SecTs<T, P, S>
where
  T: Transport + 'static,
  P: Platform + 'static,
  S: InputSink + 'static,
{
  pub fn irq_enabled(&self) -> bool {
    self.irq_enabled.load(Ordering::Acquire)
  }

  pub fn enable_irq(&self) {
    self.irq_enabled.store(true, Ordering::Release);
  }

  /// Mask the interrupt and wait for a handler already running to finish.
  ///
  /// Must not be called from inside [`SecTs::handle_irq`].
  pub fn disable_irq(&self) {
    self.irq_enabled.store(false, Ordering::Release);
    drop(lock(&self.events));
  }

  /// Mask the interrupt for the lifetime of the returned guard.
  pub fn irq_guard(&self) -> IrqGuard<'_, T, P, S> {
    let was_enabled = self.irq_enabled();
    self.disable_irq();
    IrqGuard { ts: self, was_enabled }
  }

  /// Threaded interrupt handler. Returns `false` when the interrupt was not
  /// ours to service (masked, or the attention line is not asserted).
  pub fn handle_irq(&self) -> bool {
    if !self.irq_enabled() || !self.platform.irq_line_low() {
      return false;
    }

    let mut ctx = lock(&self.events);
    if !self.irq_enabled() {
      return false;
    }
    self.read_event(&mut ctx);
    true
  }

  /// Last wake gesture or scan change, if any was reported.
  pub fn last_wake_gesture(&self) -> Option<WakeGesture> {
    lock(&self.events).last_gesture
  }

  /// Release every live contact and tell the input layer.
  pub(crate) fn release_all(&self) {
    let mut ctx = lock(&self.events);
    self.release_all_in(&mut ctx);
  }

  fn release_all_in(&self, ctx: &mut EventContext<S>) {
    let released = ctx.table.release_all();
    for &slot in &released {
      ctx.sink.report(InputEvent::Up { slot });
    }
    ctx.sink.report(InputEvent::Idle);
    ctx.sink.report(InputEvent::Key { key: Key::BlackUiGesture, pressed: false });
    ctx.sink.report(InputEvent::Sync);
    if !released.is_empty() {
      info!("release_all: released {} finger(s)", released.len());
    }
  }

  /// Drop whatever the controller has queued and release every contact.
  fn recover_event_stack(&self, ctx: &mut EventContext<S>, err: DecodeError) {
    error!("read_event: {err}, clearing event stack");
    if let Err(e) = self.write(defs::Cmd::ClearEventStack, &[]) {
      error!("read_event: failed to clear event stack: {e}");
    }
    self.release_all_in(ctx);
  }

  fn read_event(&self, ctx: &mut EventContext<S>) {
    if self.power_state() == PowerState::Lpm {
      let timeout = Duration::from_millis(self.config.timing.resume_timeout.into());
      if !self.transport.device().resume().wait_timeout(timeout) {
        error!("read_event: LPM: pm resume is not handled");
        return;
      }
    }

    let mut first: RawEvent = [0; defs::EVENT_BUFF_SIZE];
    if let Err(e) = self.read(defs::Cmd::ReadOneEvent, &mut first) {
      error!("read_event: i2c read one event failed: {e}");
      return;
    }

    let left = match Event::try_from(&first).and_then(|_| Event::pending(&first)) {
      Ok(_) if first[0] == 0 => {
        debug!("read_event: event buffer is empty");
        return;
      }
      Ok(left) => left,
      Err(e) => {
        self.recover_event_stack(ctx, e);
        return;
      }
    };

    let mut records = Vec::with_capacity(left + 1);
    records.push(first);
    if left > 0 {
      let mut rest = vec![0u8; left * defs::EVENT_BUFF_SIZE];
      if let Err(e) = self.read(defs::Cmd::ReadAllEvent, &mut rest) {
        error!("read_event: i2c read all event failed: {e}");
        return;
      }
      for chunk in rest.chunks_exact(defs::EVENT_BUFF_SIZE) {
        let mut raw: RawEvent = [0; defs::EVENT_BUFF_SIZE];
        raw.copy_from_slice(chunk);
        records.push(raw);
      }
    }

    for raw in &records {
      match Event::try_from(raw) {
        Ok(Event::Coordinate(c)) => self.process_coordinate(ctx, &c),
        Ok(Event::Status(s)) => self.process_status(ctx, &s),
        Ok(Event::Gesture(g)) => self.process_gesture(ctx, &g),
        Ok(Event::Empty) => break,
        Err(e) => {
          self.recover_event_stack(ctx, e);
          break;
        }
      }
    }

    ctx.sink.report(InputEvent::Sync);

    if ctx.table.touch_count() == 0 && self.temperature_deferred.swap(false, Ordering::Relaxed) {
      info!("read_event: no touch, set_temp");
      if let Err(e) = self.set_temp(false) {
        error!("read_event: set_temp: {e}");
      }
    }
  }

  fn process_coordinate(&self, ctx: &mut EventContext<S>, c: &crate::Coordinate) {
    if self.power_state() != PowerState::On {
      warn!("process_coordinate: device is not on, event dropped");
      return;
    }

    let geometry = &self.config.geometry;
    match ctx.table.apply(c) {
      Transition::Press(p) => {
        ctx.sink.report(InputEvent::Down(contact(&p)));
        info!(
          "[P] tID:{} x:{} y:{} z:{} major:{} minor:{} loc:{} tc:{} type:{:X} noise:({:x},{})",
          p.id,
          p.x,
          p.y,
          p.z,
          p.major,
          p.minor,
          Location::detect(geometry, p.x, p.y),
          ctx.table.touch_count(),
          p.touch_type.bits(),
          p.noise_status,
          p.noise_level,
        );
      }
      Transition::Move { point, fresh } => {
        if fresh {
          info!("[M] tID:{} x:{} y:{} tc:{}", point.id, point.x, point.y, ctx.table.touch_count());
        }
        ctx.sink.report(InputEvent::Move(contact(&point)));
      }
      Transition::Release(p) => {
        ctx.sink.report(InputEvent::Up { slot: p.id });
        let touch_count = ctx.table.touch_count();
        if touch_count == 0 {
          ctx.sink.report(InputEvent::Idle);
        }
        let (dx, dy) = p.delta();
        info!(
          "[R] tID:{} loc:{} dd:{},{} mc:{} tc:{} lx:{} ly:{} mx:{} my:{} p:{} noise:({:x},{}) maxS:{} hid:{}",
          p.id,
          Location::detect(geometry, p.x, p.y),
          dx,
          dy,
          p.mcount,
          touch_count,
          p.x,
          p.y,
          p.max_energy_x,
          p.max_energy_y,
          p.palm_count,
          p.noise_status,
          p.noise_level,
          p.max_strength,
          p.hover_id_num,
        );
      }
      Transition::Ignored(Ignored::OutOfRange(tid)) => {
        error!("process_coordinate: tid({}) is out of range", tid.wrapping_sub(1));
      }
      Transition::Ignored(why) => debug!("process_coordinate: ignored {why:?}"),
    }
  }

  fn press_gesture_key(ctx: &mut EventContext<S>) {
    ctx.sink.report(InputEvent::Key { key: Key::BlackUiGesture, pressed: true });
  }

  fn process_status(&self, ctx: &mut EventContext<S>, s: &Status) {
    if s.stype != StatusType::CmdDriven {
      info!(
        "STATUS: {:?} id:{:02X} data:{:02X?} left:{}",
        s.stype, s.status_id, s.data, s.left_event
      );
    }

    match s.notification() {
      Notification::WatchdogReset => {
        warn!("process_status: IC reset by watchdog, reinit");
        self.diag.ic_reset.fetch_add(1, Ordering::Relaxed);
        self.release_all_in(ctx);
        self.reinit();
        if let Err(e) = self.write(defs::Cmd::SenseOn, &[]) {
          error!("process_status: failed to sense on: {e}");
        }
      }
      Notification::QueueFull => {
        error!("process_status: IC Event Queue is full");
        self.release_all_in(ctx);
      }
      Notification::Esd => {
        error!("process_status: ESD detected");
        if self.config.reset_on_esd {
          self.reset_work.schedule(0);
        }
      }
      Notification::WetMode(on) => {
        self.diag.set_wet_mode(on);
        info!("process_status: water wet mode {on}");
      }
      Notification::StateChanged { mode, scan } => {
        self.diag.set_current_mode(mode);
        if let Some(scan) = scan {
          let kind = match scan {
            ScanChange::Normal | ScanChange::LowPower => WakeKind::ScanUnblock,
            ScanChange::Sleep => WakeKind::ScanBlock,
          };
          ctx.last_gesture = Some(WakeGesture::bare(kind));
          Self::press_gesture_key(ctx);
          ctx.sink.report(InputEvent::Sync);
          info!("process_status: {scan:?} changed({kind:?})");
        }
        ctx.sink.report(InputEvent::Key { key: Key::BlackUiGesture, pressed: false });
        ctx.sink.report(InputEvent::Sync);
      }
      Notification::Noise(on) => {
        self.diag.set_noise(on);
        info!("process_status: TSP NOISE MODE {}", if on { "ON" } else { "OFF" });
      }
      Notification::PreNoise(on) => {
        self.diag.set_pre_noise(on);
        info!("process_status: TSP PRE NOISE MODE {}", if on { "ON" } else { "OFF" });
      }
      Notification::Proximity(level) => {
        if self.config.support_ear_detect && self.settings().ed_enable != 0 {
          info!("process_status: hover level {level}");
          ctx.sink.report(InputEvent::Proximity(level));
          ctx.sink.report(InputEvent::Sync);
        }
      }
      Notification::Other => {}
    }
  }

  fn process_gesture(&self, ctx: &mut EventContext<S>, g: &Gesture) {
    match g.code {
      GestureCode::Swipe => {
        ctx.last_gesture = Some(WakeGesture::bare(WakeKind::Swipe));
        Self::press_gesture_key(ctx);
        self.diag.spay.fetch_add(1, Ordering::Relaxed);
        info!("GESTURE: SPAY");
      }
      GestureCode::DoubleTap if g.gesture_id == defs::GESTURE_ID_AOD => {
        ctx.last_gesture = Some(WakeGesture::at(WakeKind::AodDoubleTap, g.position()));
        Self::press_gesture_key(ctx);
        self.diag.aod_tap.fetch_add(1, Ordering::Relaxed);
        info!("GESTURE: AOD double tap");
      }
      GestureCode::DoubleTap if g.gesture_id == defs::GESTURE_ID_DOUBLETAP_TO_WAKEUP => {
        info!("GESTURE: AOT");
        ctx.sink.report(InputEvent::Key { key: Key::WakeUp, pressed: true });
        ctx.sink.report(InputEvent::Sync);
        ctx.sink.report(InputEvent::Key { key: Key::WakeUp, pressed: false });
      }
      GestureCode::SingleTap => {
        ctx.last_gesture = Some(WakeGesture::at(WakeKind::SingleTap, g.position()));
        Self::press_gesture_key(ctx);
        info!("GESTURE: SINGLE TAP");
      }
      GestureCode::Press => {
        info!("GESTURE: FOD {}PRESS", if g.gesture_id != 0 { "" } else { "LONG" });
      }
      GestureCode::DoubleTap | GestureCode::Unknown(_) => {
        debug!("GESTURE: unhandled {:?} id:{}", g.code, g.gesture_id);
      }
    }

    ctx.sink.report(InputEvent::Sync);
    ctx.sink.report(InputEvent::Key { key: Key::BlackUiGesture, pressed: false });
  }
}
