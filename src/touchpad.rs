//! Per-finger contact tracking.
//!
//! The controller reports one coordinate record per contact change. The
//! [`SlotTable`] turns those records into press/move/release transitions and
//! keeps the aggregate counters used for field diagnostics.

use crate::defs::{Action, TouchType, MULTI_TOUCH_THRESHOLD, SLOT_COUNT};
use crate::event::Coordinate;

/// Tracked state of one contact slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchPoint {
  pub id: u8,
  pub action: Action,
  pub x: u16,
  pub y: u16,
  /// Position at press time.
  pub p_x: u16,
  pub p_y: u16,
  pub z: u8,
  pub major: u8,
  pub minor: u8,
  pub touch_type: TouchType,
  pub palm: bool,
  pub palm_count: u8,
  pub noise_level: u8,
  pub max_strength: u8,
  pub hover_id_num: u8,
  pub noise_status: u8,
  pub left_event: u8,
  /// Move records seen since press.
  pub mcount: u32,
  pub max_energy_x: u16,
  pub max_energy_y: u16,
}

impl TouchPoint {
  /// Movement since press.
  pub fn delta(&self) -> (i32, i32) {
    (i32::from(self.x) - i32::from(self.p_x), i32::from(self.y) - i32::from(self.p_y))
  }

  fn clear_contact(&mut self) {
    self.action = Action::None;
    self.mcount = 0;
    self.palm = false;
    self.palm_count = 0;
    self.noise_level = 0;
    self.max_strength = 0;
    self.hover_id_num = 0;
  }
}

/// What a coordinate record did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Press(TouchPoint),
  /// `fresh` is set when no press was seen for this contact.
  Move { point: TouchPoint, fresh: bool },
  /// Carries the slot as it was just before its counters were cleared.
  Release(TouchPoint),
  /// The record was consumed without a state change.
  Ignored(Ignored),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
  OutOfRange(u8),
  UnsupportedType(TouchType),
  NoAction,
  /// Release for a slot that had no live contact.
  StaleRelease(u8),
}

/// Fixed-size table of contact slots plus session counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable {
  slots: [TouchPoint; SLOT_COUNT],
  touch_count: u8,
  multi: bool,
  multi_count: u32,
  all_finger_count: u32,
  release_counter: u32,
}

impl SlotTable {
  pub fn new() -> Self {
    let mut slots = [TouchPoint::default(); SLOT_COUNT];
    for (id, slot) in slots.iter_mut().enumerate() {
      slot.id = id as u8;
    }
    Self { slots, touch_count: 0, multi: false, multi_count: 0, all_finger_count: 0, release_counter: 0 }
  }

  /// Contacts currently on the panel.
  pub fn touch_count(&self) -> u8 {
    self.touch_count
  }

  pub fn multi_count(&self) -> u32 {
    self.multi_count
  }

  pub fn all_finger_count(&self) -> u32 {
    self.all_finger_count
  }

  pub fn release_counter(&self) -> u32 {
    self.release_counter
  }

  pub(crate) fn bump_release_counter(&mut self) {
    self.release_counter = self.release_counter.wrapping_add(1);
  }

  pub(crate) fn reset_release_counter(&mut self) {
    self.release_counter = 0;
  }

  pub fn slot(&self, slot: usize) -> Option<&TouchPoint> {
    self.slots.get(slot)
  }

  pub fn iter(&self) -> impl Iterator<Item = &TouchPoint> + '_ {
    self.slots.iter()
  }

  /// Fold one coordinate record into the table.
  pub fn apply(&mut self, c: &Coordinate) -> Transition {
    let Some(slot) = c.slot() else {
      return Transition::Ignored(Ignored::OutOfRange(c.tid));
    };
    if !c.touch_type.is_tracked() {
      return Transition::Ignored(Ignored::UnsupportedType(c.touch_type));
    }

    let p = &mut self.slots[slot];
    let was_active = p.action.is_active();

    p.x = c.x;
    p.y = c.y;
    p.z = c.z.max(1);
    p.major = c.major;
    p.minor = c.minor;
    p.touch_type = c.touch_type;
    let palm = c.touch_type == TouchType::Palm;
    if palm && !p.palm {
      p.palm_count = p.palm_count.saturating_add(1);
    }
    p.palm = palm;
    p.left_event = c.left_event;
    p.noise_level = p.noise_level.max(c.noise_level);
    p.max_strength = p.max_strength.max(c.max_strength);
    p.hover_id_num = p.hover_id_num.max(c.hover_id_num);
    p.noise_status = c.noise_status;

    match c.action {
      Action::Press if !was_active => {
        p.action = Action::Press;
        p.p_x = c.x;
        p.p_y = c.y;
        (p.max_energy_x, p.max_energy_y) = if c.max_energy { (c.x, c.y) } else { (0, 0) };
        let point = *p;

        self.begin_contact();
        self.all_finger_count = self.all_finger_count.wrapping_add(1);
        Transition::Press(point)
      }
      // A repeated press on a live contact only updates it.
      Action::Press | Action::Move => {
        if c.max_energy {
          p.max_energy_x = c.x;
          p.max_energy_y = c.y;
        }
        p.action = Action::Move;
        p.mcount = p.mcount.wrapping_add(1);
        let point = *p;

        // A contact whose press was lost still counts as on the panel.
        if !was_active {
          self.begin_contact();
        }
        Transition::Move { point, fresh: !was_active }
      }
      Action::Release => {
        let point = *p;
        p.clear_contact();
        if !was_active {
          return Transition::Ignored(Ignored::StaleRelease(point.id));
        }
        self.end_contact();
        Transition::Release(point)
      }
      Action::None => Transition::Ignored(Ignored::NoAction),
    }
  }

  fn begin_contact(&mut self) {
    self.touch_count = self.touch_count.saturating_add(1);
    if self.touch_count > MULTI_TOUCH_THRESHOLD && !self.multi {
      self.multi = true;
      self.multi_count = self.multi_count.wrapping_add(1);
    }
  }

  fn end_contact(&mut self) {
    if self.touch_count > 0 {
      self.touch_count -= 1;
    }
    if self.touch_count == 0 {
      self.multi = false;
      self.release_counter = 0;
    }
  }

  /// Release every live contact. Returns the slots that were released.
  pub fn release_all(&mut self) -> Vec<u8> {
    let mut released = Vec::new();
    for p in self.slots.iter_mut().filter(|p| p.action.is_active()) {
      p.clear_contact();
      released.push(p.id);
    }
    self.touch_count = 0;
    self.multi = false;
    released
  }
}

impl Default for SlotTable {
  fn default() -> Self {
    Self::new()
  }
}
