//! Event processing example: contacts, wake gestures and low power.
#![allow(unused)]
use embedded_hal::{
  delay::DelayNs,
  digital::{InputPin, OutputPin},
  i2c::I2c,
};
use sec_ts::{Config, GpioPlatform, I2cTransport, InputEvent, Key, SecTs, I2C_ADDR};

#[allow(dead_code)]
fn run<I, D, PWR, INT>(i2c: I, delay: D, pwr: PWR, int: INT) -> Result<(), sec_ts::Error>
where
  I: I2c + Send + 'static,
  D: DelayNs + Send + 'static,
  PWR: OutputPin + Send + 'static,
  INT: InputPin + Send + 'static,
{
  let config = Config::default();
  let transport = I2cTransport::new(i2c, delay, I2C_ADDR, &config);
  let platform = GpioPlatform::new(pwr, int);

  let sink = |event: InputEvent| match event {
    InputEvent::Down(contact) | InputEvent::Move(contact) => {
      let _ = contact;
      // track the contact
    }
    InputEvent::Up { slot } => {
      let _ = slot;
      // lift the contact
    }
    InputEvent::Key { key: Key::WakeUp, pressed: true } => {
      // wake the display
    }
    _ => {}
  };

  let ts = SecTs::new(transport, platform, sink, config)?;
  ts.probe()?;
  ts.input_open()?;

  loop {
    // Wait for the attention line here, then service it.
    ts.handle_irq();

    if let Some(gesture) = ts.last_wake_gesture() {
      let _ = gesture;
      // handle the wake gesture
    }
  }
}

fn main() {}
