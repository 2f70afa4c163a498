//! Minimal configuration example.
#![allow(unused)]
use embedded_hal::{
  delay::DelayNs,
  digital::{InputPin, OutputPin},
  i2c::I2c,
};
use sec_ts::{Config, Geometry, GpioPlatform, I2cTransport, InputEvent, SecTs, Timing, I2C_ADDR};

#[allow(dead_code)]
fn run<I, D, PWR, INT>(i2c: I, delay: D, pwr: PWR, int: INT) -> Result<(), sec_ts::Error>
where
  I: I2c + Send + 'static,
  D: DelayNs + Send + 'static,
  PWR: OutputPin + Send + 'static,
  INT: InputPin + Send + 'static,
{
  let config = Config::default()
    .with_geometry(Geometry::new(1439, 3039, 133, 266, 60))
    .with_timing(Timing::new().with_print_info_interval(60_000))
    .with_por_after_retry(true);

  let transport = I2cTransport::new(i2c, delay, I2C_ADDR, &config);
  let platform = GpioPlatform::new(pwr, int).with_wakeup(true);
  let ts = SecTs::new(transport, platform, |_: InputEvent| {}, config)?;

  ts.update_settings(|s| {
    s.use_sponge = true;
    s.lowpower_mode = sec_ts::SPONGE_MODE_DOUBLETAP_TO_WAKEUP;
  });
  ts.probe()?;
  Ok(())
}

fn main() {}
