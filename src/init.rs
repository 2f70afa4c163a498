use log::{debug, error, info};

use super::{defs, Error, InputSink, Platform, SecTs, StateError, Transport};
use crate::event::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadyState {
  SampleLine,
  ReadEvent,
  Backoff,
}

impl<T, P, S> SecTs<T, P, S>
where
  T: Transport + 'static,
  P: Platform + 'static,
  S: InputSink + 'static,
{
  /// Poll the event queue until the controller posts an informational status
  /// acknowledging `ack`.
  ///
  /// The queue is only read while the attention line is low. Every poll is
  /// followed by a fixed step delay; the budget is `wait_retries + 1` polls.
  pub(super) fn wait_for_ready(&self, ack: u8) -> Result<(), Error> {
    let timing = self.config.timing;
    let mut raw = [0u8; defs::EVENT_BUFF_SIZE];
    let mut retry: u16 = 0;
    let mut state = ReadyState::SampleLine;

    loop {
      match state {
        ReadyState::SampleLine => {
          if retry > timing.wait_retries {
            error!("wait_for_ready: Time Over");
            debug!("wait_for_ready: last event {:02X?} [{}]", &raw[..8], retry);
            return Err(StateError::BootTimeout.into());
          }
          state = if self.platform.irq_line_low() { ReadyState::ReadEvent } else { ReadyState::Backoff };
        }

        ReadyState::ReadEvent => {
          match self.read(defs::Cmd::ReadOneEvent, &mut raw) {
            Ok(()) if Status::from(&raw).is_ack(ack) => {
              info!("wait_for_ready: {:02X?} [{}]", &raw[..8], retry);
              return Ok(());
            }
            Ok(()) => {}
            Err(e) => debug!("wait_for_ready: {e}"),
          }
          state = ReadyState::Backoff;
        }

        ReadyState::Backoff => {
          self.platform.delay_ms(timing.wait_step);
          retry += 1;
          state = ReadyState::SampleLine;
        }
      }
    }
  }
}
