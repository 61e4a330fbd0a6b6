//! Dashboard style virtual pins: pin `V1`..`V4` drives channel 1..4, value
//! `1` switches on and `0` switches off.
use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::config::UnknownPayload;
use crate::dispatcher::{unknown_payload, Command, Dispatcher, FrameSink, InboundAdapter};
use crate::error::DispatchError;
use crate::frame::{Channel, DesiredState};

/// One virtual pin write, eg. `V2 1`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PinWrite {
    pub pin: u32,
    pub value: i64,
}

impl FromStr for PinWrite {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let (Some(pin), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            anyhow::bail!("Expected 'V<pin> <value>', got '{}'", line);
        };
        let pin = pin
            .strip_prefix(['V', 'v'])
            .ok_or_else(|| anyhow::anyhow!("Pin must start with 'V': '{}'", pin))?;
        Ok(PinWrite {
            pin: pin.parse()?,
            value: value.parse()?,
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PinAdapter {
    unknown: UnknownPayload,
}

impl PinAdapter {
    pub fn new(unknown: UnknownPayload) -> Self {
        Self { unknown }
    }
}

impl InboundAdapter for PinAdapter {
    type Event = PinWrite;

    fn resolve(&self, event: &PinWrite) -> Result<Command, DispatchError> {
        let channel = u8::try_from(event.pin)
            .ok()
            .and_then(|pin| Channel::new(pin).ok())
            .ok_or_else(|| DispatchError::UnknownChannel(format!("V{}", event.pin)))?;
        let state = match event.value {
            1 => DesiredState::On,
            0 => DesiredState::Off,
            other => unknown_payload(self.unknown, channel, &other.to_string())?,
        };
        Ok(Command { channel, state })
    }
}

/// Dispatch pin writes read line by line from `input` until EOF.
/// Returns the number of frames written.
pub async fn run_console<R, S>(
    input: R,
    dispatcher: &Dispatcher<S>,
    adapter: &PinAdapter,
) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    S: FrameSink,
{
    let mut lines = input.lines();
    let mut written = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let write = match line.parse::<PinWrite>() {
            Ok(write) => write,
            Err(err) => {
                warn!("Skipping line: {}", err);
                continue;
            }
        };
        match dispatcher.dispatch(adapter, &write).await {
            Ok(frame) => {
                info!("V{} <- {}: sent {:?}", write.pin, write.value, frame);
                written += 1;
            }
            Err(DispatchError::Transport(err)) => return Err(err),
            Err(err) => warn!("Ignoring {:?}: {}", write, err),
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::tests::Recorder;

    #[test]
    fn parses_pin_writes() {
        assert_eq!("V1 1".parse::<PinWrite>().unwrap(), PinWrite { pin: 1, value: 1 });
        assert_eq!("v4   0".parse::<PinWrite>().unwrap(), PinWrite { pin: 4, value: 0 });
        assert_eq!("V9 -3".parse::<PinWrite>().unwrap(), PinWrite { pin: 9, value: -3 });
        assert!("1 1".parse::<PinWrite>().is_err());
        assert!("V1".parse::<PinWrite>().is_err());
        assert!("V1 1 2".parse::<PinWrite>().is_err());
        assert!("Vx 1".parse::<PinWrite>().is_err());
    }

    #[test]
    fn pins_map_directly_to_channels() {
        let adapter = PinAdapter::default();
        for pin in 1..=4u32 {
            let command = adapter.resolve(&PinWrite { pin, value: 1 }).unwrap();
            assert_eq!(command.channel.index() as u32, pin);
            assert_eq!(command.state, DesiredState::On);
        }
        assert!(matches!(
            adapter.resolve(&PinWrite { pin: 0, value: 1 }),
            Err(DispatchError::UnknownChannel(ref p)) if p == "V0"
        ));
    }

    #[test]
    fn pins_beyond_u8_are_unknown_channels() {
        let write = "V300 1".parse::<PinWrite>().unwrap();
        assert_eq!(write, PinWrite { pin: 300, value: 1 });
        assert!(matches!(
            PinAdapter::default().resolve(&write),
            Err(DispatchError::UnknownChannel(ref p)) if p == "V300"
        ));
    }

    #[test]
    fn other_values_follow_policy() {
        let strict = PinAdapter::new(UnknownPayload::Reject);
        assert!(strict.resolve(&PinWrite { pin: 2, value: 7 }).is_err());

        let legacy = PinAdapter::new(UnknownPayload::Off);
        let command = legacy.resolve(&PinWrite { pin: 2, value: 7 }).unwrap();
        assert_eq!(command.state, DesiredState::Off);
    }

    #[tokio::test]
    async fn console_dispatches_valid_lines() {
        let input: &[u8] = b"# bench\nV1 1\nnonsense\nV9 1\n\nV4 0\nV2 5\n";
        let dispatcher = Dispatcher::new(Recorder::default());
        let written = run_console(input, &dispatcher, &PinAdapter::default())
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            dispatcher.sink().written(),
            vec![[0xA0, 0x01, 0x01, 0xA2], [0xA0, 0x04, 0x00, 0xA4]]
        );
    }
}
