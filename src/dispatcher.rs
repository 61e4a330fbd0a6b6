//! Inbound event -> relay frame.
//!
//! The dispatcher owns nothing but the outbound sink. Inbound adapters turn
//! their transport specific events into a `Command`; the dispatcher looks the
//! command up in the static table and writes the frame once.
use std::future::Future;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{PayloadConfig, UnknownPayload};
use crate::error::DispatchError;
use crate::frame::{Channel, CommandFrame, CommandTable, DesiredState, COMMAND_TABLE};

/// Resolved request: switch `channel` to `state`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Command {
    pub channel: Channel,
    pub state: DesiredState,
}

/// Byte sink connected to the relay board.
pub trait FrameSink {
    fn write_frame(&self, frame: CommandFrame) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Frames are handed over to the serial writer task.
impl FrameSink for mpsc::Sender<CommandFrame> {
    async fn write_frame(&self, frame: CommandFrame) -> anyhow::Result<()> {
        if self.send(frame).await.is_err() {
            anyhow::bail!("Serial writer is gone");
        }
        Ok(())
    }
}

/// Translates one kind of inbound event into a command.
pub trait InboundAdapter {
    type Event: ?Sized;

    fn resolve(&self, event: &Self::Event) -> Result<Command, DispatchError>;
}

/// Explicit ON/OFF payload vocabulary.
#[derive(Clone, Debug)]
pub struct StateTokens {
    on: Vec<String>,
    off: Vec<String>,
    unknown: UnknownPayload,
}

impl StateTokens {
    pub fn new(config: &PayloadConfig) -> Self {
        Self {
            on: config.on_tokens.clone(),
            off: config.off_tokens.clone(),
            unknown: config.unknown,
        }
    }

    pub fn resolve(&self, channel: Channel, payload: &str) -> Result<DesiredState, DispatchError> {
        if self.on.iter().any(|t| t == payload) {
            Ok(DesiredState::On)
        } else if self.off.iter().any(|t| t == payload) {
            Ok(DesiredState::Off)
        } else {
            unknown_payload(self.unknown, channel, payload)
        }
    }

    pub fn unknown_policy(&self) -> UnknownPayload {
        self.unknown
    }

    /// Canonical payload for `state`, used when publishing commands.
    pub fn token_for(&self, state: DesiredState) -> &str {
        match state {
            DesiredState::On => &self.on[0],
            DesiredState::Off => &self.off[0],
        }
    }
}

/// Apply the unknown-payload policy.
pub fn unknown_payload(
    policy: UnknownPayload,
    channel: Channel,
    payload: &str,
) -> Result<DesiredState, DispatchError> {
    match policy {
        UnknownPayload::Reject => Err(DispatchError::UnknownPayload {
            channel: channel.index(),
            payload: payload.to_string(),
        }),
        UnknownPayload::Off => {
            warn!(
                "Unrecognized payload '{}' for channel {}, switching off",
                payload, channel
            );
            Ok(DesiredState::Off)
        }
    }
}

pub struct Dispatcher<S> {
    table: &'static CommandTable,
    sink: S,
}

impl<S: FrameSink> Dispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            table: &COMMAND_TABLE,
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Resolve `event` with `adapter` and write the matching frame.
    pub async fn dispatch<A: InboundAdapter>(
        &self,
        adapter: &A,
        event: &A::Event,
    ) -> Result<CommandFrame, DispatchError> {
        let command = adapter.resolve(event)?;
        self.execute(command).await
    }

    pub async fn execute(&self, command: Command) -> Result<CommandFrame, DispatchError> {
        let frame = self.table.lookup(command.channel, command.state);
        info!("Switching channel {} {}", command.channel, command.state);
        self.sink
            .write_frame(frame)
            .await
            .map_err(DispatchError::Transport)?;
        Ok(frame)
    }

    /// Switch every channel off, in channel order.
    pub async fn all_off(&self) -> Result<(), DispatchError> {
        for channel in Channel::ALL {
            self.execute(Command {
                channel,
                state: DesiredState::Off,
            })
            .await?;
        }
        Ok(())
    }
}
