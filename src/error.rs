use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Channel {0} is out of range, expected 1-4")]
    ChannelOutOfRange(u8),
}

/// Reasons an inbound event did not produce a frame write.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Source identifier (topic, pin) does not name any channel.
    #[error("Unknown channel '{0}'")]
    UnknownChannel(String),
    /// Payload matches neither the ON nor the OFF tokens.
    #[error("Unknown payload '{payload}' for channel {channel}")]
    UnknownPayload { channel: u8, payload: String },
    /// The outbound transport is gone.
    #[error("Transport closed: {0}")]
    Transport(#[source] anyhow::Error),
}

impl From<FrameError> for DispatchError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::ChannelOutOfRange(idx) => DispatchError::UnknownChannel(idx.to_string()),
        }
    }
}
