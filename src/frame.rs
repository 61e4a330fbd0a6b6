//! Binary commands understood by the relay controller board.
//!
//! Every command is exactly four bytes:
//! `[0xA0, channel, state, checksum]` where `checksum` is the wrapping sum of
//! the first three bytes. There are no delimiters and no replies.
use std::fmt;

use crate::consts::{CHANNEL_COUNT, FRAME_HEADER, FRAME_LENGTH};
use crate::error::FrameError;

/// One of the relay outputs, 1-4.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT as usize] =
        [Channel(1), Channel(2), Channel(3), Channel(4)];

    pub fn new(idx: u8) -> Result<Self, FrameError> {
        if (1..=CHANNEL_COUNT).contains(&idx) {
            Ok(Self(idx))
        } else {
            Err(FrameError::ChannelOutOfRange(idx))
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Position in zero-based tables.
    fn slot(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum DesiredState {
    /// Relay released.
    Off = 0,
    /// Relay energized.
    On = 1,
}

impl DesiredState {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            1 => Some(Self::On),
            _ => None,
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("OFF"),
            Self::On => f.write_str("ON"),
        }
    }
}

/// Raw command ready to be written to the UART.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct CommandFrame([u8; FRAME_LENGTH]);

impl CommandFrame {
    const fn build(channel: u8, state: DesiredState) -> Self {
        let state = state as u8;
        let checksum = FRAME_HEADER.wrapping_add(channel).wrapping_add(state);
        Self([FRAME_HEADER, channel, state, checksum])
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LENGTH] {
        &self.0
    }

    pub fn channel(&self) -> u8 {
        self.0[1]
    }

    pub fn state(&self) -> Option<DesiredState> {
        DesiredState::from_u8(self.0[2])
    }

    pub fn checksum_ok(&self) -> bool {
        self.0[0].wrapping_add(self.0[1]).wrapping_add(self.0[2]) == self.0[3]
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandFrame({:02x?})", self.0)
    }
}

/// All frames the board understands, indexed by channel and state.
pub struct CommandTable {
    frames: [[CommandFrame; 2]; CHANNEL_COUNT as usize],
}

pub static COMMAND_TABLE: CommandTable = CommandTable::new();

impl CommandTable {
    const fn new() -> Self {
        let mut frames = [[CommandFrame([0; FRAME_LENGTH]); 2]; CHANNEL_COUNT as usize];
        let mut slot = 0;
        while slot < CHANNEL_COUNT as usize {
            let channel = slot as u8 + 1;
            frames[slot][DesiredState::Off as usize] =
                CommandFrame::build(channel, DesiredState::Off);
            frames[slot][DesiredState::On as usize] =
                CommandFrame::build(channel, DesiredState::On);
            slot += 1;
        }
        Self { frames }
    }

    pub fn lookup(&self, channel: Channel, state: DesiredState) -> CommandFrame {
        self.frames[channel.slot()][state as usize]
    }

    /// Same as `lookup`, for callers holding a bare channel number.
    pub fn lookup_raw(
        &self,
        channel: u8,
        state: DesiredState,
    ) -> Result<CommandFrame, FrameError> {
        Ok(self.lookup(Channel::new(channel)?, state))
    }

    pub fn entries(&self) -> impl Iterator<Item = (Channel, DesiredState, CommandFrame)> + '_ {
        Channel::ALL.into_iter().flat_map(move |channel| {
            [DesiredState::On, DesiredState::Off]
                .into_iter()
                .map(move |state| (channel, state, self.lookup(channel, state)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_carry_header_channel_and_state() {
        for (channel, state, frame) in COMMAND_TABLE.entries() {
            let bytes = frame.as_bytes();
            assert_eq!(bytes[0], 0xA0);
            assert_eq!(bytes[1], channel.index());
            assert_eq!(frame.channel(), channel.index());
            assert_eq!(bytes[2], if state.is_on() { 1 } else { 0 });
            assert_eq!(frame.state(), Some(state));
        }
    }

    #[test]
    fn checksum_is_wrapping_sum() {
        for (_, _, frame) in COMMAND_TABLE.entries() {
            let b = frame.as_bytes();
            let sum = (b[0] as u16 + b[1] as u16 + b[2] as u16) % 256;
            assert_eq!(b[3] as u16, sum);
            assert!(frame.checksum_ok());
        }
    }

    #[test]
    fn table_matches_board_documentation() {
        let expected: [(u8, DesiredState, [u8; 4]); 8] = [
            (1, DesiredState::On, [0xA0, 0x01, 0x01, 0xA2]),
            (1, DesiredState::Off, [0xA0, 0x01, 0x00, 0xA1]),
            (2, DesiredState::On, [0xA0, 0x02, 0x01, 0xA3]),
            (2, DesiredState::Off, [0xA0, 0x02, 0x00, 0xA2]),
            (3, DesiredState::On, [0xA0, 0x03, 0x01, 0xA4]),
            (3, DesiredState::Off, [0xA0, 0x03, 0x00, 0xA3]),
            (4, DesiredState::On, [0xA0, 0x04, 0x01, 0xA5]),
            (4, DesiredState::Off, [0xA0, 0x04, 0x00, 0xA4]),
        ];
        for (channel, state, bytes) in expected {
            let frame = COMMAND_TABLE.lookup_raw(channel, state).unwrap();
            assert_eq!(frame.as_bytes(), &bytes);
        }
    }

    #[test]
    fn table_has_exactly_eight_distinct_entries() {
        let frames: std::collections::HashSet<_> =
            COMMAND_TABLE.entries().map(|(_, _, f)| f).collect();
        assert_eq!(frames.len(), 8);
    }

    #[test]
    fn lookup_rejects_channels_outside_range() {
        for channel in [0u8, 5, 9, 255] {
            assert_eq!(
                COMMAND_TABLE.lookup_raw(channel, DesiredState::On),
                Err(FrameError::ChannelOutOfRange(channel))
            );
        }
    }

    #[test]
    fn state_conversions() {
        assert_eq!(DesiredState::from_u8(0), Some(DesiredState::Off));
        assert_eq!(DesiredState::from_u8(2), None);
        assert_eq!(DesiredState::from_u8(1), Some(DesiredState::On));
    }
}
