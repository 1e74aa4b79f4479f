//! Error types for tally configuration and lamp protocol parsing

use thiserror::Error;

/// Errors that can occur while decoding lamp protocol data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Frame is not enclosed in `<` `>`
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Unknown or unsupported command
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Lamp index is not two decimal digits
    #[error("invalid lamp channel: {0}")]
    InvalidChannel(String),
}

/// Errors from editing or building a channel map
///
/// These are configuration mistakes made by an operator. Resolving an
/// out-of-range mixer input is never one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Slot outside `1..=slot_count`
    #[error("slot {slot} is out of range (1..={slot_count})")]
    SlotOutOfRange { slot: usize, slot_count: usize },

    /// Lamp channel not present on the panel
    #[error("lamp channel {channel} is out of range (panel has {lamp_count} lamps)")]
    ChannelOutOfRange { channel: usize, lamp_count: usize },

    /// Lamp count of zero or beyond what the wire format can address
    #[error("invalid lamp count: {0}")]
    InvalidLampCount(usize),

    /// Slot table with no slots
    #[error("invalid slot count: {0}")]
    InvalidSlotCount(usize),
}
