//! Lamp panel wire protocol
//!
//! The tally panel speaks a tiny line-oriented text protocol. Every command
//! is wrapped in angle brackets and terminated by a newline:
//!
//! - `<dark>` turns every lamp off
//! - `<ddNN>` lights lamp `NN` (two digits, zero-padded, zero-based)
//!
//! Nothing is ever read back from the panel.

use std::fmt;

use crate::error::ParseError;
use crate::state::LampChannel;

/// Longest frame the decoder will buffer before discarding input
const MAX_FRAME_LEN: usize = 16;

/// A single command for the lamp panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LampCommand {
    /// Turn every lamp off
    Dark,
    /// Light one lamp
    Activate(LampChannel),
}

impl LampCommand {
    /// Encode this command to its wire format, including the newline
    pub fn encode(&self) -> Vec<u8> {
        format!("{}\n", self).into_bytes()
    }

    /// Parse a frame body including its angle brackets, e.g. `<dd03>`
    pub fn parse(frame: &str) -> Result<Self, ParseError> {
        let body = frame
            .strip_prefix('<')
            .and_then(|f| f.strip_suffix('>'))
            .ok_or_else(|| ParseError::InvalidFrame(frame.into()))?;

        if body == "dark" {
            return Ok(LampCommand::Dark);
        }

        let digits = body
            .strip_prefix("dd")
            .ok_or_else(|| ParseError::UnknownCommand(body.into()))?;
        if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidChannel(digits.into()));
        }
        let index = digits
            .parse::<u8>()
            .map_err(|_| ParseError::InvalidChannel(digits.into()))?;
        LampChannel::new(index)
            .map(LampCommand::Activate)
            .ok_or_else(|| ParseError::InvalidChannel(digits.into()))
    }
}

impl fmt::Display for LampCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LampCommand::Dark => write!(f, "<dark>"),
            LampCommand::Activate(channel) => write!(f, "<dd{}>", channel),
        }
    }
}

/// Encode a command sequence into one contiguous buffer
///
/// The buffer is written to the transport in a single write so that
/// sequences from different cycles never interleave.
pub fn encode_commands(commands: &[LampCommand]) -> Vec<u8> {
    commands.iter().flat_map(|c| c.encode()).collect()
}

/// Streaming decoder for lamp protocol bytes
///
/// Tolerates blank lines, CR/LF line endings and stray bytes between
/// frames. Malformed frames are logged and skipped.
#[derive(Debug, Default)]
pub struct LampCodec {
    buffer: Vec<u8>,
}

impl LampCodec {
    /// Create a new lamp codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }

    /// Push raw bytes into the codec buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next complete command from the buffer
    pub fn next_command(&mut self) -> Option<LampCommand> {
        self.next_command_with_bytes().map(|(cmd, _)| cmd)
    }

    /// Try to extract the next complete command along with its frame bytes
    pub fn next_command_with_bytes(&mut self) -> Option<(LampCommand, Vec<u8>)> {
        loop {
            // Drop anything before the next frame start
            let Some(start) = self.buffer.iter().position(|&b| b == b'<') else {
                self.buffer.clear();
                return None;
            };
            self.buffer.drain(..start);

            let Some(end) = self.buffer.iter().position(|&b| b == b'>') else {
                if self.buffer.len() > MAX_FRAME_LEN {
                    tracing::warn!(
                        "Discarding unterminated lamp frame ({} bytes)",
                        self.buffer.len()
                    );
                    self.buffer.drain(..1);
                    continue;
                }
                return None;
            };

            let frame: Vec<u8> = self.buffer.drain(..=end).collect();

            // A second '<' inside means the earlier frame was cut short
            if let Some(restart) = frame[1..].iter().rposition(|&b| b == b'<') {
                let tail = frame[restart + 1..].to_vec();
                self.buffer.splice(0..0, tail);
                continue;
            }

            match LampCommand::parse(&String::from_utf8_lossy(&frame)) {
                Ok(cmd) => return Some((cmd, frame)),
                Err(e) => {
                    tracing::warn!("Failed to parse lamp frame: {}", e);
                }
            }
        }
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
