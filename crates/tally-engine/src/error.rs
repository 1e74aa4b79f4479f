//! Error types for the tally engine

use tally_core::{ConfigError, ConnectFailure, SwitcherError};
use tally_detect::DetectError;
use thiserror::Error;

/// Errors that can occur in the tally engine
#[derive(Debug, Error)]
pub enum TallyError {
    /// Switcher connection attempt failed
    #[error("{}", .0.user_message())]
    Connection(#[from] ConnectFailure),

    /// Lamp transport could not be opened or written
    #[error("lamp transport {port}: {reason}")]
    Transport { port: String, reason: String },

    /// Lamp transport is not open
    #[error("Tally not up!")]
    TransportNotOpen,

    /// Rejected channel map edit
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The switcher did not behave as the protocol promises
    #[error("Unexpected: {0}")]
    UnexpectedProtocolState(String),

    /// A switcher read failed
    #[error("switcher error: {0}")]
    Switcher(SwitcherError),

    /// Serial port enumeration failed
    #[error("port detection failed: {0}")]
    Detect(#[from] DetectError),

    /// The controller task has stopped
    #[error("tally controller is not running")]
    ActorStopped,

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<SwitcherError> for TallyError {
    fn from(e: SwitcherError) -> Self {
        match e {
            SwitcherError::NoMixEffectBlock => {
                Self::UnexpectedProtocolState("Could not get first mix effect block".into())
            }
            other => Self::Switcher(other),
        }
    }
}
