//! Tally Core Library
//!
//! This crate holds everything needed to turn a video switcher's bus state
//! into lamp commands for a serial tally panel, without any I/O:
//!
//! - **Data model**: mixer input ids, lamp channels, switcher and lamp state
//! - **ChannelMap**: user-configurable slot → lamp assignment table
//! - **Resolver**: pure program/preview resolution with program precedence
//! - **Lamp protocol**: `<dark>` / `<ddNN>` encoding and a streaming decoder
//! - **Switcher contract**: the interface a switcher SDK binding implements
//!
//! # Example
//!
//! ```rust
//! use tally_core::{resolve, ChannelMap, LampCommand, SwitcherState};
//!
//! let map = ChannelMap::default();
//! let state = SwitcherState::new(3, 5, true);
//!
//! let lamps = resolve(&state, &map);
//! let wire: Vec<String> = lamps.commands().iter().map(|c| c.to_string()).collect();
//! assert_eq!(wire, ["<dark>", "<dd02>", "<dd04>"]);
//! ```

pub mod channel_map;
pub mod error;
pub mod lamp;
pub mod resolver;
pub mod state;
pub mod switcher;

pub use channel_map::ChannelMap;
pub use error::{ConfigError, ParseError};
pub use lamp::{encode_commands, LampCodec, LampCommand};
pub use resolver::resolve;
pub use state::{LampChannel, LampColor, LampState, MixerInputId, SwitcherState};
pub use switcher::{
    ConnectFailure, SwitcherError, SwitcherHandle, SwitcherNotification, SwitcherNotifier,
    SwitcherStateSource,
};

/// Number of physical lamps on the reference tally panel
pub const DEFAULT_LAMP_COUNT: usize = 6;

/// Number of configurable slots in the channel assignment table
pub const DEFAULT_SLOT_COUNT: usize = 8;

/// Largest lamp count the two-digit wire format can address
pub const MAX_LAMP_COUNT: usize = 100;
