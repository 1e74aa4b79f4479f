//! Unified event stream for the tally controller
//!
//! Everything the controller does (switcher lifecycle, lamp transport
//! lifecycle, resolved tally, bytes written, status lines) is emitted through
//! a single event channel, so observers see one consistently ordered stream.

use tally_core::{ChannelMap, LampState, SwitcherState};

use crate::link::LampLinkMeta;
use crate::status::StatusReport;

/// Why a switcher session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The switcher went away
    Lost,
    /// The operator asked to disconnect
    Requested,
}

/// Unified event enum for all controller activity
#[derive(Debug, Clone)]
pub enum TallyEvent {
    // -------------------------------------------------------------------------
    // Switcher lifecycle events
    // -------------------------------------------------------------------------
    /// A switcher session started
    SwitcherConnected {
        /// Address that was connected to
        address: String,
        /// Product name reported by the switcher
        product_name: Option<String>,
    },

    /// The switcher session ended
    SwitcherDisconnected {
        /// Why it ended
        reason: DisconnectReason,
    },

    // -------------------------------------------------------------------------
    // Lamp transport lifecycle events
    // -------------------------------------------------------------------------
    /// A lamp panel transport was opened
    TransportOpened {
        /// Metadata about the transport
        meta: LampLinkMeta,
    },

    /// The lamp panel transport was closed
    TransportClosed,

    // -------------------------------------------------------------------------
    // Tally events
    // -------------------------------------------------------------------------
    /// A resolve cycle produced a lamp state
    TallyResolved {
        /// Switcher state that was read
        state: SwitcherState,
        /// Lamps it resolved to
        lamps: LampState,
    },

    /// The channel map was edited
    ChannelMapChanged {
        /// The map now in effect
        map: ChannelMap,
    },

    /// Lamp test started (every lamp lit)
    LampTestStarted,

    /// Lamp test ended
    LampTestEnded,

    // -------------------------------------------------------------------------
    // Traffic events
    // -------------------------------------------------------------------------
    /// Data written to the lamp panel (engine -> panel)
    LampDataOut {
        /// Raw data bytes
        data: Vec<u8>,
    },

    // -------------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------------
    /// User-visible status line
    Status(StatusReport),
}

impl TallyEvent {
    /// Check if this is a traffic event (for traffic monitor filtering)
    pub fn is_traffic(&self) -> bool {
        matches!(self, TallyEvent::LampDataOut { .. })
    }

    /// The status report carried by this event, if any
    pub fn status(&self) -> Option<&StatusReport> {
        match self {
            TallyEvent::Status(report) => Some(report),
            _ => None,
        }
    }
}
