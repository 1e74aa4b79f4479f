//! Tally resolution
//!
//! Turns a switcher snapshot plus the channel map into the full set of lamps
//! that should be lit. Nothing here can fail: inputs the map does not cover
//! (mid-transition sentinels, unassigned slots, inputs beyond the table)
//! simply light nothing.

use crate::channel_map::ChannelMap;
use crate::state::{LampState, SwitcherState};

/// Compute which lamps show program and which show preview
///
/// A lamp that would be both program and preview shows program: one lamp
/// can only show one color. Preview is ignored unless the switcher reports
/// it as live.
pub fn resolve(state: &SwitcherState, map: &ChannelMap) -> LampState {
    let program = map.resolve(state.program_input);
    let preview = state.preview().and_then(|id| map.resolve(id));

    LampState::new(program, preview)
}
