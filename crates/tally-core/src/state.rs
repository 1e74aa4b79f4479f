//! Switcher and lamp state types

use std::collections::BTreeSet;
use std::fmt;

use crate::lamp::LampCommand;

/// Identifier of a switcher source as reported by the device
///
/// Positive values name an input; zero and negative values mean "none".
pub type MixerInputId = i64;

/// A physical tally indicator, addressed by zero-based index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct LampChannel(u8);

impl LampChannel {
    /// Highest index the two-digit wire format can carry
    pub const MAX_INDEX: u8 = 99;

    /// Create a lamp channel, or `None` if the index cannot be addressed
    pub fn new(index: u8) -> Option<Self> {
        (index <= Self::MAX_INDEX).then_some(Self(index))
    }

    /// Get the zero-based lamp index
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Human-facing lamp number (one-based, as printed on the panel)
    pub fn number(&self) -> usize {
        self.0 as usize + 1
    }
}

impl fmt::Display for LampChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// Snapshot of the switcher's first mix-effect block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitcherState {
    /// Input currently on air
    pub program_input: MixerInputId,
    /// Input staged for the next transition (only meaningful when live)
    pub preview_input: MixerInputId,
    /// Whether the device is in or primed for a transition
    pub preview_is_live: bool,
}

impl SwitcherState {
    /// Create a new switcher state
    pub fn new(
        program_input: MixerInputId,
        preview_input: MixerInputId,
        preview_is_live: bool,
    ) -> Self {
        Self {
            program_input,
            preview_input,
            preview_is_live,
        }
    }

    /// State reported by a switcher with nothing selected
    pub fn idle() -> Self {
        Self::new(0, -1, false)
    }

    /// The preview input, if the device reports a usable one
    pub fn preview(&self) -> Option<MixerInputId> {
        self.preview_is_live.then_some(self.preview_input)
    }

    /// One-line description for status display
    pub fn describe(&self) -> String {
        match self.preview() {
            Some(id) => format!("Prog: {} Prev: {}", self.program_input, id),
            None => format!("Prog: {} Prev: Not in transition", self.program_input),
        }
    }
}

impl Default for SwitcherState {
    fn default() -> Self {
        Self::idle()
    }
}

/// What a single lamp is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LampColor {
    #[default]
    Off,
    /// On air (red)
    Program,
    /// Next up
    Preview,
}

impl LampColor {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Program => "program",
            Self::Preview => "preview",
        }
    }
}

/// Full lamp snapshot produced by the resolver
///
/// Channels not in either set are off. A channel is never in both sets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LampState {
    program: BTreeSet<LampChannel>,
    preview: BTreeSet<LampChannel>,
}

impl LampState {
    /// All lamps off
    pub fn dark() -> Self {
        Self::default()
    }

    /// Build a lamp state, collapsing any overlap in favour of program
    pub fn new(
        program: impl IntoIterator<Item = LampChannel>,
        preview: impl IntoIterator<Item = LampChannel>,
    ) -> Self {
        let program: BTreeSet<_> = program.into_iter().collect();
        let preview = preview
            .into_iter()
            .filter(|c| !program.contains(c))
            .collect();
        Self { program, preview }
    }

    /// Channels commanded to program
    pub fn program(&self) -> &BTreeSet<LampChannel> {
        &self.program
    }

    /// Channels commanded to preview
    pub fn preview(&self) -> &BTreeSet<LampChannel> {
        &self.preview
    }

    /// Whether every lamp is off
    pub fn is_dark(&self) -> bool {
        self.program.is_empty() && self.preview.is_empty()
    }

    /// What a given lamp should show
    pub fn color_of(&self, channel: LampChannel) -> LampColor {
        if self.program.contains(&channel) {
            LampColor::Program
        } else if self.preview.contains(&channel) {
            LampColor::Preview
        } else {
            LampColor::Off
        }
    }

    /// Command sequence that puts the panel into this state from any prior state
    ///
    /// Always starts with [`LampCommand::Dark`], followed by program channels
    /// then preview channels, each in ascending order.
    pub fn commands(&self) -> Vec<LampCommand> {
        std::iter::once(LampCommand::Dark)
            .chain(self.program.iter().copied().map(LampCommand::Activate))
            .chain(self.preview.iter().copied().map(LampCommand::Activate))
            .collect()
    }
}
