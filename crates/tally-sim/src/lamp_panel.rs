//! Virtual lamp panel
//!
//! Decodes the `<dark>` / `<ddNN>` stream the engine writes and tracks which
//! lamps are lit, like the firmware on a real panel would.

use std::collections::{BTreeSet, VecDeque};

use tally_core::{LampChannel, LampCodec, LampCommand};
use tracing::debug;

/// Decoded commands kept for inspection; older ones are dropped
pub const COMMAND_HISTORY: usize = 64;

/// Simulated tally lamp panel
pub struct VirtualLampPanel {
    lamp_count: usize,
    lit: BTreeSet<LampChannel>,
    codec: LampCodec,
    /// Most recent commands, oldest first
    received_commands: VecDeque<LampCommand>,
}

impl VirtualLampPanel {
    /// Create a dark panel with `lamp_count` lamps
    pub fn new(lamp_count: usize) -> Self {
        Self {
            lamp_count,
            lit: BTreeSet::new(),
            codec: LampCodec::new(),
            received_commands: VecDeque::with_capacity(COMMAND_HISTORY),
        }
    }

    pub fn lamp_count(&self) -> usize {
        self.lamp_count
    }

    /// Feed raw bytes from the link
    ///
    /// Returns true if the set of lit lamps changed.
    pub fn process_bytes(&mut self, data: &[u8]) -> bool {
        self.codec.push_bytes(data);
        let before = self.lit.clone();

        while let Some(cmd) = self.codec.next_command() {
            self.apply(cmd);
        }

        self.lit != before
    }

    fn apply(&mut self, cmd: LampCommand) {
        if self.received_commands.len() == COMMAND_HISTORY {
            self.received_commands.pop_front();
        }
        self.received_commands.push_back(cmd);
        match cmd {
            LampCommand::Dark => self.lit.clear(),
            LampCommand::Activate(ch) if (ch.index() as usize) < self.lamp_count => {
                self.lit.insert(ch);
            }
            LampCommand::Activate(ch) => {
                debug!("Virtual panel has no lamp {}, ignoring", ch);
            }
        }
    }

    /// Lamps currently lit, ascending
    pub fn lit(&self) -> Vec<LampChannel> {
        self.lit.iter().copied().collect()
    }

    /// The last [`COMMAND_HISTORY`] decoded commands, oldest first
    pub fn received_commands(&self) -> Vec<LampCommand> {
        self.received_commands.iter().copied().collect()
    }

    /// One cell per lamp: `[#]` lit, `[ ]` dark
    pub fn render(&self) -> String {
        (0..self.lamp_count)
            .map(|i| {
                let lit = LampChannel::new(i as u8).is_some_and(|ch| self.lit.contains(&ch));
                if lit {
                    "[#]"
                } else {
                    "[ ]"
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(i: u8) -> LampChannel {
        LampChannel::new(i).unwrap()
    }

    #[test]
    fn test_tracks_lit_lamps() {
        let mut panel = VirtualLampPanel::new(6);

        assert!(panel.process_bytes(b"<dark>\n<dd02>\n<dd04>\n"));
        assert_eq!(panel.lit(), vec![ch(2), ch(4)]);
        assert_eq!(panel.render(), "[ ][ ][#][ ][#][ ]");

        assert!(panel.process_bytes(b"<dark>\n"));
        assert!(panel.lit().is_empty());
    }

    #[test]
    fn test_split_frames() {
        let mut panel = VirtualLampPanel::new(6);

        assert!(!panel.process_bytes(b"<dark>\n<dd0"));
        assert!(panel.process_bytes(b"1>\n"));
        assert_eq!(panel.lit(), vec![ch(1)]);
        assert_eq!(
            panel.received_commands(),
            [LampCommand::Dark, LampCommand::Activate(ch(1))]
        );
    }

    #[test]
    fn test_ignores_missing_lamps() {
        let mut panel = VirtualLampPanel::new(6);

        assert!(!panel.process_bytes(b"<dd07>\n"));
        assert!(panel.lit().is_empty());
        assert_eq!(panel.received_commands().len(), 1);
    }

    #[test]
    fn test_repeated_cycle_reports_no_change() {
        let mut panel = VirtualLampPanel::new(6);
        panel.process_bytes(b"<dark>\n<dd00>\n");

        assert!(!panel.process_bytes(b"<dark>\n<dd00>\n"));
        assert_eq!(panel.received_commands().len(), 4);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut panel = VirtualLampPanel::new(6);
        for _ in 0..COMMAND_HISTORY {
            panel.process_bytes(b"<dark>\n<dd00>\n");
        }
        panel.process_bytes(b"<dd05>\n");

        let history = panel.received_commands();
        assert_eq!(history.len(), COMMAND_HISTORY);
        assert_eq!(history.first(), Some(&LampCommand::Activate(ch(0))));
        assert_eq!(history.last(), Some(&LampCommand::Activate(ch(5))));
        assert_eq!(panel.lit(), vec![ch(0), ch(5)]);
    }
}
