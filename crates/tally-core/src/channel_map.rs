//! Slot to lamp channel assignment table
//!
//! Slots are one-indexed and line up with the switcher's own input numbers:
//! when the switcher reports input 3 on program, slot 3 decides which lamp
//! lights. Lamp channels are zero-indexed, matching the wire protocol.

use crate::error::ConfigError;
use crate::state::{LampChannel, MixerInputId};
use crate::{DEFAULT_LAMP_COUNT, DEFAULT_SLOT_COUNT, MAX_LAMP_COUNT};

/// User-configurable mapping from switcher slots to lamp channels
///
/// Several slots may share a lamp channel; that is deliberate and lets one
/// lamp cover multiple camera angles.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "ChannelMapRepr", into = "ChannelMapRepr")
)]
pub struct ChannelMap {
    /// Assignment per slot; index 0 is slot 1
    slots: Vec<Option<LampChannel>>,
    /// Number of lamps on the panel
    lamp_count: usize,
}

impl ChannelMap {
    /// Create a map with the default 1:1 wiring
    ///
    /// Slot *i* drives lamp *i-1* for the first `lamp_count` slots; any
    /// remaining slots start blank.
    pub fn new(slot_count: usize, lamp_count: usize) -> Result<Self, ConfigError> {
        let mut map = Self::blank(slot_count, lamp_count)?;
        map.reset_to_default();
        Ok(map)
    }

    /// Create a map with every slot blank
    pub fn blank(slot_count: usize, lamp_count: usize) -> Result<Self, ConfigError> {
        if slot_count == 0 {
            return Err(ConfigError::InvalidSlotCount(slot_count));
        }
        if lamp_count == 0 || lamp_count > MAX_LAMP_COUNT {
            return Err(ConfigError::InvalidLampCount(lamp_count));
        }
        Ok(Self {
            slots: vec![None; slot_count],
            lamp_count,
        })
    }

    /// Number of configurable slots (K)
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of physical lamps (N)
    pub fn lamp_count(&self) -> usize {
        self.lamp_count
    }

    /// Every lamp channel on the panel, ascending
    pub fn lamps(&self) -> impl Iterator<Item = LampChannel> {
        // lamp_count is capped at MAX_LAMP_COUNT so every index is addressable
        (0..self.lamp_count).filter_map(|i| LampChannel::new(i as u8))
    }

    /// Assign or clear a slot
    ///
    /// Duplicates across slots are allowed.
    pub fn set(&mut self, slot: usize, channel: Option<LampChannel>) -> Result<(), ConfigError> {
        let index = self.slot_index(slot)?;
        if let Some(c) = channel {
            if c.index() as usize >= self.lamp_count {
                return Err(ConfigError::ChannelOutOfRange {
                    channel: c.index() as usize,
                    lamp_count: self.lamp_count,
                });
            }
        }
        self.slots[index] = channel;
        Ok(())
    }

    /// Clear a slot
    pub fn clear(&mut self, slot: usize) -> Result<(), ConfigError> {
        self.set(slot, None)
    }

    /// Restore the 1:1 default wiring
    pub fn reset_to_default(&mut self) {
        let lamp_count = self.lamp_count;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            *slot = if i < lamp_count {
                LampChannel::new(i as u8)
            } else {
                None
            };
        }
    }

    /// Look up the lamp for a switcher input
    ///
    /// Returns `None` for blank slots and for any id outside `1..=slot_count`.
    pub fn resolve(&self, slot: MixerInputId) -> Option<LampChannel> {
        if slot < 1 {
            return None;
        }
        let index = usize::try_from(slot - 1).ok()?;
        self.slots.get(index).copied().flatten()
    }

    /// Slots currently assigned to a lamp
    pub fn slots_for(&self, channel: LampChannel) -> Vec<usize> {
        self.assignments()
            .filter(|(_, c)| *c == Some(channel))
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Iterate `(slot, assignment)` pairs in slot order
    pub fn assignments(&self) -> impl Iterator<Item = (usize, Option<LampChannel>)> + '_ {
        self.slots.iter().enumerate().map(|(i, c)| (i + 1, *c))
    }

    fn slot_index(&self, slot: usize) -> Result<usize, ConfigError> {
        if slot == 0 || slot > self.slots.len() {
            return Err(ConfigError::SlotOutOfRange {
                slot,
                slot_count: self.slots.len(),
            });
        }
        Ok(slot - 1)
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        let mut map = Self {
            slots: vec![None; DEFAULT_SLOT_COUNT],
            lamp_count: DEFAULT_LAMP_COUNT,
        };
        map.reset_to_default();
        map
    }
}

/// On-disk shape of a channel map, validated on load
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct ChannelMapRepr {
    lamp_count: usize,
    slots: Vec<Option<u8>>,
}

#[cfg(feature = "serde")]
impl TryFrom<ChannelMapRepr> for ChannelMap {
    type Error = ConfigError;

    fn try_from(repr: ChannelMapRepr) -> Result<Self, Self::Error> {
        let mut map = ChannelMap::blank(repr.slots.len(), repr.lamp_count)?;
        for (i, index) in repr.slots.into_iter().enumerate() {
            let channel = match index {
                Some(index) => Some(LampChannel::new(index).ok_or(
                    ConfigError::ChannelOutOfRange {
                        channel: index as usize,
                        lamp_count: map.lamp_count,
                    },
                )?),
                None => None,
            };
            map.set(i + 1, channel)?;
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl From<ChannelMap> for ChannelMapRepr {
    fn from(map: ChannelMap) -> Self {
        Self {
            lamp_count: map.lamp_count,
            slots: map.slots.iter().map(|c| c.map(|c| c.index())).collect(),
        }
    }
}
