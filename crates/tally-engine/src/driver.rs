//! Lamp driver seam
//!
//! The controller drives lamps through [`LampDriver`]. Each call to
//! [`send`](LampDriver::send) carries one full cycle of commands and must
//! reach the panel as one contiguous write, so cycles never interleave.

use tally_core::{encode_commands, LampCommand};
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::error::TallyError;
use crate::link::{LampLink, LampLinkMeta};

/// Something that can light lamps
pub trait LampDriver: Send {
    /// Whether the transport is open
    fn is_open(&self) -> bool;

    /// Metadata of the open transport
    fn meta(&self) -> Option<&LampLinkMeta>;

    /// Send one cycle of commands; returns the bytes written
    fn send(&mut self, commands: &[LampCommand]) -> Result<Vec<u8>, TallyError>;

    /// Close the transport (no-op when already closed)
    fn close(&mut self);
}

/// Driver writing to a [`LampLink`]
#[derive(Debug, Default)]
pub struct LinkDriver {
    link: Option<LampLink>,
}

impl LinkDriver {
    /// Create a closed driver
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a link, shutting down any previous one
    pub fn attach(&mut self, link: LampLink) {
        self.close();
        debug!("Lamp link {} attached ({})", link.id(), link.meta.label());
        self.link = Some(link);
    }

    /// Id of the attached link
    pub fn link_id(&self) -> Option<u64> {
        self.link.as_ref().map(LampLink::id)
    }
}

impl LampDriver for LinkDriver {
    fn is_open(&self) -> bool {
        self.link.is_some()
    }

    fn meta(&self) -> Option<&LampLinkMeta> {
        self.link.as_ref().map(|l| &l.meta)
    }

    fn send(&mut self, commands: &[LampCommand]) -> Result<Vec<u8>, TallyError> {
        let link = self.link.as_ref().ok_or(TallyError::TransportNotOpen)?;
        let data = encode_commands(commands);

        link.data_tx.try_send(data.clone()).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "write backlog full",
                TrySendError::Closed(_) => "link closed",
            };
            TallyError::Transport {
                port: link.meta.label(),
                reason: reason.to_string(),
            }
        })?;

        Ok(data)
    }

    fn close(&mut self) {
        if let Some(link) = self.link.take() {
            debug!("Lamp link {} closed", link.id());
            link.shutdown();
        }
    }
}
