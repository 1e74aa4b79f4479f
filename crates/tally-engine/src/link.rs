//! Lamp link types
//!
//! A [`LampLink`] is the engine's end of a connection to a lamp panel: a
//! byte sender plus metadata describing where the bytes go. Real panels sit
//! behind a serial port; virtual panels are fed straight from the channel.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// Pending writes a link will queue before reporting backpressure
pub const LINK_BUFFER: usize = 64;

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Type of lamp transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LampTransportType {
    /// Real panel on a serial port
    Serial,
    /// Simulated panel
    Virtual,
}

/// Metadata for a lamp link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LampLinkMeta {
    /// Serial port name (for real panels)
    pub port_name: Option<String>,
    /// Baud rate for serial communication
    pub baud_rate: u32,
    /// Whether this is a real or virtual panel
    pub transport_type: LampTransportType,
}

impl LampLinkMeta {
    /// Metadata for a serial panel
    pub fn new_serial(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: Some(port_name.into()),
            baud_rate,
            transport_type: LampTransportType::Serial,
        }
    }

    /// Metadata for a virtual panel
    pub fn new_virtual() -> Self {
        Self {
            port_name: None,
            baud_rate: 0,
            transport_type: LampTransportType::Virtual,
        }
    }

    /// Check if this is a simulated panel
    pub fn is_simulated(&self) -> bool {
        self.transport_type == LampTransportType::Virtual
    }

    /// Short label for logs and status lines
    pub fn label(&self) -> String {
        match &self.port_name {
            Some(port) => format!("{} @ {}", port, self.baud_rate),
            None => "[VRT]".to_string(),
        }
    }
}

/// Engine side of a lamp panel connection
pub struct LampLink {
    id: u64,
    /// Metadata about this link
    pub meta: LampLinkMeta,
    /// Sender for encoded lamp commands (engine -> panel)
    pub data_tx: mpsc::Sender<Vec<u8>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl fmt::Debug for LampLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LampLink")
            .field("id", &self.id)
            .field("meta", &self.meta)
            .field("data_tx", &"<sender>")
            .finish()
    }
}

impl LampLink {
    /// Create a link with a fresh id
    ///
    /// `shutdown_tx`, when present, stops the task writing to the panel.
    pub fn new(
        meta: LampLinkMeta,
        data_tx: mpsc::Sender<Vec<u8>>,
        shutdown_tx: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            id: next_link_id(),
            meta,
            data_tx,
            shutdown_tx,
        }
    }

    /// Process-unique id of this link
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop the writer task, if any
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Reserve an id for a link that is about to be created
fn next_link_id() -> u64 {
    NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Create a virtual lamp link
///
/// Returns the link for the engine and the receiver a simulated panel reads
/// encoded commands from.
pub fn create_virtual_lamp_link(buffer_size: usize) -> (LampLink, mpsc::Receiver<Vec<u8>>) {
    let (data_tx, data_rx) = mpsc::channel(buffer_size);
    let link = LampLink::new(LampLinkMeta::new_virtual(), data_tx, None);
    (link, data_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_meta() {
        let meta = LampLinkMeta::new_serial("/dev/ttyUSB0", 9600);
        assert_eq!(meta.transport_type, LampTransportType::Serial);
        assert!(!meta.is_simulated());
        assert_eq!(meta.label(), "/dev/ttyUSB0 @ 9600");
    }

    #[test]
    fn test_virtual_meta() {
        let meta = LampLinkMeta::new_virtual();
        assert!(meta.is_simulated());
        assert!(meta.port_name.is_none());
        assert_eq!(meta.label(), "[VRT]");
    }

    #[test]
    fn test_link_ids_are_unique() {
        let (a, _rx_a) = create_virtual_lamp_link(4);
        let (b, _rx_b) = create_virtual_lamp_link(4);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_virtual_link_delivers() {
        let (link, mut rx) = create_virtual_lamp_link(4);
        link.data_tx.send(b"<dark>\n".to_vec()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"<dark>\n");
    }
}
