//! Async lamp panel connection
//!
//! Owns the I/O side of a lamp link. Generic over the writer so a serial
//! port and an in-memory pipe to a simulated panel share one code path.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, WeakUnboundedSender};
use tokio::sync::oneshot;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::actor::TallyCommand;
use crate::error::TallyError;
use crate::link::{LampLink, LampLinkMeta, LINK_BUFFER};

/// Lamp panel connection that runs in a spawned task
pub struct LampConnection<T> {
    io: T,
    link_id: u64,
    cmd_tx: WeakUnboundedSender<TallyCommand>,
}

impl<T> LampConnection<T>
where
    T: AsyncWrite + Unpin + Send,
{
    /// Create a new lamp connection
    ///
    /// # Arguments
    ///
    /// * `io` - Anything implementing AsyncWrite (SerialStream, DuplexStream, etc.)
    /// * `link_id` - Id of the [`LampLink`] feeding this connection
    /// * `cmd_tx` - Dispatch queue used to report write failures
    pub fn new(io: T, link_id: u64, cmd_tx: WeakUnboundedSender<TallyCommand>) -> Self {
        Self {
            io,
            link_id,
            cmd_tx,
        }
    }

    /// Run the write loop
    ///
    /// Returns when shutdown is received, the data channel closes, or a
    /// write fails. Data queued before shutdown is still written. A failed
    /// write is posted back as [`TallyCommand::TransportFailed`].
    pub async fn run(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
        mut data_rx: mpsc::Receiver<Vec<u8>>,
    ) {
        info!("Lamp connection {} starting", self.link_id);

        loop {
            tokio::select! {
                biased;

                data = data_rx.recv() => {
                    let Some(data) = data else { break; };
                    if !self.write(&data).await {
                        break;
                    }
                }

                _ = &mut shutdown_rx => {
                    data_rx.close();
                    while let Ok(data) = data_rx.try_recv() {
                        if !self.write(&data).await {
                            break;
                        }
                    }
                    break;
                }
            }
        }

        let _ = self.io.shutdown().await;
        info!("Lamp connection {} shutting down", self.link_id);
    }

    /// Write one cycle; false after a failure has been reported
    async fn write(&mut self, data: &[u8]) -> bool {
        debug!("Lamp connection writing {} bytes", data.len());
        let result = match self.io.write_all(data).await {
            Ok(()) => self.io.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Lamp connection {} write error: {}", self.link_id, e);
            self.report_failure(format!("Write error: {}", e));
            return false;
        }
        true
    }

    fn report_failure(&self, reason: String) {
        if let Some(tx) = self.cmd_tx.upgrade() {
            let _ = tx.send(TallyCommand::TransportFailed {
                link_id: self.link_id,
                reason,
            });
        }
    }
}

/// Spawn a connection task for `io` and return the link feeding it
pub fn spawn_lamp_connection<T>(
    io: T,
    meta: LampLinkMeta,
    cmd_tx: WeakUnboundedSender<TallyCommand>,
) -> LampLink
where
    T: AsyncWrite + Unpin + Send + 'static,
{
    let (data_tx, data_rx) = mpsc::channel(LINK_BUFFER);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let link = LampLink::new(meta, data_tx, Some(shutdown_tx));

    let conn = LampConnection::new(io, link.id(), cmd_tx);
    tokio::spawn(conn.run(shutdown_rx, data_rx));

    link
}

/// Open a serial port for a lamp panel (8N1, no flow control)
pub fn open_serial_port(port: &str, baud_rate: u32) -> Result<SerialStream, TallyError> {
    tokio_serial::new(port, baud_rate)
        .open_native_async()
        .map_err(|e| TallyError::Transport {
            port: port.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn test_connection_writes_in_order() {
        let (cmd_tx, _cmd_rx) = unbounded_channel();
        let (engine_side, mut panel_side) = tokio::io::duplex(256);

        let link =
            spawn_lamp_connection(engine_side, LampLinkMeta::new_virtual(), cmd_tx.downgrade());
        link.data_tx.send(b"<dark>\n".to_vec()).await.unwrap();
        link.data_tx.send(b"<dd01>\n".to_vec()).await.unwrap();

        let mut buf = vec![0u8; 14];
        panel_side.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, b"<dark>\n<dd01>\n");

        link.shutdown();
    }

    #[tokio::test]
    async fn test_close_writes_queued_dark_first() {
        use crate::driver::{LampDriver, LinkDriver};
        use tally_core::LampCommand;

        for _ in 0..100 {
            let (cmd_tx, _cmd_rx) = unbounded_channel();
            let (engine_side, mut panel_side) = tokio::io::duplex(256);

            let mut driver = LinkDriver::new();
            driver.attach(spawn_lamp_connection(
                engine_side,
                LampLinkMeta::new_virtual(),
                cmd_tx.downgrade(),
            ));
            driver.send(&[LampCommand::Dark]).unwrap();
            driver.close();

            let mut received = Vec::new();
            panel_side.read_to_end(&mut received).await.unwrap();
            assert_eq!(received, b"<dark>\n");
        }
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let (cmd_tx, mut cmd_rx) = unbounded_channel();
        let (engine_side, panel_side) = tokio::io::duplex(16);
        drop(panel_side);

        let link =
            spawn_lamp_connection(engine_side, LampLinkMeta::new_virtual(), cmd_tx.downgrade());
        let id = link.id();
        link.data_tx.send(b"<dark>\n".to_vec()).await.unwrap();

        match cmd_rx.recv().await.unwrap() {
            TallyCommand::TransportFailed { link_id, reason } => {
                assert_eq!(link_id, id);
                assert!(reason.starts_with("Write error"));
            }
            other => panic!("Expected TransportFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let result = open_serial_port("/dev/tally-does-not-exist", 9600);
        assert!(matches!(result, Err(TallyError::Transport { .. })));
    }
}
