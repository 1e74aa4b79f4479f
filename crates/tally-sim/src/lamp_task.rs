//! Virtual lamp panel task
//!
//! Owns a [`VirtualLampPanel`] and reads the engine's output from an async
//! stream, publishing the lit lamps whenever they change.

use std::io;

use tally_core::LampChannel;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::VirtualLampPanel;

/// Panel state emitted when the lit lamps change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LampPanelStateEvent {
    /// Lit lamps, ascending
    pub lit: Vec<LampChannel>,
    /// One cell per lamp, as drawn by [`VirtualLampPanel::render`]
    pub rendered: String,
}

impl LampPanelStateEvent {
    fn from_panel(panel: &VirtualLampPanel) -> Self {
        Self {
            lit: panel.lit(),
            rendered: panel.render(),
        }
    }
}

/// Run the virtual lamp panel task
///
/// Returns the panel once the stream reaches end of file.
pub async fn run_virtual_lamp_task<S>(
    mut stream: S,
    mut panel: VirtualLampPanel,
    state_tx: broadcast::Sender<LampPanelStateEvent>,
) -> io::Result<VirtualLampPanel>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 256];
    info!("Starting virtual lamp panel ({} lamps)", panel.lamp_count());

    let _ = state_tx.send(LampPanelStateEvent::from_panel(&panel));

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            debug!("Virtual lamp panel stream closed");
            break;
        }

        debug!("Virtual lamp panel received {} bytes", n);
        if panel.process_bytes(&buf[..n]) {
            let _ = state_tx.send(LampPanelStateEvent::from_panel(&panel));
        }
    }

    info!("Virtual lamp panel stopped");
    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_task_publishes_changes() {
        let (mut engine_side, panel_side) = tokio::io::duplex(64);
        let (state_tx, mut state_rx) = broadcast::channel(8);

        let task = tokio::spawn(run_virtual_lamp_task(
            panel_side,
            VirtualLampPanel::new(6),
            state_tx,
        ));

        let initial = state_rx.recv().await.unwrap();
        assert!(initial.lit.is_empty());

        engine_side.write_all(b"<dark>\n<dd03>\n").await.unwrap();
        let event = state_rx.recv().await.unwrap();
        assert_eq!(event.lit, vec![LampChannel::new(3).unwrap()]);
        assert_eq!(event.rendered, "[ ][ ][ ][#][ ][ ]");

        drop(engine_side);
        let panel = task.await.unwrap().unwrap();
        assert_eq!(panel.received_commands().len(), 2);
    }
}
