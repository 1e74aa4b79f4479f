//! Tally Actor
//!
//! All controller state lives in one task that drains a single dispatch
//! queue. Switcher notifications (posted from whatever thread the switcher
//! SDK uses), finished background operations and operator requests all
//! arrive as [`TallyCommand`]s and are handled one at a time, so resolve and
//! drive cycles never overlap.
//!
//! Slow work never runs on the queue: connecting to a switcher runs on the
//! blocking pool, and so does opening a serial port. Both post a
//! completion tagged with an attempt number, and a completion whose attempt
//! has since been superseded is discarded.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally_engine::{spawn_tally_actor, TallyConfig};
//! use tally_sim::VirtualSwitcher;
//!
//! let switcher = VirtualSwitcher::new();
//! let (handle, mut events, _task) = spawn_tally_actor(Arc::new(switcher), TallyConfig::default());
//!
//! handle.connect_switcher("192.168.10.240")?;
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

use std::sync::Arc;

use tally_core::{
    ChannelMap, ConnectFailure, LampChannel, SwitcherHandle, SwitcherNotification,
    SwitcherNotifier, SwitcherStateSource,
};
use tally_detect::{PortScanner, SerialPortInfo};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::controller::{TallyConfig, TallyController, TallySnapshot};
use crate::driver::LinkDriver;
use crate::error::TallyError;
use crate::events::TallyEvent;
use crate::lamp_task::{open_serial_port, spawn_lamp_connection};
use crate::link::{LampLink, LampLinkMeta};
use crate::status::StatusReport;

/// Commands sent to the tally actor
#[derive(Debug)]
pub enum TallyCommand {
    /// Start connecting to a switcher
    ConnectSwitcher {
        /// Switcher address (IP or hostname)
        address: String,
    },

    /// A connection attempt finished (posted by the blocking connect task)
    SwitcherConnectCompleted {
        /// Attempt number the result belongs to
        attempt: u64,
        /// Address that was dialled
        address: String,
        /// Outcome
        result: Result<SwitcherHandle, ConnectFailure>,
    },

    /// Notification from the switcher (posted by a session's notifier)
    SwitcherNotification {
        /// Session that installed the notifier
        session: u64,
        /// What happened
        notification: SwitcherNotification,
    },

    /// End the switcher session, or abandon a pending connect
    DisconnectSwitcher,

    /// Open a serial lamp panel
    OpenTransport {
        /// Serial port name
        port: String,
        /// Baud rate; the configured default when None
        baud_rate: Option<u32>,
    },

    /// A serial open finished (posted by the open task)
    TransportOpenCompleted {
        /// Attempt number the result belongs to
        attempt: u64,
        /// Port that was opened
        port: String,
        /// Outcome
        result: Result<LampLink, String>,
    },

    /// Attach an already connected link (virtual panels, tests)
    AttachTransport {
        /// The link
        link: LampLink,
    },

    /// A link's writer failed
    TransportFailed {
        /// Id of the failed link
        link_id: u64,
        /// Error text
        reason: String,
    },

    /// Blank and close the lamp panel
    CloseTransport,

    /// Assign or clear one slot
    SetSlot {
        /// Slot (1-based)
        slot: usize,
        /// Lamp to drive, or None to blank the slot
        channel: Option<LampChannel>,
        /// Channel to send back the outcome
        response: Option<oneshot::Sender<Result<(), TallyError>>>,
    },

    /// Replace the whole channel map
    SetChannelMap {
        /// The new map
        map: ChannelMap,
    },

    /// Query the controller state
    QuerySnapshot {
        /// Channel to send back the snapshot
        response: oneshot::Sender<TallySnapshot>,
    },

    /// Light every lamp
    StartLampTest,

    /// Finish the lamp test and restore live tally
    EndLampTest,

    /// Shutdown the actor
    Shutdown,
}

/// Internal state for the tally actor
struct TallyActorState {
    controller: TallyController<LinkDriver>,
    source: Arc<dyn SwitcherStateSource>,
    cmd_tx: WeakUnboundedSender<TallyCommand>,
    default_baud_rate: u32,
    /// Last connect attempt issued
    connect_attempt: u64,
    /// Attempt currently in flight
    pending_connect: Option<u64>,
    /// Last transport open issued; bumped by anything that supersedes it
    open_attempt: u64,
}

/// Notifier that posts a session's notifications into the dispatch queue
fn session_notifier(cmd_tx: WeakUnboundedSender<TallyCommand>, session: u64) -> SwitcherNotifier {
    SwitcherNotifier::new(move |notification| {
        if let Some(tx) = cmd_tx.upgrade() {
            let _ = tx.send(TallyCommand::SwitcherNotification {
                session,
                notification,
            });
        }
    })
}

impl TallyActorState {
    fn connect_switcher(&mut self, address: String) {
        if let Some(current) = self.controller.snapshot().address {
            self.controller.report(StatusReport::normal(format!(
                "Already connected to {}",
                current
            )));
            return;
        }
        if self.pending_connect.is_some() {
            self.controller
                .report(StatusReport::normal("Connection already in progress"));
            return;
        }

        self.connect_attempt += 1;
        let attempt = self.connect_attempt;
        self.pending_connect = Some(attempt);
        info!("Connecting to switcher at {} (attempt {})", address, attempt);
        self.controller
            .report(StatusReport::normal(format!("Connecting to {}...", address)));

        let source = self.source.clone();
        let cmd_tx = self.cmd_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = source.connect(&address);
            match cmd_tx.upgrade() {
                Some(tx) => {
                    let _ = tx.send(TallyCommand::SwitcherConnectCompleted {
                        attempt,
                        address,
                        result,
                    });
                }
                // nobody left to hand the session to
                None => {
                    if let Ok(handle) = result {
                        source.unsubscribe(&handle);
                    }
                }
            }
        });
    }

    fn connect_completed(
        &mut self,
        attempt: u64,
        address: String,
        result: Result<SwitcherHandle, ConnectFailure>,
    ) {
        if self.pending_connect != Some(attempt) {
            warn!("Discarding stale connect result for {}", address);
            if let Ok(handle) = result {
                self.source.unsubscribe(&handle);
            }
            return;
        }
        self.pending_connect = None;

        let cmd_tx = self.cmd_tx.clone();
        self.controller
            .connect_completed(result, move |session| session_notifier(cmd_tx, session));
    }

    fn open_transport(&mut self, port: String, baud_rate: Option<u32>) {
        self.open_attempt += 1;
        let attempt = self.open_attempt;
        let baud_rate = baud_rate.unwrap_or(self.default_baud_rate);
        info!("Opening lamp panel on {} at {} baud", port, baud_rate);

        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let blocking_port = port.clone();
            let opened =
                tokio::task::spawn_blocking(move || open_serial_port(&blocking_port, baud_rate))
                    .await
                    .unwrap_or_else(|e| {
                        Err(TallyError::Transport {
                            port: port.clone(),
                            reason: e.to_string(),
                        })
                    });

            let result = match opened {
                Ok(stream) => Ok(spawn_lamp_connection(
                    stream,
                    LampLinkMeta::new_serial(port.clone(), baud_rate),
                    cmd_tx.clone(),
                )),
                Err(TallyError::Transport { reason, .. }) => Err(reason),
                Err(e) => Err(e.to_string()),
            };
            if let Some(tx) = cmd_tx.upgrade() {
                let _ = tx.send(TallyCommand::TransportOpenCompleted {
                    attempt,
                    port,
                    result,
                });
            }
        });
    }

    fn open_completed(&mut self, attempt: u64, port: String, result: Result<LampLink, String>) {
        if attempt != self.open_attempt {
            warn!("Discarding stale open result for {}", port);
            if let Ok(link) = result {
                link.shutdown();
            }
            return;
        }

        match result {
            Ok(link) => self.controller.attach_link(link),
            Err(reason) => self.controller.transport_open_failed(&port, &reason),
        }
    }
}

/// Flush buffered controller events to observers
async fn flush_events(state: &mut TallyActorState, event_tx: &mpsc::Sender<TallyEvent>) {
    for event in state.controller.drain_events() {
        let _ = event_tx.send(event).await;
    }
}

/// Run the tally actor
///
/// Processes commands until [`TallyCommand::Shutdown`] arrives or every
/// sender is gone. `cmd_tx` must be a handle to the queue `cmd_rx` drains;
/// background tasks use it to post their completions.
pub async fn run_tally_actor(
    source: Arc<dyn SwitcherStateSource>,
    config: TallyConfig,
    cmd_tx: WeakUnboundedSender<TallyCommand>,
    mut cmd_rx: UnboundedReceiver<TallyCommand>,
    event_tx: mpsc::Sender<TallyEvent>,
) {
    let mut state = TallyActorState {
        controller: TallyController::new(source.clone(), LinkDriver::new(), config.channel_map),
        source,
        cmd_tx,
        default_baud_rate: config.baud_rate,
        connect_attempt: 0,
        pending_connect: None,
        open_attempt: 0,
    };
    info!("Tally actor started");

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            TallyCommand::ConnectSwitcher { address } => {
                state.connect_switcher(address);
            }

            TallyCommand::SwitcherConnectCompleted {
                attempt,
                address,
                result,
            } => {
                state.connect_completed(attempt, address, result);
            }

            TallyCommand::SwitcherNotification {
                session,
                notification,
            } => {
                state.controller.on_notification(session, notification);
            }

            TallyCommand::DisconnectSwitcher => {
                if state.pending_connect.take().is_some() {
                    state
                        .controller
                        .report(StatusReport::normal("Connection attempt abandoned"));
                }
                state.controller.disconnect();
            }

            TallyCommand::OpenTransport { port, baud_rate } => {
                state.open_transport(port, baud_rate);
            }

            TallyCommand::TransportOpenCompleted {
                attempt,
                port,
                result,
            } => {
                state.open_completed(attempt, port, result);
            }

            TallyCommand::AttachTransport { link } => {
                state.open_attempt += 1;
                state.controller.attach_link(link);
            }

            TallyCommand::TransportFailed { link_id, reason } => {
                if state.controller.link_id() == Some(link_id) {
                    state.controller.transport_lost(&reason);
                } else {
                    debug!("Ignoring failure of detached link {}", link_id);
                }
            }

            TallyCommand::CloseTransport => {
                state.open_attempt += 1;
                state.controller.close_transport();
            }

            TallyCommand::SetSlot {
                slot,
                channel,
                response,
            } => {
                let result = state.controller.set_slot(slot, channel);
                if let Some(response) = response {
                    let _ = response.send(result);
                }
            }

            TallyCommand::SetChannelMap { map } => {
                state.controller.replace_channel_map(map);
            }

            TallyCommand::QuerySnapshot { response } => {
                let _ = response.send(state.controller.snapshot());
            }

            TallyCommand::StartLampTest => {
                let _ = state.controller.start_lamp_test();
            }

            TallyCommand::EndLampTest => {
                state.controller.end_lamp_test();
            }

            TallyCommand::Shutdown => {
                state.pending_connect = None;
                state.controller.disconnect();
                state.controller.close_transport();
                flush_events(&mut state, &event_tx).await;
                break;
            }
        }

        flush_events(&mut state, &event_tx).await;
    }

    info!("Tally actor stopped");
}

/// Client handle for a running tally actor
#[derive(Debug, Clone)]
pub struct TallyHandle {
    cmd_tx: UnboundedSender<TallyCommand>,
}

impl TallyHandle {
    /// Wrap the sending side of the dispatch queue
    pub fn new(cmd_tx: UnboundedSender<TallyCommand>) -> Self {
        Self { cmd_tx }
    }

    fn send(&self, cmd: TallyCommand) -> Result<(), TallyError> {
        self.cmd_tx.send(cmd).map_err(|_| TallyError::ActorStopped)
    }

    /// Start connecting to a switcher
    pub fn connect_switcher(&self, address: impl Into<String>) -> Result<(), TallyError> {
        self.send(TallyCommand::ConnectSwitcher {
            address: address.into(),
        })
    }

    /// End the switcher session
    pub fn disconnect_switcher(&self) -> Result<(), TallyError> {
        self.send(TallyCommand::DisconnectSwitcher)
    }

    /// Open a serial lamp panel
    pub fn open_transport(
        &self,
        port: impl Into<String>,
        baud_rate: Option<u32>,
    ) -> Result<(), TallyError> {
        self.send(TallyCommand::OpenTransport {
            port: port.into(),
            baud_rate,
        })
    }

    /// Attach a link created elsewhere
    pub fn attach_transport(&self, link: LampLink) -> Result<(), TallyError> {
        self.send(TallyCommand::AttachTransport { link })
    }

    /// Drive a lamp panel behind any async writer
    ///
    /// Used for simulated panels reached through an in-memory pipe.
    pub fn attach_stream<T>(&self, io: T, meta: LampLinkMeta) -> Result<(), TallyError>
    where
        T: AsyncWrite + Unpin + Send + 'static,
    {
        let link = spawn_lamp_connection(io, meta, self.cmd_tx.downgrade());
        self.attach_transport(link)
    }

    /// Blank and close the lamp panel
    pub fn close_transport(&self) -> Result<(), TallyError> {
        self.send(TallyCommand::CloseTransport)
    }

    /// Assign or clear one slot (1-based)
    pub async fn set_slot(
        &self,
        slot: usize,
        channel: Option<LampChannel>,
    ) -> Result<(), TallyError> {
        let (tx, rx) = oneshot::channel();
        self.send(TallyCommand::SetSlot {
            slot,
            channel,
            response: Some(tx),
        })?;
        rx.await.map_err(|_| TallyError::ActorStopped)?
    }

    /// Replace the whole channel map
    pub fn set_channel_map(&self, map: ChannelMap) -> Result<(), TallyError> {
        self.send(TallyCommand::SetChannelMap { map })
    }

    /// Query the controller state
    pub async fn snapshot(&self) -> Result<TallySnapshot, TallyError> {
        let (tx, rx) = oneshot::channel();
        self.send(TallyCommand::QuerySnapshot { response: tx })?;
        rx.await.map_err(|_| TallyError::ActorStopped)
    }

    /// Light every lamp
    pub fn start_lamp_test(&self) -> Result<(), TallyError> {
        self.send(TallyCommand::StartLampTest)
    }

    /// Finish the lamp test
    pub fn end_lamp_test(&self) -> Result<(), TallyError> {
        self.send(TallyCommand::EndLampTest)
    }

    /// Enumerate serial ports a lamp panel could be on
    pub async fn list_ports(&self) -> Result<Vec<SerialPortInfo>, TallyError> {
        let ports = tokio::task::spawn_blocking(|| PortScanner::new().enumerate_ports())
            .await
            .map_err(|e| TallyError::IoError(std::io::Error::other(e)))??;
        Ok(ports)
    }

    /// Ask the actor to stop
    pub fn shutdown(&self) -> Result<(), TallyError> {
        self.send(TallyCommand::Shutdown)
    }
}

/// Spawn the tally actor on the current runtime
///
/// Returns the client handle, the event stream and the actor task.
pub fn spawn_tally_actor(
    source: Arc<dyn SwitcherStateSource>,
    config: TallyConfig,
) -> (TallyHandle, mpsc::Receiver<TallyEvent>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));

    let weak = cmd_tx.downgrade();
    let task = tokio::spawn(run_tally_actor(source, config, weak, cmd_rx, event_tx));
    (TallyHandle::new(cmd_tx), event_rx, task)
}
