//! Tally controller
//!
//! The synchronous core of the engine: it owns the switcher session, the
//! channel map and the lamp driver, and turns every switcher notification
//! into one resolve+drive cycle. It never blocks and never spawns; the
//! actor feeds it completed operations and drains the events it buffers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tally_core::{
    resolve, ChannelMap, ConnectFailure, LampChannel, LampCommand, LampState, SwitcherError,
    SwitcherHandle, SwitcherNotification, SwitcherNotifier, SwitcherState, SwitcherStateSource,
};
use tracing::{debug, info, warn};

use crate::driver::{LampDriver, LinkDriver};
use crate::error::TallyError;
use crate::events::{DisconnectReason, TallyEvent};
use crate::link::{LampLink, LampLinkMeta};
use crate::status::StatusReport;

/// Baud rate of the reference lamp panel
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Tally engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyConfig {
    /// Slot to lamp assignments
    pub channel_map: ChannelMap,
    /// Baud rate used when opening a serial panel without an explicit rate
    pub baud_rate: u32,
    /// Depth of the outgoing event channel
    pub event_buffer: usize,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            channel_map: ChannelMap::default(),
            baud_rate: DEFAULT_BAUD_RATE,
            event_buffer: 256,
        }
    }
}

/// Switcher connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Point-in-time view of the controller
#[derive(Debug, Clone)]
pub struct TallySnapshot {
    pub connection: ConnectionState,
    /// Address of the connected switcher
    pub address: Option<String>,
    pub product_name: Option<String>,
    /// False when the switcher has no usable mix-effect block
    pub tally_ready: bool,
    /// Open lamp transport
    pub transport: Option<LampLinkMeta>,
    pub channel_map: ChannelMap,
    /// Last switcher state read in this session
    pub switcher_state: Option<SwitcherState>,
    /// Last resolved lamps
    pub lamps: LampState,
    pub lamp_test_active: bool,
}

struct Session {
    id: u64,
    handle: SwitcherHandle,
    product_name: Option<String>,
    tally_ready: bool,
}

/// The tally controller
pub struct TallyController<D> {
    source: Arc<dyn SwitcherStateSource>,
    driver: D,
    map: ChannelMap,
    session: Option<Session>,
    next_session_id: u64,
    last_state: Option<SwitcherState>,
    last_lamps: LampState,
    lamp_test_active: bool,
    event_buffer: Vec<TallyEvent>,
}

impl<D: LampDriver> TallyController<D> {
    /// Create a disconnected controller
    pub fn new(source: Arc<dyn SwitcherStateSource>, driver: D, channel_map: ChannelMap) -> Self {
        Self {
            source,
            driver,
            map: channel_map,
            session: None,
            next_session_id: 1,
            last_state: None,
            last_lamps: LampState::dark(),
            lamp_test_active: false,
            event_buffer: Vec::new(),
        }
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        if self.session.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Id of the current switcher session
    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Channel map in effect
    pub fn channel_map(&self) -> &ChannelMap {
        &self.map
    }

    /// Lamp driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Last resolved lamps
    pub fn lamps(&self) -> &LampState {
        &self.last_lamps
    }

    pub fn is_lamp_test_active(&self) -> bool {
        self.lamp_test_active
    }

    /// Take all buffered events
    pub fn drain_events(&mut self) -> Vec<TallyEvent> {
        std::mem::take(&mut self.event_buffer)
    }

    /// Queue a status line for observers
    pub fn report(&mut self, report: StatusReport) {
        self.event_buffer.push(TallyEvent::Status(report));
    }

    fn emit(&mut self, event: TallyEvent) {
        self.event_buffer.push(event);
    }

    /// Snapshot of everything observers may want to display
    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            connection: self.connection_state(),
            address: self
                .session
                .as_ref()
                .map(|s| s.handle.address().to_string()),
            product_name: self.session.as_ref().and_then(|s| s.product_name.clone()),
            tally_ready: self.session.as_ref().is_some_and(|s| s.tally_ready),
            transport: self.driver.meta().cloned(),
            channel_map: self.map.clone(),
            switcher_state: self.last_state,
            lamps: self.last_lamps.clone(),
            lamp_test_active: self.lamp_test_active,
        }
    }

    // -------------------------------------------------------------------------
    // Switcher session
    // -------------------------------------------------------------------------

    /// Finish a connection attempt
    ///
    /// `make_notifier` builds the notifier for the new session id. Returns
    /// the session id when a session was started.
    pub fn connect_completed<F>(
        &mut self,
        result: Result<SwitcherHandle, ConnectFailure>,
        make_notifier: F,
    ) -> Option<u64>
    where
        F: FnOnce(u64) -> SwitcherNotifier,
    {
        let handle = match result {
            Ok(handle) => handle,
            Err(failure) => {
                let err = TallyError::Connection(failure);
                self.report(StatusReport::from(&err));
                return None;
            }
        };

        if self.session.is_some() {
            warn!(
                "Connection to {} completed while already connected, releasing it",
                handle.address()
            );
            self.source.unsubscribe(&handle);
            return None;
        }

        let id = self.next_session_id;
        self.next_session_id += 1;

        let product_name = self.source.product_name(&handle);
        let tally_ready = match self.source.subscribe(&handle, make_notifier(id)) {
            Ok(()) => true,
            Err(SwitcherError::NoMixEffectBlock) => false,
            Err(e) => {
                self.source.unsubscribe(&handle);
                self.report(StatusReport::error(format!(
                    "Couldn't watch switcher: {}",
                    e
                )));
                return None;
            }
        };

        info!(
            "Switcher session {} started at {} ({})",
            id,
            handle.address(),
            product_name.as_deref().unwrap_or("unknown product")
        );
        self.emit(TallyEvent::SwitcherConnected {
            address: handle.address().to_string(),
            product_name: product_name.clone(),
        });
        self.session = Some(Session {
            id,
            handle,
            product_name,
            tally_ready,
        });

        if tally_ready {
            self.run_cycle();
            self.report(StatusReport::normal("Connection succeeded!"));
        } else {
            self.report(StatusReport::normal("Connection succeeded!"));
            let err = TallyError::from(SwitcherError::NoMixEffectBlock);
            self.report(StatusReport::from(&err));
        }

        Some(id)
    }

    /// Handle a notification posted by a session's notifier
    ///
    /// Notifications from any session other than the current one are ignored.
    pub fn on_notification(&mut self, session_id: u64, notification: SwitcherNotification) {
        if self.session_id() != Some(session_id) {
            debug!(
                "Ignoring {:?} from stale session {}",
                notification, session_id
            );
            return;
        }

        match notification {
            SwitcherNotification::ProgramOrPreviewChanged => self.run_cycle(),
            SwitcherNotification::Disconnected => {
                self.enter_disconnected(DisconnectReason::Lost)
            }
        }
    }

    /// End the session on request; returns false when not connected
    pub fn disconnect(&mut self) -> bool {
        if self.session.is_none() {
            debug!("Disconnect requested while not connected");
            return false;
        }
        self.enter_disconnected(DisconnectReason::Requested);
        true
    }

    fn enter_disconnected(&mut self, reason: DisconnectReason) {
        let Some(session) = self.session.take() else {
            return;
        };

        self.source.unsubscribe(&session.handle);
        self.last_state = None;
        self.last_lamps = LampState::dark();

        if self.driver.is_open() && !self.lamp_test_active {
            self.drive(&[LampCommand::Dark]);
        }

        info!(
            "Switcher session {} ended ({:?})",
            session.id, reason
        );
        self.emit(TallyEvent::SwitcherDisconnected { reason });
        self.report(StatusReport::error("Switcher Disconnected!!!"));
    }

    // -------------------------------------------------------------------------
    // Channel map
    // -------------------------------------------------------------------------

    /// Assign or clear one slot (1-based) and re-run the cycle
    pub fn set_slot(&mut self, slot: usize, channel: Option<LampChannel>) -> Result<(), TallyError> {
        if let Err(e) = self.map.set(slot, channel) {
            let err = TallyError::from(e);
            self.report(StatusReport::from(&err));
            return Err(err);
        }
        self.map_changed();
        Ok(())
    }

    /// Replace the whole channel map and re-run the cycle
    pub fn replace_channel_map(&mut self, map: ChannelMap) {
        self.map = map;
        self.map_changed();
    }

    fn map_changed(&mut self) {
        debug!("Channel map changed");
        self.emit(TallyEvent::ChannelMapChanged {
            map: self.map.clone(),
        });
        self.run_cycle();
    }

    // -------------------------------------------------------------------------
    // Resolve + drive
    // -------------------------------------------------------------------------

    /// Read the switcher, resolve lamps and drive them
    pub fn run_cycle(&mut self) {
        let handle = match &self.session {
            Some(session) if session.tally_ready => session.handle.clone(),
            Some(_) => {
                debug!("No mix-effect block, skipping tally cycle");
                return;
            }
            None => return,
        };

        let state = match self.source.get_state(&handle) {
            Ok(state) => state,
            Err(e) => {
                debug!("Skipping tally cycle: {}", e);
                return;
            }
        };

        let lamps = resolve(&state, &self.map);
        self.last_state = Some(state);
        self.last_lamps = lamps.clone();
        self.emit(TallyEvent::TallyResolved {
            state,
            lamps: lamps.clone(),
        });
        self.report(StatusReport::normal(state.describe()));

        if self.lamp_test_active {
            debug!("Lamp test active, not driving lamps");
            return;
        }
        if !self.driver.is_open() {
            self.report(StatusReport::normal("Tally not up, not updating"));
            return;
        }
        self.drive(&lamps.commands());
    }

    /// Send commands; a failed send closes the transport
    fn drive(&mut self, commands: &[LampCommand]) -> bool {
        match self.driver.send(commands) {
            Ok(data) => {
                self.emit(TallyEvent::LampDataOut { data });
                true
            }
            Err(e) => {
                self.transport_lost(&e.to_string());
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Lamp transport
    // -------------------------------------------------------------------------

    /// The driver has just been opened: blank the panel and catch up
    pub fn transport_opened(&mut self) {
        let Some(meta) = self.driver.meta().cloned() else {
            return;
        };

        info!("Lamp transport opened: {}", meta.label());
        self.emit(TallyEvent::TransportOpened { meta: meta.clone() });
        self.report(StatusReport::normal(format!(
            "Tally connected on {}",
            meta.label()
        )));

        if self.drive(&[LampCommand::Dark]) {
            self.run_cycle();
        }
    }

    /// A transport failed to open
    pub fn transport_open_failed(&mut self, port: &str, reason: &str) {
        warn!("Failed to open lamp transport {}: {}", port, reason);
        self.report(StatusReport::error(format!(
            "Couldn't connect. Error: {}",
            reason
        )));
    }

    /// Blank the panel and close the transport
    pub fn close_transport(&mut self) {
        if !self.driver.is_open() {
            return;
        }

        self.finish_lamp_test();
        if let Ok(data) = self.driver.send(&[LampCommand::Dark]) {
            self.emit(TallyEvent::LampDataOut { data });
        }
        self.driver.close();

        info!("Lamp transport closed");
        self.emit(TallyEvent::TransportClosed);
        self.report(StatusReport::normal("Tally disconnected"));
    }

    /// The transport died underneath us
    pub fn transport_lost(&mut self, reason: &str) {
        if !self.driver.is_open() {
            return;
        }

        self.driver.close();
        self.finish_lamp_test();

        warn!("Lamp transport lost: {}", reason);
        self.emit(TallyEvent::TransportClosed);
        self.report(StatusReport::error(format!(
            "Tally connection lost: {}",
            reason
        )));
    }

    // -------------------------------------------------------------------------
    // Lamp test
    // -------------------------------------------------------------------------

    /// Light every lamp until [`end_lamp_test`](Self::end_lamp_test)
    pub fn start_lamp_test(&mut self) -> Result<(), TallyError> {
        if !self.driver.is_open() {
            let err = TallyError::TransportNotOpen;
            self.report(StatusReport::from(&err));
            return Err(err);
        }

        let commands: Vec<_> = self.map.lamps().map(LampCommand::Activate).collect();
        self.lamp_test_active = true;
        info!("Lamp test started ({} lamps)", commands.len());
        self.emit(TallyEvent::LampTestStarted);
        self.drive(&commands);
        Ok(())
    }

    /// Blank the panel and restore live tally
    pub fn end_lamp_test(&mut self) {
        if !self.finish_lamp_test() {
            return;
        }
        if self.driver.is_open() && self.drive(&[LampCommand::Dark]) {
            self.run_cycle();
        }
    }

    fn finish_lamp_test(&mut self) -> bool {
        if !self.lamp_test_active {
            return false;
        }
        self.lamp_test_active = false;
        info!("Lamp test ended");
        self.emit(TallyEvent::LampTestEnded);
        true
    }
}

impl TallyController<LinkDriver> {
    /// Attach an opened link, replacing any open one
    pub fn attach_link(&mut self, link: LampLink) {
        self.close_transport();
        self.driver.attach(link);
        self.transport_opened();
    }

    /// Id of the attached link
    pub fn link_id(&self) -> Option<u64> {
        self.driver.link_id()
    }
}
