//! Integration tests for the tally engine
//!
//! These tests drive the actor end to end with a virtual switcher and a
//! virtual lamp link, covering:
//! - Resolution of the reference scenarios onto the wire
//! - Switcher session lifecycle (connect, failure, loss)
//! - Lamp transport lifecycle and the lamp test
//! - Channel map edits while live

use std::sync::Arc;
use std::time::Duration;

use tally_core::{ChannelMap, ConnectFailure, LampChannel, SwitcherState};
use tally_engine::{
    create_virtual_lamp_link, spawn_tally_actor, ConnectionState, DisconnectReason, TallyConfig,
    TallyError, TallyEvent, TallyHandle,
};
use tally_sim::{VirtualLampPanel, VirtualSwitcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    pub struct Harness {
        pub switcher: VirtualSwitcher,
        pub handle: TallyHandle,
        pub events: mpsc::Receiver<TallyEvent>,
        pub lamp_rx: mpsc::Receiver<Vec<u8>>,
        task: JoinHandle<()>,
    }

    impl Harness {
        /// Actor with a virtual lamp link already attached
        pub async fn with_panel(switcher: VirtualSwitcher) -> Self {
            let mut harness = Self::without_panel(switcher);
            let (link, lamp_rx) = create_virtual_lamp_link(64);
            harness.lamp_rx = lamp_rx;
            harness.handle.attach_transport(link).unwrap();
            harness
                .wait_for(|e| matches!(e, TallyEvent::TransportOpened { .. }))
                .await;
            harness
        }

        /// Actor with no lamp transport
        pub fn without_panel(switcher: VirtualSwitcher) -> Self {
            let (handle, events, task) =
                spawn_tally_actor(Arc::new(switcher.clone()), TallyConfig::default());
            let (_unused_tx, lamp_rx) = mpsc::channel(1);
            Self {
                switcher,
                handle,
                events,
                lamp_rx,
                task,
            }
        }

        /// Collect events up to and including the first that matches
        pub async fn wait_for(&mut self, pred: impl Fn(&TallyEvent) -> bool) -> Vec<TallyEvent> {
            let mut seen = Vec::new();
            loop {
                let event = tokio::time::timeout(TIMEOUT, self.events.recv())
                    .await
                    .expect("timed out waiting for event")
                    .expect("event stream closed");
                let done = pred(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
        }

        /// Collect events up to and including a status line
        pub async fn wait_for_status(&mut self, message: &str) -> Vec<TallyEvent> {
            self.wait_for(|e| e.status().is_some_and(|s| s.message == message))
                .await
        }

        pub async fn connect(&mut self) -> Vec<TallyEvent> {
            self.handle.connect_switcher("192.168.10.240").unwrap();
            self.wait_for_status("Connection succeeded!").await
        }

        /// Everything written to the lamp link so far
        pub fn wire(&mut self) -> String {
            let mut out = String::new();
            while let Ok(data) = self.lamp_rx.try_recv() {
                out.push_str(&String::from_utf8_lossy(&data));
            }
            out
        }

        pub async fn shutdown(self) {
            self.handle.shutdown().unwrap();
            self.task.await.unwrap();
        }
    }

    pub fn ch(i: u8) -> LampChannel {
        LampChannel::new(i).unwrap()
    }

    pub fn statuses(events: &[TallyEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| e.status().map(|s| s.message.clone()))
            .collect()
    }
}

use helpers::*;

// ============================================================================
// Reference Scenarios
// ============================================================================

#[tokio::test]
async fn test_scenario_program_and_live_preview() {
    let switcher = VirtualSwitcher::new();
    switcher.set_state(SwitcherState::new(3, 5, true));
    let mut h = Harness::with_panel(switcher).await;
    assert_eq!(h.wire(), "<dark>\n");

    let events = h.connect().await;

    assert_eq!(h.wire(), "<dark>\n<dd02>\n<dd04>\n");
    let lamps = events
        .iter()
        .find_map(|e| match e {
            TallyEvent::TallyResolved { lamps, .. } => Some(lamps.clone()),
            _ => None,
        })
        .unwrap();
    assert!(lamps.program().contains(&ch(2)));
    assert!(lamps.preview().contains(&ch(4)));

    h.shutdown().await;
}

#[tokio::test]
async fn test_scenario_same_input_on_both_buses() {
    let switcher = VirtualSwitcher::new();
    switcher.set_state(SwitcherState::new(1, 1, true));
    let mut h = Harness::with_panel(switcher).await;
    h.wire();

    h.connect().await;

    assert_eq!(h.wire(), "<dark>\n<dd00>\n");
    h.shutdown().await;
}

#[tokio::test]
async fn test_scenario_idle_switcher() {
    let mut h = Harness::with_panel(VirtualSwitcher::new()).await;
    h.wire();

    let events = h.connect().await;

    assert_eq!(h.wire(), "<dark>\n");
    assert!(statuses(&events).contains(&"Prog: 0 Prev: Not in transition".to_string()));
    h.shutdown().await;
}

#[tokio::test]
async fn test_live_changes_drive_panel() {
    let mut h = Harness::with_panel(VirtualSwitcher::new()).await;
    h.connect().await;
    h.wire();

    h.switcher.set_program(4);
    h.wait_for_status("Prog: 4 Prev: Not in transition").await;
    h.switcher.set_preview(2);
    h.switcher.set_preview_live(true);
    h.wait_for_status("Prog: 4 Prev: 2").await;

    let mut panel = VirtualLampPanel::new(6);
    panel.process_bytes(h.wire().as_bytes());
    assert_eq!(panel.lit(), vec![ch(1), ch(3)]);

    h.shutdown().await;
}

// ============================================================================
// Switcher Session
// ============================================================================

#[tokio::test]
async fn test_switcher_loss_transitions_once() {
    let mut h = Harness::with_panel(VirtualSwitcher::new()).await;
    h.switcher.set_program(2);
    h.connect().await;
    h.wire();

    h.switcher.drop_connection();
    let events = h.wait_for_status("Switcher Disconnected!!!").await;

    let disconnects: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TallyEvent::SwitcherDisconnected { reason } => Some(*reason),
            _ => None,
        })
        .collect();
    assert_eq!(disconnects, vec![DisconnectReason::Lost]);
    assert_eq!(h.wire(), "<dark>\n");

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.connection, ConnectionState::Disconnected);
    assert!(snapshot.address.is_none());
    assert!(snapshot.switcher_state.is_none());

    // a second drop after the session is gone changes nothing
    h.switcher.drop_connection();
    h.handle.disconnect_switcher().unwrap();
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.connection, ConnectionState::Disconnected);
    assert!(h.events.try_recv().is_err());

    h.shutdown().await;
}

#[tokio::test]
async fn test_connect_failure_reports_reason() {
    let switcher = VirtualSwitcher::new();
    switcher.fail_next_connect(ConnectFailure::IncompatibleFirmware);
    let mut h = Harness::without_panel(switcher);

    h.handle.connect_switcher("192.168.10.240").unwrap();
    let events = h.wait_for_status("Switcher has incompatible firmware").await;
    assert!(events.last().and_then(TallyEvent::status).unwrap().is_error());
    assert_eq!(
        h.handle.snapshot().await.unwrap().connection,
        ConnectionState::Disconnected
    );

    // retrying works
    h.connect().await;
    assert_eq!(
        h.handle.snapshot().await.unwrap().connection,
        ConnectionState::Connected
    );

    h.shutdown().await;
}

#[tokio::test]
async fn test_product_name_in_snapshot() {
    let mut h = Harness::without_panel(VirtualSwitcher::with_product_name("ATEM 1 M/E"));

    let events = h.connect().await;

    assert!(events.iter().any(|e| matches!(
        e,
        TallyEvent::SwitcherConnected { product_name: Some(name), .. } if name == "ATEM 1 M/E"
    )));
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.product_name.as_deref(), Some("ATEM 1 M/E"));
    assert_eq!(snapshot.address.as_deref(), Some("192.168.10.240"));

    h.shutdown().await;
}

#[tokio::test]
async fn test_missing_mix_effect_block() {
    let switcher = VirtualSwitcher::new();
    switcher.set_mix_effect_available(false);
    let mut h = Harness::with_panel(switcher).await;
    h.wire();

    h.handle.connect_switcher("192.168.10.240").unwrap();
    let events = h
        .wait_for_status("Unexpected: Could not get first mix effect block")
        .await;
    assert!(events.last().and_then(TallyEvent::status).unwrap().is_error());

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.connection, ConnectionState::Connected);
    assert!(!snapshot.tally_ready);
    assert_eq!(h.wire(), "");

    // the disconnect watch still works
    h.switcher.drop_connection();
    h.wait_for_status("Switcher Disconnected!!!").await;

    h.shutdown().await;
}

// ============================================================================
// Lamp Transport
// ============================================================================

#[tokio::test]
async fn test_resolves_without_transport() {
    let switcher = VirtualSwitcher::new();
    switcher.set_state(SwitcherState::new(3, 5, true));
    let mut h = Harness::without_panel(switcher);

    let events = h.connect().await;

    assert!(statuses(&events).contains(&"Tally not up, not updating".to_string()));
    assert!(!events.iter().any(TallyEvent::is_traffic));
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.lamps.program().len(), 1);

    h.shutdown().await;
}

#[tokio::test]
async fn test_attach_after_connect_catches_up() {
    let switcher = VirtualSwitcher::new();
    switcher.set_state(SwitcherState::new(2, -1, false));
    let mut h = Harness::without_panel(switcher);
    h.connect().await;

    let (link, lamp_rx) = create_virtual_lamp_link(64);
    h.lamp_rx = lamp_rx;
    h.handle.attach_transport(link).unwrap();
    h.wait_for(|e| matches!(e, TallyEvent::LampDataOut { data } if data.len() > 7))
        .await;

    assert_eq!(h.wire(), "<dark>\n<dark>\n<dd01>\n");
    h.shutdown().await;
}

#[tokio::test]
async fn test_serial_open_failure_reported() {
    let mut h = Harness::without_panel(VirtualSwitcher::new());

    h.handle
        .open_transport("/dev/tally-does-not-exist", None)
        .unwrap();
    let events = h
        .wait_for(|e| {
            e.status()
                .is_some_and(|s| s.message.starts_with("Couldn't connect. Error:"))
        })
        .await;

    assert!(events.last().and_then(TallyEvent::status).unwrap().is_error());
    assert!(h.handle.snapshot().await.unwrap().transport.is_none());
    h.shutdown().await;
}

#[tokio::test]
async fn test_lost_link_leaves_switcher_connected() {
    let mut h = Harness::with_panel(VirtualSwitcher::new()).await;
    h.connect().await;

    let (_tx, empty) = mpsc::channel(1);
    drop(std::mem::replace(&mut h.lamp_rx, empty));
    h.switcher.set_program(1);
    h.wait_for(|e| matches!(e, TallyEvent::TransportClosed)).await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert!(snapshot.transport.is_none());
    assert_eq!(snapshot.connection, ConnectionState::Connected);
    h.shutdown().await;
}

#[tokio::test]
async fn test_close_transport_blanks_panel() {
    let mut h = Harness::with_panel(VirtualSwitcher::new()).await;
    h.switcher.set_program(1);
    h.connect().await;
    h.wire();

    h.handle.close_transport().unwrap();
    h.wait_for(|e| matches!(e, TallyEvent::TransportClosed)).await;

    assert_eq!(h.wire(), "<dark>\n");
    h.shutdown().await;
}

// ============================================================================
// Lamp Test
// ============================================================================

#[tokio::test]
async fn test_lamp_test_round_trip() {
    let switcher = VirtualSwitcher::new();
    switcher.set_state(SwitcherState::new(3, -1, false));
    let mut h = Harness::with_panel(switcher).await;
    h.connect().await;
    h.wire();

    h.handle.start_lamp_test().unwrap();
    h.wait_for(|e| matches!(e, TallyEvent::LampTestStarted)).await;
    h.handle.snapshot().await.unwrap();

    let mut panel = VirtualLampPanel::new(6);
    panel.process_bytes(h.wire().as_bytes());
    assert_eq!(panel.lit().len(), 6);

    // switcher activity during the test leaves the lamps alone
    h.switcher.set_program(5);
    h.wait_for_status("Prog: 5 Prev: Not in transition").await;
    assert_eq!(h.wire(), "");

    h.handle.end_lamp_test().unwrap();
    h.wait_for(|e| matches!(e, TallyEvent::LampTestEnded)).await;
    h.wait_for_status("Prog: 5 Prev: Not in transition").await;

    assert_eq!(h.wire(), "<dark>\n<dark>\n<dd04>\n");
    h.shutdown().await;
}

#[tokio::test]
async fn test_lamp_test_without_transport() {
    let mut h = Harness::without_panel(VirtualSwitcher::new());

    h.handle.start_lamp_test().unwrap();
    let events = h.wait_for_status("Tally not up!").await;

    assert!(events.last().and_then(TallyEvent::status).unwrap().is_error());
    assert!(!h.handle.snapshot().await.unwrap().lamp_test_active);
    h.shutdown().await;
}

// ============================================================================
// Channel Map
// ============================================================================

#[tokio::test]
async fn test_slot_edit_redrives() {
    let switcher = VirtualSwitcher::new();
    switcher.set_state(SwitcherState::new(8, -1, false));
    let mut h = Harness::with_panel(switcher).await;
    h.connect().await;
    assert_eq!(h.wire(), "<dark>\n<dark>\n");

    h.handle.set_slot(8, Some(ch(5))).await.unwrap();
    h.wait_for(|e| matches!(e, TallyEvent::LampDataOut { .. }))
        .await;

    assert_eq!(h.wire(), "<dark>\n<dd05>\n");
    h.shutdown().await;
}

#[tokio::test]
async fn test_invalid_slot_edit_rejected() {
    let mut h = Harness::without_panel(VirtualSwitcher::new());

    let result = h.handle.set_slot(0, Some(ch(1))).await;
    assert!(matches!(result, Err(TallyError::Config(_))));
    let result = h.handle.set_slot(2, Some(ch(6))).await;
    assert!(matches!(result, Err(TallyError::Config(_))));

    assert_eq!(
        h.handle.snapshot().await.unwrap().channel_map,
        ChannelMap::default()
    );
    h.shutdown().await;
}

#[tokio::test]
async fn test_replace_map_shared_lamp() {
    let switcher = VirtualSwitcher::new();
    switcher.set_state(SwitcherState::new(2, 7, true));
    let mut h = Harness::with_panel(switcher).await;
    h.connect().await;
    h.wire();

    let mut map = ChannelMap::default();
    map.set(7, Some(ch(1))).unwrap();
    h.handle.set_channel_map(map.clone()).unwrap();
    let events = h
        .wait_for(|e| matches!(e, TallyEvent::LampDataOut { .. }))
        .await;

    assert!(events
        .iter()
        .any(|e| matches!(e, TallyEvent::ChannelMapChanged { map: m } if *m == map)));
    // slots 2 and 7 share lamp 1; program wins
    assert_eq!(h.wire(), "<dark>\n<dd01>\n");
    h.shutdown().await;
}
