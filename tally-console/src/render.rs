//! Text rendering for console output

use tally_core::{ChannelMap, LampColor, LampState};
use tally_detect::SerialPortInfo;
use tally_engine::{ConnectionState, DisconnectReason, TallyEvent, TallySnapshot};

/// One cell per lamp: `PGM`, `PVW` or `---`, numbered from 1
pub fn lamp_row(lamps: &LampState, map: &ChannelMap) -> String {
    map.lamps()
        .map(|ch| {
            let cell = match lamps.color_of(ch) {
                LampColor::Program => "PGM",
                LampColor::Preview => "PVW",
                LampColor::Off => "---",
            };
            format!("{}:{}", ch.number(), cell)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `slot N -> lamp M` lines
pub fn channel_map(map: &ChannelMap) -> Vec<String> {
    map.assignments()
        .map(|(slot, lamp)| match lamp {
            Some(ch) => format!("  slot {:>2} -> lamp {}", slot, ch.number()),
            None => format!("  slot {:>2} -> (none)", slot),
        })
        .collect()
}

pub fn ports(ports: &[SerialPortInfo]) -> Vec<String> {
    if ports.is_empty() {
        return vec!["No serial ports found".to_string()];
    }
    ports
        .iter()
        .map(|p| format!("  {}", p.display_label()))
        .collect()
}

pub fn snapshot(snap: &TallySnapshot) -> Vec<String> {
    let mut lines = Vec::new();

    match (&snap.connection, &snap.address) {
        (ConnectionState::Connected, Some(address)) => lines.push(format!(
            "switcher: {} ({}){}",
            address,
            snap.product_name.as_deref().unwrap_or("unknown"),
            if snap.tally_ready { "" } else { " [no M/E]" }
        )),
        _ => lines.push("switcher: disconnected".to_string()),
    }

    match &snap.transport {
        Some(meta) => lines.push(format!("lamps:    {}", meta.label())),
        None => lines.push("lamps:    closed".to_string()),
    }

    if let Some(state) = &snap.switcher_state {
        lines.push(format!("state:    {}", state.describe()));
    }
    lines.push(format!("tally:    {}", lamp_row(&snap.lamps, &snap.channel_map)));
    if snap.lamp_test_active {
        lines.push("lamp test running ('end' to finish)".to_string());
    }

    lines
}

/// Console line for an event, if it is worth showing
pub fn event_line(event: &TallyEvent, map: &ChannelMap) -> Option<String> {
    match event {
        TallyEvent::Status(report) if report.is_error() => Some(format!("! {}", report.message)),
        TallyEvent::Status(report) => Some(format!("  {}", report.message)),
        TallyEvent::SwitcherConnected {
            address,
            product_name,
        } => Some(format!(
            "* switcher {} ({})",
            address,
            product_name.as_deref().unwrap_or("unknown")
        )),
        TallyEvent::SwitcherDisconnected {
            reason: DisconnectReason::Requested,
        } => Some("* switcher disconnected".to_string()),
        TallyEvent::SwitcherDisconnected {
            reason: DisconnectReason::Lost,
        } => Some("* switcher lost".to_string()),
        TallyEvent::TallyResolved { lamps, .. } => Some(format!("  {}", lamp_row(lamps, map))),
        TallyEvent::ChannelMapChanged { .. } => Some("* channel map updated".to_string()),
        TallyEvent::LampTestStarted => Some("* lamp test running".to_string()),
        TallyEvent::LampTestEnded => Some("* lamp test finished".to_string()),
        TallyEvent::TransportOpened { .. }
        | TallyEvent::TransportClosed
        | TallyEvent::LampDataOut { .. } => None,
    }
}
