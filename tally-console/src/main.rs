//! Tally Bridge console
//!
//! Drives a serial tally lamp panel from a video switcher. Switcher state
//! comes from the built-in simulator, controlled with the `sim` commands.

mod console;
mod render;
mod settings;

use std::sync::Arc;

use tally_core::ChannelMap;
use tally_engine::{spawn_tally_actor, LampLinkMeta, TallyConfig, TallyEvent, TallyHandle};
use tally_sim::{run_virtual_lamp_task, LampPanelStateEvent, VirtualLampPanel, VirtualSwitcher};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use console::{ConsoleCommand, HELP};
use settings::Settings;

/// Buffer size of the in-memory pipe to a simulated panel
const VIRTUAL_PANEL_PIPE: usize = 1024;

struct Console {
    handle: TallyHandle,
    switcher: VirtualSwitcher,
    settings: Settings,
    /// Channel map as last reported by the engine (for rendering)
    map: ChannelMap,
    panel_tx: broadcast::Sender<LampPanelStateEvent>,
}

impl Console {
    fn save_settings(&self, previous: &Settings) {
        if let Some(e) = self.settings.auto_save_if_changed(previous) {
            warn!("{}", e);
        }
    }

    /// Run one command; returns false to quit
    async fn execute(&mut self, cmd: ConsoleCommand) -> anyhow::Result<bool> {
        match cmd {
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Status => {
                let snap = self.handle.snapshot().await?;
                for line in render::snapshot(&snap) {
                    println!("{}", line);
                }
            }
            ConsoleCommand::Ports => match self.handle.list_ports().await {
                Ok(ports) => {
                    for line in render::ports(&ports) {
                        println!("{}", line);
                    }
                }
                Err(e) => println!("! {}", e),
            },
            ConsoleCommand::Connect(address) => {
                let previous = self.settings.clone();
                self.settings.switcher_address = address.clone();
                self.save_settings(&previous);
                self.handle.connect_switcher(address)?;
            }
            ConsoleCommand::Disconnect => self.handle.disconnect_switcher()?,
            ConsoleCommand::Open { port, baud_rate } => {
                let previous = self.settings.clone();
                self.settings.lamp_port = port.clone();
                if let Some(baud) = baud_rate {
                    self.settings.baud_rate = baud;
                }
                self.save_settings(&previous);
                self.handle
                    .open_transport(port, Some(self.settings.baud_rate))?;
            }
            ConsoleCommand::OpenVirtual => self.open_virtual_panel()?,
            ConsoleCommand::Close => self.handle.close_transport()?,
            ConsoleCommand::ShowMap => {
                for line in render::channel_map(&self.map) {
                    println!("{}", line);
                }
            }
            ConsoleCommand::SetSlot { slot, lamp } => {
                if let Err(e) = self.handle.set_slot(slot, lamp).await {
                    println!("! {}", e);
                }
            }
            ConsoleCommand::StartTest => {
                self.handle.start_lamp_test()?;
                println!("  type 'end' to finish the lamp test");
            }
            ConsoleCommand::EndTest => self.handle.end_lamp_test()?,
            ConsoleCommand::SimProgram(id) => self.switcher.set_program(id),
            ConsoleCommand::SimPreview(id) => self.switcher.set_preview(id),
            ConsoleCommand::SimLive(live) => self.switcher.set_preview_live(live),
            ConsoleCommand::SimDrop => self.switcher.drop_connection(),
            ConsoleCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn open_virtual_panel(&self) -> anyhow::Result<()> {
        let (engine_side, panel_side) = tokio::io::duplex(VIRTUAL_PANEL_PIPE);
        let panel = VirtualLampPanel::new(self.map.lamp_count());
        let panel_tx = self.panel_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = run_virtual_lamp_task(panel_side, panel, panel_tx).await {
                warn!("Virtual lamp panel failed: {}", e);
            }
        });

        self.handle
            .attach_stream(engine_side, LampLinkMeta::new_virtual())?;
        Ok(())
    }

    /// Print an event and persist map edits
    fn on_event(&mut self, event: TallyEvent) {
        if event.is_traffic() {
            return;
        }
        if let TallyEvent::ChannelMapChanged { map } = &event {
            let previous = self.settings.clone();
            self.map = map.clone();
            self.settings.channel_map = map.clone();
            self.save_settings(&previous);
        }
        if let Some(line) = render::event_line(&event, &self.map) {
            println!("{}", line);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tally_bridge=info,tally_core=info,tally_detect=info,tally_engine=info,tally_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::load();
    info!(
        "Settings: {}",
        Settings::settings_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(no config directory)".to_string())
    );

    let switcher = VirtualSwitcher::new();
    let config = TallyConfig {
        channel_map: settings.channel_map.clone(),
        baud_rate: settings.baud_rate,
        ..Default::default()
    };
    let (handle, mut events, actor) = spawn_tally_actor(Arc::new(switcher.clone()), config);
    let (panel_tx, mut panel_rx) = broadcast::channel(16);

    if settings.auto_open_lamps && !settings.lamp_port.is_empty() {
        handle.open_transport(settings.lamp_port.clone(), Some(settings.baud_rate))?;
    }
    if settings.auto_connect_switcher && !settings.switcher_address.is_empty() {
        handle.connect_switcher(settings.switcher_address.clone())?;
    }

    let mut console = Console {
        handle: handle.clone(),
        switcher,
        map: settings.channel_map.clone(),
        settings,
        panel_tx,
    };

    println!("tally-bridge {} ('help' for commands)", env!("CARGO_PKG_VERSION"));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break; };
                console.on_event(event);
            }

            Ok(panel) = panel_rx.recv() => {
                println!("  panel {}", panel.rendered);
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break; };
                match ConsoleCommand::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(cmd)) => {
                        if !console.execute(cmd).await? {
                            break;
                        }
                    }
                    Err(e) => println!("! {}", e),
                }
            }
        }
    }

    handle.shutdown()?;
    actor.await?;
    Ok(())
}
