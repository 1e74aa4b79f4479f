//! Tally Simulation Library
//!
//! This crate provides a simulation layer for exercising the tally engine
//! without a switcher or lamp panel on the bench. It includes:
//!
//! - **VirtualSwitcher**: a switcher whose program/preview is set in code
//! - **VirtualLampPanel**: decodes lamp commands and tracks lit lamps
//!
//! # Example
//!
//! ```rust
//! use tally_core::SwitcherStateSource;
//! use tally_sim::{VirtualLampPanel, VirtualSwitcher};
//!
//! let switcher = VirtualSwitcher::with_product_name("ATEM Television Studio");
//! let handle = switcher.connect("192.168.10.240").unwrap();
//! switcher.set_program(2);
//! assert_eq!(switcher.get_state(&handle).unwrap().program_input, 2);
//!
//! let mut panel = VirtualLampPanel::new(6);
//! panel.process_bytes(b"<dark>\n<dd01>\n");
//! assert_eq!(panel.render(), "[ ][#][ ][ ][ ][ ]");
//! ```

pub mod lamp_panel;
pub mod lamp_task;
pub mod switcher;

pub use lamp_panel::VirtualLampPanel;
pub use lamp_task::{run_virtual_lamp_task, LampPanelStateEvent};
pub use switcher::VirtualSwitcher;
