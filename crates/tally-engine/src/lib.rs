//! Tally Engine
//!
//! This crate runs the tally controller: it keeps a session with a video
//! switcher, resolves program/preview into lamp states on every change, and
//! drives a serial lamp panel.
//!
//! # Architecture
//!
//! - [`TallyController`] is the synchronous state machine. It owns the
//!   switcher session, the channel map and a [`LampDriver`], and buffers
//!   [`TallyEvent`]s for observers.
//! - [`run_tally_actor`] wraps the controller in a task draining a single
//!   dispatch queue. Switcher notifications, background completions and
//!   operator requests all go through it, so cycles never overlap.
//! - [`TallyHandle`] is the cloneable client used by frontends.
//! - [`LampConnection`] writes encoded cycles to a serial port or any other
//!   async writer.
//!
//! Everything an operator should see is emitted as
//! [`TallyEvent::Status`] with a [`StatusReport`] and logged via `tracing`.

pub mod actor;
pub mod controller;
pub mod driver;
pub mod error;
pub mod events;
pub mod lamp_task;
pub mod link;
pub mod status;

pub use actor::{run_tally_actor, spawn_tally_actor, TallyCommand, TallyHandle};
pub use controller::{
    ConnectionState, TallyConfig, TallyController, TallySnapshot, DEFAULT_BAUD_RATE,
};
pub use driver::{LampDriver, LinkDriver};
pub use error::TallyError;
pub use events::{DisconnectReason, TallyEvent};
pub use lamp_task::{open_serial_port, spawn_lamp_connection, LampConnection};
pub use link::{create_virtual_lamp_link, LampLink, LampLinkMeta, LampTransportType};
pub use status::{Severity, StatusReport};
