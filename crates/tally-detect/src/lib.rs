//! Tally Panel Port Detection Library
//!
//! This crate enumerates the serial ports a tally lamp panel may be attached
//! to. The panel never answers, so there is no probing: the operator picks a
//! port from the list.
//!
//! # Example
//!
//! ```rust,no_run
//! use tally_detect::PortScanner;
//!
//! let scanner = PortScanner::new();
//! let ports = scanner.enumerate_ports().unwrap();
//!
//! for port in ports {
//!     println!("Found port: {}", port.display_label());
//! }
//! ```

pub mod error;
pub mod scanner;

pub use error::DetectError;
pub use scanner::{PortKind, PortScanner, SerialPortInfo};
