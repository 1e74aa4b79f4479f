//! Serial port scanner
//!
//! This module provides serial port enumeration.

use serialport::{available_ports, SerialPortType};
use tracing::info;

use crate::error::DetectError;

/// How a serial port is attached to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// USB serial adapter
    Usb,
    /// PCI/on-board UART
    Pci,
    /// Bluetooth serial profile
    Bluetooth,
    /// Anything the OS does not classify
    Unknown,
}

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// How the port is attached
    pub kind: PortKind,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                kind: PortKind::Usb,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            other => Self {
                port: name,
                kind: match other {
                    SerialPortType::PciPort => PortKind::Pci,
                    SerialPortType::BluetoothPort => PortKind::Bluetooth,
                    _ => PortKind::Unknown,
                },
                vid: None,
                pid: None,
                manufacturer: None,
                product: None,
            },
        }
    }

    /// Label for port pickers: "ttyUSB0 (Product Name)" or just the port name
    pub fn display_label(&self) -> String {
        match &self.product {
            Some(product) => format!("{} ({})", self.port, product),
            None => self.port.clone(),
        }
    }
}

/// Serial port scanner
pub struct PortScanner {
    /// Skip ports whose name contains any of these
    skip_patterns: Vec<String>,
}

impl PortScanner {
    /// Create a scanner that hides Bluetooth and debug console ports
    pub fn new() -> Self {
        Self {
            skip_patterns: vec![
                // Bluetooth ports on macOS
                "Bluetooth".to_string(),
                // Debug/logging ports
                "debug".to_string(),
            ],
        }
    }

    /// Enumerate all available serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        info!("Enumerating serial ports...");
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let result = self.filter_ports(
            ports
                .into_iter()
                .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type)),
        );

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                info!("  {}", port.display_label());
            }
        }

        Ok(result)
    }

    /// Drop skipped ports and sort the rest by name
    fn filter_ports(&self, ports: impl Iterator<Item = SerialPortInfo>) -> Vec<SerialPortInfo> {
        let mut result: Vec<_> = ports.filter(|p| !self.should_skip_port(p)).collect();
        result.sort_by(|a, b| a.port.cmp(&b.port));
        result
    }

    /// Check if a port should be skipped
    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        self.skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}
