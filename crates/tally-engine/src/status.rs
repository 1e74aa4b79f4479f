//! Operator-facing status messages
//!
//! Everything the controller wants an operator to see ends up as a
//! [`StatusReport`]: a line of text and whether it is an error. Reports are
//! also logged through tracing so they land in the console log.

use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// How loudly a status message should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Severity {
    /// Informational
    #[default]
    Normal,
    /// Something the operator needs to act on
    Error,
}

/// A user-visible status line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Message text
    pub message: String,
    /// Severity flag
    pub severity: Severity,
}

impl StatusReport {
    /// Informational status (also logs at info level)
    pub fn normal(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::info!(source = "Status", "{}", message);
        Self {
            message,
            severity: Severity::Normal,
        }
    }

    /// Error status (also logs at error level)
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(source = "Status", "{}", message);
        Self {
            message,
            severity: Severity::Error,
        }
    }

    /// Whether this report is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<&TallyError> for StatusReport {
    fn from(err: &TallyError) -> Self {
        StatusReport::error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity() {
        assert!(!StatusReport::normal("Connection succeeded!").is_error());
        assert!(StatusReport::error("Switcher Disconnected!!!").is_error());
    }

    #[test]
    fn test_from_error() {
        let report = StatusReport::from(&TallyError::TransportNotOpen);
        assert_eq!(report.message, "Tally not up!");
        assert_eq!(report.severity, Severity::Error);
    }
}
