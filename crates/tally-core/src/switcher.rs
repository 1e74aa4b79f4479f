//! Switcher collaborator contract
//!
//! A switcher SDK binding implements [`SwitcherStateSource`]. The tally
//! engine never talks to the device directly; it connects through this
//! trait, reads state through it, and receives change notifications through
//! a [`SwitcherNotifier`] it hands over when subscribing.
//!
//! Notifications are delivered on whatever thread the SDK uses. The notifier
//! only posts them; all state handling happens on the engine's own task.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::state::SwitcherState;

/// Why a connection attempt failed
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// Nothing answered at the address
    #[error("no response from switcher")]
    NoResponse,

    /// Switcher firmware does not match the SDK
    #[error("switcher has incompatible firmware")]
    IncompatibleFirmware,

    /// Anything else
    #[error("connection failed for unknown reason")]
    Unknown,
}

impl ConnectFailure {
    /// Message shown to the operator
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoResponse => "No response from Switcher",
            Self::IncompatibleFirmware => "Switcher has incompatible firmware",
            Self::Unknown => "Connection failed for unknown reason (is it on?)",
        }
    }
}

/// Errors from an established switcher connection
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwitcherError {
    /// The switcher exposes no mix-effect block to watch
    #[error("could not get first mix effect block")]
    NoMixEffectBlock,

    /// A property read failed; usually transient
    #[error("switcher state unreadable: {0}")]
    StateUnavailable(String),

    /// The handle no longer refers to a live connection
    #[error("switcher handle {0} is no longer connected")]
    StaleHandle(u64),
}

/// Reference to a connected switcher
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwitcherHandle {
    id: u64,
    address: String,
}

impl SwitcherHandle {
    /// Create a handle (used by source implementations)
    pub fn new(id: u64, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
        }
    }

    /// Source-assigned connection id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Address that was connected to
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Change notifications a switcher delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitcherNotification {
    /// Program input, preview input or transition position changed
    ProgramOrPreviewChanged,
    /// The connection to the switcher was lost
    Disconnected,
}

/// Thread-safe callback a source uses to deliver notifications
///
/// Calling [`notify`](Self::notify) never blocks.
#[derive(Clone)]
pub struct SwitcherNotifier {
    sink: Arc<dyn Fn(SwitcherNotification) + Send + Sync>,
}

impl SwitcherNotifier {
    /// Wrap a callback
    pub fn new(sink: impl Fn(SwitcherNotification) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Deliver a notification
    pub fn notify(&self, notification: SwitcherNotification) {
        (self.sink)(notification);
    }
}

impl fmt::Debug for SwitcherNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitcherNotifier")
            .field("sink", &"<callback>")
            .finish()
    }
}

/// A video switcher as seen by the tally engine
///
/// Implementations wrap a vendor SDK. Only the first mix-effect block is
/// ever used.
pub trait SwitcherStateSource: Send + Sync {
    /// Connect to a switcher
    ///
    /// May block for several seconds; callers run it off their main task.
    fn connect(&self, address: &str) -> Result<SwitcherHandle, ConnectFailure>;

    /// Product name reported by the switcher
    fn product_name(&self, handle: &SwitcherHandle) -> Option<String>;

    /// Install change callbacks
    ///
    /// The disconnect watch must be installed even when this returns
    /// [`SwitcherError::NoMixEffectBlock`], so a half-working connection can
    /// still report its loss.
    fn subscribe(
        &self,
        handle: &SwitcherHandle,
        notifier: SwitcherNotifier,
    ) -> Result<(), SwitcherError>;

    /// Remove callbacks and release the handle
    fn unsubscribe(&self, handle: &SwitcherHandle);

    /// Read program, preview and preview-live from the first mix-effect block
    fn get_state(&self, handle: &SwitcherHandle) -> Result<SwitcherState, SwitcherError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_connect_failure_messages() {
        assert_eq!(
            ConnectFailure::NoResponse.user_message(),
            "No response from Switcher"
        );
        assert_eq!(
            ConnectFailure::Unknown.user_message(),
            "Connection failed for unknown reason (is it on?)"
        );
    }

    #[test]
    fn test_notifier_delivers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let notifier = SwitcherNotifier::new(move |n| sink.lock().unwrap().push(n));

        notifier.clone().notify(SwitcherNotification::ProgramOrPreviewChanged);
        notifier.notify(SwitcherNotification::Disconnected);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SwitcherNotification::ProgramOrPreviewChanged,
                SwitcherNotification::Disconnected
            ]
        );
    }
}
