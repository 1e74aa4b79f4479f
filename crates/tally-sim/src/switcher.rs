//! Virtual switcher for testing
//!
//! Implements [`SwitcherStateSource`] on top of in-memory state. Changing the
//! program, preview or transition state fires the installed notifier, the
//! same way a real SDK fires its callbacks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tally_core::{
    ConnectFailure, MixerInputId, SwitcherError, SwitcherHandle, SwitcherNotification,
    SwitcherNotifier, SwitcherState, SwitcherStateSource,
};
use tracing::{debug, info};

struct Inner {
    product_name: String,
    state: SwitcherState,
    next_id: u64,
    /// Handle id of the live connection
    active: Option<u64>,
    notifier: Option<SwitcherNotifier>,
    fail_next_connect: Option<ConnectFailure>,
    mix_effect_available: bool,
    readable: bool,
    connect_count: usize,
}

/// Simulated video switcher
///
/// Clones share the same switcher, so a test can keep one clone for control
/// while the engine owns another.
#[derive(Clone)]
pub struct VirtualSwitcher {
    inner: Arc<Mutex<Inner>>,
}

impl VirtualSwitcher {
    /// Create a switcher in the idle state
    pub fn new() -> Self {
        Self::with_product_name("Virtual Switcher")
    }

    /// Create a switcher reporting the given product name
    pub fn with_product_name(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                product_name: name.into(),
                state: SwitcherState::idle(),
                next_id: 1,
                active: None,
                notifier: None,
                fail_next_connect: None,
                mix_effect_available: true,
                readable: true,
                connect_count: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current bus state
    pub fn state(&self) -> SwitcherState {
        self.lock().state
    }

    /// Put an input on program
    pub fn set_program(&self, input: MixerInputId) {
        self.update(|s| s.program_input = input);
    }

    /// Put an input on preview
    pub fn set_preview(&self, input: MixerInputId) {
        self.update(|s| s.preview_input = input);
    }

    /// Start or finish a transition
    pub fn set_preview_live(&self, live: bool) {
        self.update(|s| s.preview_is_live = live);
    }

    /// Replace the whole bus state
    pub fn set_state(&self, state: SwitcherState) {
        self.update(|s| *s = state);
    }

    fn update(&self, f: impl FnOnce(&mut SwitcherState)) {
        let notifier = {
            let mut inner = self.lock();
            f(&mut inner.state);
            debug!("Virtual switcher state: {}", inner.state.describe());
            if inner.mix_effect_available {
                inner.notifier.clone()
            } else {
                None
            }
        };
        // fire outside the lock; the receiver may call back into us
        if let Some(notifier) = notifier {
            notifier.notify(SwitcherNotification::ProgramOrPreviewChanged);
        }
    }

    /// Simulate the network dropping
    pub fn drop_connection(&self) {
        let notifier = {
            let mut inner = self.lock();
            inner.active = None;
            inner.notifier.take()
        };
        info!("Virtual switcher connection dropped");
        if let Some(notifier) = notifier {
            notifier.notify(SwitcherNotification::Disconnected);
        }
    }

    /// Make the next connect attempt fail
    pub fn fail_next_connect(&self, failure: ConnectFailure) {
        self.lock().fail_next_connect = Some(failure);
    }

    /// Whether the switcher exposes a first mix-effect block
    pub fn set_mix_effect_available(&self, available: bool) {
        self.lock().mix_effect_available = available;
    }

    /// Make state reads fail transiently
    pub fn set_readable(&self, readable: bool) {
        self.lock().readable = readable;
    }

    /// Whether a notifier is installed
    pub fn is_subscribed(&self) -> bool {
        self.lock().notifier.is_some()
    }

    /// Whether a connection is live
    pub fn is_connected(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Number of connect calls made so far
    pub fn connect_count(&self) -> usize {
        self.lock().connect_count
    }
}

impl Default for VirtualSwitcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SwitcherStateSource for VirtualSwitcher {
    fn connect(&self, address: &str) -> Result<SwitcherHandle, ConnectFailure> {
        let mut inner = self.lock();
        inner.connect_count += 1;
        if let Some(failure) = inner.fail_next_connect.take() {
            info!("Virtual switcher refusing connection to {}", address);
            return Err(failure);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.active = Some(id);
        inner.notifier = None;
        info!("Virtual switcher connected at {} (handle {})", address, id);
        Ok(SwitcherHandle::new(id, address))
    }

    fn product_name(&self, handle: &SwitcherHandle) -> Option<String> {
        let inner = self.lock();
        (inner.active == Some(handle.id())).then(|| inner.product_name.clone())
    }

    fn subscribe(
        &self,
        handle: &SwitcherHandle,
        notifier: SwitcherNotifier,
    ) -> Result<(), SwitcherError> {
        let mut inner = self.lock();
        if inner.active != Some(handle.id()) {
            return Err(SwitcherError::StaleHandle(handle.id()));
        }
        inner.notifier = Some(notifier);
        if inner.mix_effect_available {
            Ok(())
        } else {
            Err(SwitcherError::NoMixEffectBlock)
        }
    }

    fn unsubscribe(&self, handle: &SwitcherHandle) {
        let mut inner = self.lock();
        if inner.active == Some(handle.id()) {
            inner.active = None;
            inner.notifier = None;
            debug!("Virtual switcher handle {} released", handle.id());
        }
    }

    fn get_state(&self, handle: &SwitcherHandle) -> Result<SwitcherState, SwitcherError> {
        let inner = self.lock();
        if inner.active != Some(handle.id()) {
            return Err(SwitcherError::StaleHandle(handle.id()));
        }
        if !inner.mix_effect_available {
            return Err(SwitcherError::NoMixEffectBlock);
        }
        if !inner.readable {
            return Err(SwitcherError::StateUnavailable(
                "property read timed out".to_string(),
            ));
        }
        Ok(inner.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_notifier() -> (SwitcherNotifier, Arc<Mutex<Vec<SwitcherNotification>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let notifier = SwitcherNotifier::new(move |n| sink.lock().unwrap().push(n));
        (notifier, seen)
    }

    #[test]
    fn test_state_changes_notify() {
        let switcher = VirtualSwitcher::new();
        let handle = switcher.connect("10.0.0.1").unwrap();
        let (notifier, seen) = recording_notifier();
        switcher.subscribe(&handle, notifier).unwrap();

        switcher.set_program(3);
        switcher.set_preview(5);
        switcher.set_preview_live(true);

        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(
            switcher.get_state(&handle).unwrap(),
            SwitcherState::new(3, 5, true)
        );
    }

    #[test]
    fn test_drop_connection() {
        let switcher = VirtualSwitcher::new();
        let handle = switcher.connect("10.0.0.1").unwrap();
        let (notifier, seen) = recording_notifier();
        switcher.subscribe(&handle, notifier).unwrap();

        switcher.drop_connection();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![SwitcherNotification::Disconnected]
        );
        assert!(!switcher.is_connected());
        assert_eq!(
            switcher.get_state(&handle),
            Err(SwitcherError::StaleHandle(handle.id()))
        );
    }

    #[test]
    fn test_fail_next_connect() {
        let switcher = VirtualSwitcher::new();
        switcher.fail_next_connect(ConnectFailure::IncompatibleFirmware);

        assert_eq!(
            switcher.connect("10.0.0.1"),
            Err(ConnectFailure::IncompatibleFirmware)
        );
        assert!(switcher.connect("10.0.0.1").is_ok());
        assert_eq!(switcher.connect_count(), 2);
    }

    #[test]
    fn test_missing_mix_effect_keeps_disconnect_watch() {
        let switcher = VirtualSwitcher::new();
        switcher.set_mix_effect_available(false);
        let handle = switcher.connect("10.0.0.1").unwrap();
        let (notifier, seen) = recording_notifier();

        assert_eq!(
            switcher.subscribe(&handle, notifier),
            Err(SwitcherError::NoMixEffectBlock)
        );
        switcher.set_program(2);
        assert!(seen.lock().unwrap().is_empty());

        switcher.drop_connection();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SwitcherNotification::Disconnected]
        );
    }

    #[test]
    fn test_product_name_needs_live_handle() {
        let switcher = VirtualSwitcher::with_product_name("ATEM Mini");
        let handle = switcher.connect("10.0.0.1").unwrap();
        assert_eq!(switcher.product_name(&handle).as_deref(), Some("ATEM Mini"));

        switcher.unsubscribe(&handle);
        assert!(switcher.product_name(&handle).is_none());
    }
}
