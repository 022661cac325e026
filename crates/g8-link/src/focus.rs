use crate::channel::Outbox;
use crate::config::FocusPollConfig;
use crate::protocol::Signal;
use log::{debug, trace, warn};
use std::time::Duration;

/// The focus-capturing surface drawn by the emulation module
pub trait FocusSurface {
    fn is_focused(&self) -> bool;
}

/// Finds the surface. It is created asynchronously, so early lookups may miss.
pub trait SurfaceLocator {
    type Surface: FocusSurface;

    fn locate(&mut self) -> Option<Self::Surface>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Surface found; the caller should attach its focus/blur/click observers
    Attached,
    /// Not found yet, look again after the delay
    RetryIn(Duration),
    /// Lookup bound exhausted, the relay stays inactive
    GaveUp,
}

/// Returned by [`FocusRelay::pointer_activated`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    /// Focus the surface programmatically once the relay is no longer borrowed
    RequestFocus,
    None,
}

enum RelayState<T> {
    Searching { attempts: u32 },
    Attached(T),
    Inert,
}

/// Reports focus changes of the rendering surface to the parent context.
///
/// Emissions that would repeat the last reported state are suppressed, which
/// is what keeps a click on an unfocused surface (pointer handler, then the
/// focus event it triggers) down to a single `FocusAcquired`.
pub struct FocusRelay<L: SurfaceLocator, O: Outbox<Signal>> {
    locator: L,
    parent: O,
    poll: FocusPollConfig,
    state: RelayState<L::Surface>,
    last_emitted: Option<Signal>,
}

impl<L: SurfaceLocator, O: Outbox<Signal>> FocusRelay<L, O> {
    pub fn new(locator: L, parent: O, poll: FocusPollConfig) -> Self {
        Self {
            locator,
            parent,
            poll,
            state: RelayState::Searching { attempts: 0 },
            last_emitted: None,
        }
    }

    /// Looks for the surface once. Call again after `RetryIn`.
    pub fn poll(&mut self) -> PollOutcome {
        let attempts = match self.state {
            RelayState::Searching { attempts } => attempts,
            RelayState::Attached(_) => return PollOutcome::Attached,
            RelayState::Inert => return PollOutcome::GaveUp,
        };

        if let Some(surface) = self.locator.locate() {
            debug!("Focus surface found after {} lookup(s)", attempts + 1);
            let focused = surface.is_focused();
            self.state = RelayState::Attached(surface);
            // Focus may have landed before anyone was listening
            if focused {
                self.emit(Signal::FocusAcquired);
            }
            return PollOutcome::Attached;
        }

        let attempts = attempts + 1;
        if attempts >= self.poll.max_attempts {
            warn!("Focus surface not found after {attempts} lookups, focus relay disabled");
            self.state = RelayState::Inert;
            return PollOutcome::GaveUp;
        }
        self.state = RelayState::Searching { attempts };
        PollOutcome::RetryIn(self.poll.interval())
    }

    pub fn surface(&self) -> Option<&L::Surface> {
        match &self.state {
            RelayState::Attached(surface) => Some(surface),
            _ => None,
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.state, RelayState::Attached(_))
    }

    pub fn is_inert(&self) -> bool {
        matches!(self.state, RelayState::Inert)
    }

    pub fn focus_gained(&mut self) {
        if self.is_attached() {
            self.emit(Signal::FocusAcquired);
        }
    }

    pub fn focus_lost(&mut self) {
        if self.is_attached() {
            self.emit(Signal::FocusLost);
        }
    }

    /// Primary pointer activation on the surface. A click both focuses the
    /// surface and enables input capture.
    pub fn pointer_activated(&mut self) -> PointerAction {
        let already_focused = match &self.state {
            RelayState::Attached(surface) => surface.is_focused(),
            _ => return PointerAction::None,
        };
        self.emit(Signal::FocusAcquired);
        if already_focused {
            PointerAction::None
        } else {
            PointerAction::RequestFocus
        }
    }

    fn emit(&mut self, signal: Signal) {
        if self.last_emitted == Some(signal) {
            trace!("Suppressing repeated {}", signal.wire_name());
            return;
        }
        match self.parent.post(signal) {
            Ok(()) => self.last_emitted = Some(signal),
            Err(e) => warn!("Failed to post {}: {e}", signal.wire_name()),
        }
    }
}
