use crate::channel::Outbox;
use crate::config::{BridgeConfig, SpeedPreset};
use crate::protocol::{Command, CommandKind, Signal};
use log::{debug, info, trace, warn};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessState {
    #[default]
    NotReady,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    Unfocused,
    Focused,
}

/// User actions coming from the host controls. ROM loading goes through
/// [`HostController::select_file`] since it needs a file read first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Reset,
    TogglePause,
    SetSpeed(SpeedPreset),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotReady,
    TornDown,
    StaleLoad,
    EmptyBinary,
    ReadFailed,
    ChannelClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Posted(CommandKind),
    Dropped(DropReason),
}

/// State changes the host view renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostChange {
    ControlsEnabled,
    Focus(FocusState),
    Paused(bool),
    Speed(SpeedPreset),
}

/// Ties an in-flight file read to the controller session that started it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    session: u64,
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Host-side end of the link.
///
/// Commands are only posted once the embedded context reported `Ready`;
/// anything submitted earlier is dropped, never queued. Focus signals only
/// update what the view shows.
pub struct HostController<S, O: Outbox<Command>> {
    embed: S,
    outbox: O,
    readiness: ReadinessState,
    focus: FocusState,
    paused: bool,
    speed: SpeedPreset,
    // None once torn down
    session: Option<u64>,
    observer: Option<Box<dyn FnMut(HostChange)>>,
}

impl<S: PartialEq, O: Outbox<Command>> HostController<S, O> {
    /// `embed` is the identity of the one embedded context this controller trusts.
    pub fn new(embed: S, outbox: O, config: &BridgeConfig) -> Self {
        Self {
            embed,
            outbox,
            readiness: ReadinessState::NotReady,
            focus: FocusState::Unfocused,
            paused: false,
            speed: config.default_speed,
            session: Some(NEXT_SESSION.fetch_add(1, Ordering::Relaxed)),
            observer: None,
        }
    }

    pub fn with_observer<F>(mut self, f: F) -> Self
    where
        F: FnMut(HostChange) + 'static,
    {
        self.observer = Some(Box::new(f));
        self
    }

    pub fn readiness(&self) -> ReadinessState {
        self.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == ReadinessState::Ready
    }

    pub fn focus(&self) -> FocusState {
        self.focus
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn speed(&self) -> SpeedPreset {
        self.speed
    }

    pub fn is_live(&self) -> bool {
        self.session.is_some()
    }

    pub fn controls_enabled(&self) -> bool {
        self.is_live() && self.is_ready()
    }

    /// Handles one inbound message. `signal` is `None` when the payload did
    /// not decode. Returns whether any state changed.
    pub fn receive(&mut self, source: &S, signal: Option<Signal>) -> bool {
        self.receive_with(source, || signal)
    }

    /// Like [`HostController::receive`], but `decode` only runs for a live
    /// controller and the trusted source.
    pub fn receive_with<F>(&mut self, source: &S, decode: F) -> bool
    where
        F: FnOnce() -> Option<Signal>,
    {
        if !self.is_live() {
            return false;
        }
        if *source != self.embed {
            trace!("Dropping signal from untrusted source");
            return false;
        }
        let Some(signal) = decode() else {
            trace!("Dropping unrecognized signal");
            return false;
        };

        match signal {
            Signal::Ready => {
                if self.is_ready() {
                    debug!("Duplicate ready signal ignored");
                    return false;
                }
                info!("Embedded module ready, enabling controls");
                self.readiness = ReadinessState::Ready;
                self.notify(HostChange::ControlsEnabled);
                true
            }
            Signal::FocusAcquired => self.set_focus(FocusState::Focused),
            Signal::FocusLost => self.set_focus(FocusState::Unfocused),
        }
    }

    pub fn submit(&mut self, intent: Intent) -> Submission {
        if let Err(reason) = self.gate() {
            debug!("Dropping {intent:?}: {reason:?}");
            return Submission::Dropped(reason);
        }

        let command = match intent {
            Intent::Reset => Command::Reset,
            Intent::TogglePause => Command::TogglePause,
            Intent::SetSpeed(preset) => Command::SetFrequency {
                value: preset.frequency(),
            },
        };

        let submission = self.post(command);
        if let Submission::Posted(_) = submission {
            match intent {
                Intent::Reset => {}
                Intent::TogglePause => {
                    self.paused = !self.paused;
                    self.notify(HostChange::Paused(self.paused));
                }
                Intent::SetSpeed(preset) => {
                    if self.speed != preset {
                        self.speed = preset;
                        self.notify(HostChange::Speed(preset));
                    }
                }
            }
        }
        submission
    }

    /// Starts a ROM load. Returns the file back with a ticket when the read
    /// should go ahead; `None` when no file was chosen or commands are gated.
    pub fn select_file<F>(&mut self, file: Option<F>) -> Option<(F, LoadTicket)> {
        if let Err(reason) = self.gate() {
            debug!("Ignoring file selection: {reason:?}");
            return None;
        }
        let file = file?;
        let session = self.session?;
        Some((file, LoadTicket { session }))
    }

    /// Completes a read started by [`HostController::select_file`]. The
    /// command is discarded if the controller was torn down meanwhile.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: io::Result<Vec<u8>>) -> Submission {
        if self.session != Some(ticket.session) {
            warn!("Discarding ROM read that completed after teardown");
            return Submission::Dropped(DropReason::StaleLoad);
        }
        if let Err(reason) = self.gate() {
            return Submission::Dropped(reason);
        }

        let data = match result {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to read ROM: {e}");
                return Submission::Dropped(DropReason::ReadFailed);
            }
        };
        if data.is_empty() {
            warn!("Selected ROM is empty");
            return Submission::Dropped(DropReason::EmptyBinary);
        }

        info!("Loading ROM ({} bytes)", data.len());
        self.post(Command::LoadBinary { data })
    }

    /// Detaches the controller. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.session.take().is_some() {
            info!("Host controller torn down");
            self.observer = None;
        }
    }

    fn gate(&self) -> Result<(), DropReason> {
        if !self.is_live() {
            return Err(DropReason::TornDown);
        }
        if !self.is_ready() {
            return Err(DropReason::NotReady);
        }
        Ok(())
    }

    fn post(&self, command: Command) -> Submission {
        let kind = command.kind();
        match self.outbox.post(command) {
            Ok(()) => {
                debug!("Posted '{kind}'");
                Submission::Posted(kind)
            }
            Err(e) => {
                warn!("Failed to post '{kind}': {e}");
                Submission::Dropped(DropReason::ChannelClosed)
            }
        }
    }

    fn set_focus(&mut self, focus: FocusState) -> bool {
        if self.focus == focus {
            return false;
        }
        self.focus = focus;
        self.notify(HostChange::Focus(focus));
        true
    }

    fn notify(&mut self, change: HostChange) {
        if let Some(observer) = self.observer.as_mut() {
            observer(change);
        }
    }
}
