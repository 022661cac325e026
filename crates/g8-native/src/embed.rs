use crate::headless::{EmuReport, EmuState, HeadlessLocator, HeadlessModule};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use g8_link::prelude::*;
use log::{debug, info};
use std::io;
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Runs the sandboxed side on its own thread: boots the module, relays
/// focus and dispatches host commands until the host hangs up.
pub fn spawn(
    config: BridgeConfig,
    parent: ChannelOutbox<ContextId, Signal>,
    commands: Receiver<Envelope<ContextId, Command>>,
) -> io::Result<JoinHandle<EmuReport>> {
    thread::Builder::new()
        .name("embed".into())
        .spawn(move || run(config, parent, commands))
}

fn run(
    config: BridgeConfig,
    parent: ChannelOutbox<ContextId, Signal>,
    commands: Receiver<Envelope<ContextId, Command>>,
) -> EmuReport {
    let state = Rc::new(EmuState::default());
    let entry_points = EntryPoints::shared();

    let bridge = EmbedBridge::new(ContextId::HOST, entry_points.clone());
    let mut relay = FocusRelay::new(
        HeadlessLocator::new(state.clone()),
        parent.clone(),
        config.focus_poll,
    );

    let failure = state.clone();
    let mut loader = ModuleLoader::new(&config, entry_points, parent).with_failure_display(
        move |e| failure.set_failure(e.to_string()),
    );

    let module_state = state.clone();
    if let Err(e) = loader.initialize_with(|url| {
        info!("[embed] Instantiating headless module in place of {url}");
        Ok(Box::new(HeadlessModule::new(module_state)))
    }) {
        debug!("[embed] {e}");
    }

    let mut next_poll = Some(Instant::now());
    loop {
        if let Some(at) = next_poll
            && Instant::now() >= at
        {
            next_poll = match relay.poll() {
                PollOutcome::RetryIn(delay) => Some(Instant::now() + delay),
                PollOutcome::Attached | PollOutcome::GaveUp => None,
            };
            continue;
        }

        let received = match next_poll {
            Some(at) => commands.recv_deadline(at),
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(envelope) => {
                let dispatch = bridge.receive_envelope(envelope);
                debug!("[embed] {dispatch:?}");
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("[embed] Host disconnected");
    state.report()
}
