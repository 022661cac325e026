use crate::channel::Envelope;
use crate::entry_points::SharedEntryPoints;
use crate::protocol::{Command, CommandKind};
use log::{debug, trace, warn};

/// What happened to one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Invoked(CommandKind),
    MissingEntryPoint(CommandKind),
    UntrustedSource,
    Unrecognized,
}

/// Receives host commands inside the sandboxed context and forwards each
/// to the matching module entry point.
///
/// Only messages from the parent context are acted upon. The bridge never
/// replies and never emits signals of its own.
pub struct EmbedBridge<S> {
    parent: S,
    entry_points: SharedEntryPoints,
}

impl<S: PartialEq> EmbedBridge<S> {
    pub fn new(parent: S, entry_points: SharedEntryPoints) -> Self {
        Self {
            parent,
            entry_points,
        }
    }

    pub fn entry_points(&self) -> SharedEntryPoints {
        self.entry_points.clone()
    }

    /// `message` is `None` when the payload did not decode to a known command.
    pub fn receive(&self, source: &S, message: Option<Command>) -> Dispatch {
        self.receive_with(source, || message)
    }

    /// Like [`EmbedBridge::receive`], but `decode` only runs for the trusted source.
    pub fn receive_with<F>(&self, source: &S, decode: F) -> Dispatch
    where
        F: FnOnce() -> Option<Command>,
    {
        if *source != self.parent {
            trace!("Dropping message from untrusted source");
            return Dispatch::UntrustedSource;
        }

        let Some(command) = decode() else {
            trace!("Dropping unrecognized message");
            return Dispatch::Unrecognized;
        };

        let kind = command.kind();
        match self.entry_points.borrow_mut().invoke(&command) {
            Ok(()) => {
                debug!("Dispatched '{kind}'");
                Dispatch::Invoked(kind)
            }
            Err(e) => {
                warn!("{e}, dropping command");
                Dispatch::MissingEntryPoint(kind)
            }
        }
    }

    pub fn receive_envelope(&self, envelope: Envelope<S, Command>) -> Dispatch {
        self.receive(&envelope.source, Some(envelope.message))
    }
}
