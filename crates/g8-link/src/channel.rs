use crate::error::BridgeError;
use crossbeam_channel::{Receiver, Sender};
use std::rc::Rc;

/// Destination for outbound messages of one direction of the link
pub trait Outbox<M> {
    fn post(&self, message: M) -> Result<(), BridgeError>;
}

impl<M, O: Outbox<M> + ?Sized> Outbox<M> for &O {
    fn post(&self, message: M) -> Result<(), BridgeError> {
        (**self).post(message)
    }
}

impl<M, O: Outbox<M> + ?Sized> Outbox<M> for Rc<O> {
    fn post(&self, message: M) -> Result<(), BridgeError> {
        (**self).post(message)
    }
}

impl<M, O: Outbox<M> + ?Sized> Outbox<M> for Box<O> {
    fn post(&self, message: M) -> Result<(), BridgeError> {
        (**self).post(message)
    }
}

/// A message together with the identity of the context that sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<S, M> {
    pub source: S,
    pub message: M,
}

/// Identity of an in-process context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u32);

impl ContextId {
    pub const HOST: ContextId = ContextId(0);
    pub const EMBED: ContextId = ContextId(1);
}

/// Outbox over a crossbeam queue that stamps every message with the sender's identity
pub struct ChannelOutbox<S, M> {
    source: S,
    tx: Sender<Envelope<S, M>>,
}

impl<S: Clone, M> Clone for ChannelOutbox<S, M> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<S: Clone, M> ChannelOutbox<S, M> {
    pub fn new(source: S, tx: Sender<Envelope<S, M>>) -> Self {
        Self { source, tx }
    }
}

impl<S: Clone, M> Outbox<M> for ChannelOutbox<S, M> {
    fn post(&self, message: M) -> Result<(), BridgeError> {
        self.tx
            .send(Envelope {
                source: self.source.clone(),
                message,
            })
            .map_err(|_| BridgeError::ChannelClosed)
    }
}

/// Creates one direction of an in-process link, sending as `source`
pub fn link<S: Clone, M>(source: S) -> (ChannelOutbox<S, M>, Receiver<Envelope<S, M>>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (ChannelOutbox::new(source, tx), rx)
}
