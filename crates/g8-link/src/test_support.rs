use crate::channel::Outbox;
use crate::error::BridgeError;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Outbox that keeps everything posted to it
pub struct Recorder<M> {
    posted: Rc<RefCell<Vec<M>>>,
    closed: Rc<Cell<bool>>,
}

impl<M> Clone for Recorder<M> {
    fn clone(&self) -> Self {
        Self {
            posted: self.posted.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<M: Clone> Recorder<M> {
    pub fn new() -> Self {
        Self {
            posted: Rc::new(RefCell::new(Vec::new())),
            closed: Rc::new(Cell::new(false)),
        }
    }

    pub fn posted(&self) -> Vec<M> {
        self.posted.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.posted.borrow().len()
    }

    pub fn close(&self) {
        self.closed.set(true);
    }
}

impl<M> Outbox<M> for Recorder<M> {
    fn post(&self, message: M) -> Result<(), BridgeError> {
        if self.closed.get() {
            return Err(BridgeError::ChannelClosed);
        }
        self.posted.borrow_mut().push(message);
        Ok(())
    }
}
