use crate::error::BridgeError;
use crate::protocol::{Command, CommandKind};
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

type Handler = Box<dyn FnMut(&Command)>;

/// Callbacks exposed by the emulation module, keyed by the command they serve.
///
/// Populated by the module loader once the module runs; any entry may be
/// missing, and a missing entry is not an error until something tries to
/// invoke it.
#[derive(Default)]
pub struct EntryPoints {
    handlers: HashMap<CommandKind, Handler>,
}

/// Registry handle shared by the loader (writer) and the bridge (reader)
pub type SharedEntryPoints = Rc<RefCell<EntryPoints>>;

impl EntryPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedEntryPoints {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn register_load_binary(&mut self, mut f: impl FnMut(&[u8]) + 'static) {
        self.insert(
            CommandKind::LoadBinary,
            Box::new(move |cmd| {
                if let Command::LoadBinary { data } = cmd {
                    f(data)
                }
            }),
        );
    }

    pub fn register_reset(&mut self, mut f: impl FnMut() + 'static) {
        self.insert(CommandKind::Reset, Box::new(move |_| f()));
    }

    pub fn register_toggle_pause(&mut self, mut f: impl FnMut() + 'static) {
        self.insert(CommandKind::TogglePause, Box::new(move |_| f()));
    }

    pub fn register_set_frequency(&mut self, mut f: impl FnMut(u32) + 'static) {
        self.insert(
            CommandKind::SetFrequency,
            Box::new(move |cmd| {
                if let Command::SetFrequency { value } = cmd {
                    f(value.get())
                }
            }),
        );
    }

    fn insert(&mut self, kind: CommandKind, handler: Handler) {
        if self.handlers.insert(kind, handler).is_some() {
            debug!("Replaced entry point for '{kind}'");
        } else {
            debug!("Registered entry point for '{kind}'");
        }
    }

    pub fn is_registered(&self, kind: CommandKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn registered(&self) -> Vec<CommandKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn invoke(&mut self, command: &Command) -> Result<(), BridgeError> {
        let kind = command.kind();
        let handler = self
            .handlers
            .get_mut(&kind)
            .ok_or(BridgeError::MissingEntryPoint(kind))?;
        handler(command);
        Ok(())
    }
}

impl fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoints")
            .field("registered", &self.registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeedPreset;
    use std::cell::Cell;

    #[test]
    fn test_invoke_routes_payload() {
        let loaded = Rc::new(RefCell::new(Vec::new()));
        let hz = Rc::new(Cell::new(0));

        let mut entry_points = EntryPoints::new();
        let sink = loaded.clone();
        entry_points.register_load_binary(move |bytes| sink.borrow_mut().extend_from_slice(bytes));
        let sink = hz.clone();
        entry_points.register_set_frequency(move |value| sink.set(value));

        entry_points
            .invoke(&Command::LoadBinary {
                data: vec![0x12, 0x00],
            })
            .unwrap();
        entry_points
            .invoke(&Command::SetFrequency {
                value: SpeedPreset::Fast.frequency(),
            })
            .unwrap();

        assert_eq!(*loaded.borrow(), vec![0x12, 0x00]);
        assert_eq!(hz.get(), 1000);
    }

    #[test]
    fn test_missing_entry_point() {
        let mut entry_points = EntryPoints::new();
        entry_points.register_reset(|| {});

        assert_eq!(
            entry_points.invoke(&Command::TogglePause),
            Err(BridgeError::MissingEntryPoint(CommandKind::TogglePause))
        );
        assert!(entry_points.invoke(&Command::Reset).is_ok());
        assert_eq!(entry_points.registered(), vec![CommandKind::Reset]);
    }

    #[test]
    fn test_reregistration_replaces_handler() {
        let calls = Rc::new(Cell::new((0, 0)));
        let mut entry_points = EntryPoints::new();

        let c = calls.clone();
        entry_points.register_reset(move || c.set((c.get().0 + 1, c.get().1)));
        let c = calls.clone();
        entry_points.register_reset(move || c.set((c.get().0, c.get().1 + 1)));

        entry_points.invoke(&Command::Reset).unwrap();
        assert_eq!(calls.get(), (0, 1));

        assert_eq!(entry_points.registered(), vec![CommandKind::Reset]);
    }
}
