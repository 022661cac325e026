use g8_link::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Final state of the headless emulator, shipped back to the host thread
#[derive(Debug, Default, Clone)]
pub struct EmuReport {
    pub rom_len: Option<usize>,
    pub roms_loaded: u32,
    pub resets: u32,
    pub paused: bool,
    pub frequency_hz: Option<u32>,
    pub failure: Option<String>,
}

#[derive(Default)]
pub struct EmuState {
    rom: RefCell<Option<Vec<u8>>>,
    roms_loaded: Cell<u32>,
    resets: Cell<u32>,
    paused: Cell<bool>,
    frequency_hz: Cell<Option<u32>>,
    surface_created: Cell<bool>,
    failure: RefCell<Option<String>>,
}

impl EmuState {
    pub fn surface_created(&self) -> bool {
        self.surface_created.get()
    }

    pub fn set_failure(&self, message: String) {
        *self.failure.borrow_mut() = Some(message);
    }

    pub fn report(&self) -> EmuReport {
        EmuReport {
            rom_len: self.rom.borrow().as_ref().map(Vec::len),
            roms_loaded: self.roms_loaded.get(),
            resets: self.resets.get(),
            paused: self.paused.get(),
            frequency_hz: self.frequency_hz.get(),
            failure: self.failure.borrow().clone(),
        }
    }
}

/// Stand-in for the compiled emulator: records what it is asked to do
pub struct HeadlessModule {
    state: Rc<EmuState>,
}

impl HeadlessModule {
    pub fn new(state: Rc<EmuState>) -> Self {
        Self { state }
    }
}

impl EmulationModule for HeadlessModule {
    fn run(&mut self, entry_points: &mut EntryPoints) -> Result<(), BridgeError> {
        let s = self.state.clone();
        entry_points.register_load_binary(move |bytes| {
            log::info!("[emu] ROM loaded ({} bytes)", bytes.len());
            *s.rom.borrow_mut() = Some(bytes.to_vec());
            s.roms_loaded.set(s.roms_loaded.get() + 1);
        });

        let s = self.state.clone();
        entry_points.register_reset(move || {
            log::info!("[emu] reset");
            s.resets.set(s.resets.get() + 1);
        });

        let s = self.state.clone();
        entry_points.register_toggle_pause(move || {
            s.paused.set(!s.paused.get());
            log::info!("[emu] paused = {}", s.paused.get());
        });

        let s = self.state.clone();
        entry_points.register_set_frequency(move |hz| {
            log::info!("[emu] CPU frequency = {hz} Hz");
            s.frequency_hz.set(Some(hz));
        });

        // The display surface comes up with the module
        self.state.surface_created.set(true);
        Ok(())
    }
}

/// A terminal has no focus model; the surface counts as focused once it exists
#[derive(Clone)]
pub struct HeadlessSurface;

impl FocusSurface for HeadlessSurface {
    fn is_focused(&self) -> bool {
        true
    }
}

pub struct HeadlessLocator {
    state: Rc<EmuState>,
}

impl HeadlessLocator {
    pub fn new(state: Rc<EmuState>) -> Self {
        Self { state }
    }
}

impl SurfaceLocator for HeadlessLocator {
    type Surface = HeadlessSurface;

    fn locate(&mut self) -> Option<HeadlessSurface> {
        self.state.surface_created().then_some(HeadlessSurface)
    }
}
