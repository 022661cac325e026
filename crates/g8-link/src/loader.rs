use crate::channel::Outbox;
use crate::config::BridgeConfig;
use crate::entry_points::{EntryPoints, SharedEntryPoints};
use crate::error::BridgeError;
use crate::protocol::Signal;
use log::{error, info, warn};

/// The opaque, already-built emulator.
pub trait EmulationModule {
    /// Runs the module's entry point. The module registers whichever entry
    /// points it exposes; registering none is valid.
    fn run(&mut self, entry_points: &mut EntryPoints) -> Result<(), BridgeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    Instantiating,
    Running,
    Failed(BridgeError),
}

/// Boots the emulation module inside the sandboxed context and tells the
/// parent once it is ready.
///
/// Instantiation is asynchronous: [`ModuleLoader::begin`] starts it and
/// [`ModuleLoader::finish`] receives the outcome. `Ready` is posted at most
/// once, after the module's entry point ran. Failure is terminal.
pub struct ModuleLoader<O: Outbox<Signal>> {
    module_url: String,
    entry_points: SharedEntryPoints,
    parent: O,
    state: LoaderState,
    module: Option<Box<dyn EmulationModule>>,
    failure_display: Option<Box<dyn Fn(&BridgeError)>>,
}

impl<O: Outbox<Signal>> ModuleLoader<O> {
    pub fn new(config: &BridgeConfig, entry_points: SharedEntryPoints, parent: O) -> Self {
        Self {
            module_url: config.module_url.clone(),
            entry_points,
            parent,
            state: LoaderState::Idle,
            module: None,
            failure_display: None,
        }
    }

    /// Hook used to surface a failure inside the sandboxed context
    pub fn with_failure_display<F>(mut self, f: F) -> Self
    where
        F: Fn(&BridgeError) + 'static,
    {
        self.failure_display = Some(Box::new(f));
        self
    }

    pub fn state(&self) -> &LoaderState {
        &self.state
    }

    pub fn module_url(&self) -> &str {
        &self.module_url
    }

    /// Marks instantiation as started and returns the module location.
    pub fn begin(&mut self) -> Result<&str, BridgeError> {
        if self.state != LoaderState::Idle {
            warn!("Module loader invoked again while {:?}", self.state);
            return Err(BridgeError::AlreadyInitialized);
        }
        info!("Instantiating module from {}", self.module_url);
        self.state = LoaderState::Instantiating;
        Ok(&self.module_url)
    }

    /// Consumes the outcome of the instantiation started by [`ModuleLoader::begin`].
    pub fn finish(&mut self, outcome: Result<Box<dyn EmulationModule>, BridgeError>) {
        if self.state != LoaderState::Instantiating {
            warn!("Ignoring module outcome while {:?}", self.state);
            return;
        }

        let mut module = match outcome {
            Ok(module) => module,
            Err(e) => return self.fail(e),
        };

        let run = {
            let mut entry_points = self.entry_points.borrow_mut();
            module.run(&mut entry_points)
        };
        if let Err(e) = run {
            return self.fail(e);
        }

        self.module = Some(module);
        self.state = LoaderState::Running;
        info!(
            "Module initialized, entry points: {:?}",
            self.entry_points.borrow().registered()
        );

        if let Err(e) = self.parent.post(Signal::Ready) {
            error!("Failed to signal readiness: {e}");
        }
    }

    /// `begin` + `finish` for module sources that resolve immediately.
    pub fn initialize_with<F>(&mut self, instantiate: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&str) -> Result<Box<dyn EmulationModule>, BridgeError>,
    {
        let url = self.begin()?.to_owned();
        self.finish(instantiate(&url));
        Ok(())
    }

    fn fail(&mut self, e: BridgeError) {
        error!("Module initialization failed: {e}");
        if let Some(display) = self.failure_display.as_ref() {
            display(&e);
        }
        self.state = LoaderState::Failed(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, CommandKind};
    use crate::test_support::Recorder;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct StubModule {
        expose_reset: bool,
        fail_on_run: bool,
    }

    impl EmulationModule for StubModule {
        fn run(&mut self, entry_points: &mut EntryPoints) -> Result<(), BridgeError> {
            if self.fail_on_run {
                return Err(BridgeError::ModuleEntry("trap: unreachable".into()));
            }
            if self.expose_reset {
                entry_points.register_reset(|| {});
            }
            Ok(())
        }
    }

    fn stub(expose_reset: bool) -> Box<dyn EmulationModule> {
        Box::new(StubModule {
            expose_reset,
            fail_on_run: false,
        })
    }

    fn new_loader() -> (ModuleLoader<Recorder<Signal>>, Recorder<Signal>, SharedEntryPoints) {
        let parent = Recorder::new();
        let entry_points = EntryPoints::shared();
        let config = BridgeConfig::default();
        let loader = ModuleLoader::new(&config, entry_points.clone(), parent.clone());
        (loader, parent, entry_points)
    }

    #[test]
    fn test_ready_after_successful_run() {
        let (mut loader, parent, entry_points) = new_loader();

        assert_eq!(loader.begin().unwrap(), "g8emu.wasm");
        assert_eq!(loader.state(), &LoaderState::Instantiating);
        assert!(parent.posted().is_empty());

        loader.finish(Ok(stub(true)));

        assert_eq!(loader.state(), &LoaderState::Running);
        assert_eq!(parent.posted(), vec![Signal::Ready]);
        assert!(entry_points.borrow().is_registered(CommandKind::Reset));
        assert!(entry_points.borrow_mut().invoke(&Command::Reset).is_ok());
    }

    #[test]
    fn test_module_without_entry_points_is_still_ready() {
        let (mut loader, parent, entry_points) = new_loader();
        loader.initialize_with(|_| Ok(stub(false))).unwrap();

        assert_eq!(parent.posted(), vec![Signal::Ready]);
        assert!(entry_points.borrow().is_empty());
    }

    #[test]
    fn test_fetch_failure_is_terminal() {
        let shown = Rc::new(RefCell::new(Vec::new()));
        let (loader, parent, _) = new_loader();
        let sink = shown.clone();
        let mut loader =
            loader.with_failure_display(move |e| sink.borrow_mut().push(e.to_string()));

        loader
            .initialize_with(|url| Err(BridgeError::ModuleFetch(format!("404 for {url}"))))
            .unwrap();

        assert!(matches!(loader.state(), LoaderState::Failed(BridgeError::ModuleFetch(_))));
        assert!(parent.posted().is_empty());
        assert_eq!(*shown.borrow(), vec!["Failed to fetch module: 404 for g8emu.wasm"]);

        // no retry
        assert_eq!(loader.begin(), Err(BridgeError::AlreadyInitialized));
        loader.finish(Ok(stub(true)));
        assert!(parent.posted().is_empty());
    }

    #[test]
    fn test_trap_in_entry_point_does_not_signal() {
        let (mut loader, parent, _) = new_loader();
        loader.begin().unwrap();
        loader.finish(Ok(Box::new(StubModule {
            expose_reset: true,
            fail_on_run: true,
        })));

        assert_eq!(
            loader.state(),
            &LoaderState::Failed(BridgeError::ModuleEntry("trap: unreachable".into()))
        );
        assert!(parent.posted().is_empty());
    }

    #[test]
    fn test_second_initialization_is_rejected() {
        let (mut loader, parent, _) = new_loader();
        loader.initialize_with(|_| Ok(stub(true))).unwrap();

        let mut called = false;
        let second = loader.initialize_with(|_| {
            called = true;
            Ok(stub(true))
        });

        assert_eq!(second, Err(BridgeError::AlreadyInitialized));
        assert!(!called);
        assert_eq!(parent.posted(), vec![Signal::Ready]);
    }

    #[test]
    fn test_finish_without_begin_is_ignored() {
        let (mut loader, parent, _) = new_loader();
        loader.finish(Ok(stub(true)));
        assert_eq!(loader.state(), &LoaderState::Idle);
        assert!(parent.posted().is_empty());
    }
}
