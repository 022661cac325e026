use crate::messenger::{Listener, WindowOutbox, WindowRef, decode_signal, describe};
use g8_link::prelude::*;
use js_sys::{ArrayBuffer, Function, Uint8Array};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{File, FileReader, HtmlIFrameElement, MessageEvent};

type Controller = HostController<WindowRef, WindowOutbox>;

/// Changes recorded while the controller is borrowed, delivered to the page afterwards
#[derive(Default)]
struct ChangeQueue {
    pending: RefCell<Vec<HostChange>>,
    callback: RefCell<Option<Function>>,
}

impl ChangeQueue {
    fn push(&self, change: HostChange) {
        self.pending.borrow_mut().push(change);
    }

    fn flush(&self) {
        let pending: Vec<HostChange> = self.pending.borrow_mut().drain(..).collect();
        let Some(callback) = self.callback.borrow().clone() else {
            return;
        };
        for change in pending {
            let (kind, value) = match change {
                HostChange::ControlsEnabled => ("controls", JsValue::TRUE),
                HostChange::Focus(focus) => {
                    ("focus", JsValue::from_bool(focus == FocusState::Focused))
                }
                HostChange::Paused(paused) => ("paused", JsValue::from_bool(paused)),
                HostChange::Speed(speed) => ("speed", JsValue::from(speed.hz())),
            };
            if let Err(e) = callback.call2(&JsValue::NULL, &JsValue::from_str(kind), &value) {
                log::warn!("Change callback threw: {}", describe(&e));
            }
        }
    }
}

/// The host page's handle on one embedded emulator frame
#[wasm_bindgen]
pub struct HostHandle {
    config: BridgeConfig,
    controller: Rc<RefCell<Controller>>,
    changes: Rc<ChangeQueue>,
    listener: Option<Listener>,
}

#[wasm_bindgen]
impl HostHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(frame: &HtmlIFrameElement, config: JsValue) -> Result<HostHandle, JsValue> {
        crate::init_logging();
        let config = crate::parse_config(config).map_err(crate::to_js)?;
        let window = web_sys::window().ok_or("no window")?;
        let embed = frame.content_window().ok_or("frame has no content window")?;

        let changes = Rc::new(ChangeQueue::default());
        let observed = changes.clone();
        let controller = HostController::new(
            WindowRef::new(&embed),
            WindowOutbox::new(embed, &config.target_origin),
            &config,
        )
        .with_observer(move |change| observed.push(change));
        let controller = Rc::new(RefCell::new(controller));

        let receiver = controller.clone();
        let notify = changes.clone();
        let listener = Listener::attach(&window, "message", move |event: MessageEvent| {
            let source = WindowRef::from_event(&event);
            let changed = receiver
                .borrow_mut()
                .receive_with(&source, || decode_signal(&event.data()));
            if changed {
                notify.flush();
            }
        })?;

        Ok(HostHandle {
            config,
            controller,
            changes,
            listener: Some(listener),
        })
    }

    /// Registers `callback(kind, value)` for "controls", "focus", "paused" and "speed" changes
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: Function) {
        *self.changes.callback.borrow_mut() = Some(callback);
    }

    #[wasm_bindgen(getter)]
    pub fn ready(&self) -> bool {
        self.controller.borrow().is_ready()
    }

    #[wasm_bindgen(getter)]
    pub fn focused(&self) -> bool {
        self.controller.borrow().focus() == FocusState::Focused
    }

    #[wasm_bindgen(getter)]
    pub fn paused(&self) -> bool {
        self.controller.borrow().paused()
    }

    #[wasm_bindgen(getter)]
    pub fn speed(&self) -> u32 {
        self.controller.borrow().speed().hz()
    }

    /// Value for the file input's `accept` attribute
    #[wasm_bindgen(getter)]
    pub fn accept(&self) -> String {
        self.config.accept_attribute()
    }

    pub fn reset(&self) -> bool {
        self.submit(Intent::Reset)
    }

    #[wasm_bindgen(js_name = togglePause)]
    pub fn toggle_pause(&self) -> bool {
        self.submit(Intent::TogglePause)
    }

    /// Accepts a preset name ("normal") or its frequency ("540")
    #[wasm_bindgen(js_name = setSpeed)]
    pub fn set_speed(&self, value: &str) -> Result<bool, JsValue> {
        let preset: SpeedPreset = value
            .parse()
            .map_err(|e: BridgeError| JsValue::from_str(&e.to_string()))?;
        Ok(self.submit(Intent::SetSpeed(preset)))
    }

    /// Reads the chosen file and forwards its bytes once the read completes
    #[wasm_bindgen(js_name = selectFile)]
    pub fn select_file(&self, file: Option<File>) -> Result<(), JsValue> {
        let Some((file, ticket)) = self.controller.borrow_mut().select_file(file) else {
            return Ok(());
        };
        if !self.config.accepts_file(&file.name()) {
            log::warn!("{} does not look like a ROM", file.name());
        }

        let reader = FileReader::new()?;
        let controller = Rc::downgrade(&self.controller);
        let changes = Rc::downgrade(&self.changes);
        let finished = reader.clone();
        let on_done = Closure::once_into_js(move || {
            let Some(controller) = controller.upgrade() else {
                log::debug!("Host view gone before ROM read finished");
                return;
            };
            let bytes = finished
                .result()
                .ok()
                .filter(|value| value.is_instance_of::<ArrayBuffer>())
                .map(|buffer| Uint8Array::new(&buffer).to_vec())
                .ok_or_else(|| io::Error::other("file read did not complete"));
            let submission = controller.borrow_mut().finish_load(ticket, bytes);
            log::debug!("ROM load: {submission:?}");
            if let Some(changes) = changes.upgrade() {
                changes.flush();
            }
        });
        reader.set_onloadend(Some(on_done.unchecked_ref()));
        reader.read_as_array_buffer(&file)?;
        Ok(())
    }

    /// Stops listening for the frame's messages. Safe to call more than once.
    pub fn detach(&mut self) {
        self.controller.borrow_mut().teardown();
        if let Some(mut listener) = self.listener.take() {
            listener.detach();
        }
    }
}

impl HostHandle {
    fn submit(&self, intent: Intent) -> bool {
        let submission = self.controller.borrow_mut().submit(intent);
        self.changes.flush();
        log::debug!("{intent:?}: {submission:?}");
        matches!(submission, Submission::Posted(_))
    }
}
