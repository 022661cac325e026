use crate::focus::CanvasLocator;
use crate::messenger::{Listener, WindowOutbox, WindowRef, decode_command, describe};
use crate::module::WasmModule;
use g8_link::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Event, MessageEvent, Window};

type Relay = FocusRelay<CanvasLocator, WindowOutbox>;
type Listeners = Rc<RefCell<Vec<Listener>>>;

/// Everything the sandboxed context keeps alive for the lifetime of the page
pub struct EmbedContext {
    _bridge: Rc<EmbedBridge<WindowRef>>,
    _loader: Rc<RefCell<ModuleLoader<WindowOutbox>>>,
    _relay: Rc<RefCell<Relay>>,
    _listeners: Listeners,
}

pub fn start(config: BridgeConfig) -> Result<EmbedContext, JsValue> {
    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;
    let parent = window.parent()?.ok_or("embedded context has no parent window")?;
    let outbox = WindowOutbox::new(parent.clone(), &config.target_origin);
    let entry_points = EntryPoints::shared();

    let bridge = Rc::new(EmbedBridge::new(WindowRef::new(&parent), entry_points.clone()));
    let listeners: Listeners = Rc::new(RefCell::new(Vec::new()));
    let receiver = bridge.clone();
    let on_message = move |event: MessageEvent| {
        let source = WindowRef::from_event(&event);
        let dispatch = receiver.receive_with(&source, || decode_command(&event.data()));
        log::debug!("Host message: {dispatch:?}");
    };
    listeners
        .borrow_mut()
        .push(Listener::attach(&window, "message", on_message)?);

    let error_document = document.clone();
    let loader = ModuleLoader::new(&config, entry_points, outbox.clone())
        .with_failure_display(move |e| show_error(&error_document, e));
    let loader = Rc::new(RefCell::new(loader));
    let url = loader
        .borrow_mut()
        .begin()
        .map_err(|e| JsValue::from_str(&e.to_string()))?
        .to_string();
    let pending = loader.clone();
    let module_window = window.clone();
    wasm_bindgen_futures::spawn_local(async move {
        let outcome = WasmModule::instantiate(module_window, url).await;
        pending.borrow_mut().finish(outcome);
    });

    let locator = CanvasLocator::new(document, &config.surface_selector);
    let relay = Rc::new(RefCell::new(FocusRelay::new(locator, outbox, config.focus_poll)));
    poll_surface(window, relay.clone(), listeners.clone());

    Ok(EmbedContext {
        _bridge: bridge,
        _loader: loader,
        _relay: relay,
        _listeners: listeners,
    })
}

fn poll_surface(window: Window, relay: Rc<RefCell<Relay>>, listeners: Listeners) {
    let outcome = relay.borrow_mut().poll();
    match outcome {
        PollOutcome::Attached => {
            if let Err(e) = observe_surface(&relay, &listeners) {
                log::error!("Could not observe surface: {}", describe(&e));
            }
        }
        PollOutcome::RetryIn(delay) => {
            let next = window.clone();
            let retry = Closure::once_into_js(move || poll_surface(next, relay, listeners));
            let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
            let callback: &js_sys::Function = retry.unchecked_ref();
            let scheduled =
                window.set_timeout_with_callback_and_timeout_and_arguments_0(callback, millis);
            if let Err(e) = scheduled {
                log::error!("Could not schedule surface poll: {}", describe(&e));
            }
        }
        PollOutcome::GaveUp => {}
    }
}

fn observe_surface(relay: &Rc<RefCell<Relay>>, listeners: &Listeners) -> Result<(), JsValue> {
    let Some(element) = relay.borrow().surface().map(|s| s.element().clone()) else {
        return Ok(());
    };
    let mut listeners = listeners.borrow_mut();

    let focused = relay.clone();
    listeners.push(Listener::attach(&element, "focus", move |_: Event| {
        focused.borrow_mut().focus_gained();
    })?);
    let blurred = relay.clone();
    listeners.push(Listener::attach(&element, "blur", move |_: Event| {
        blurred.borrow_mut().focus_lost();
    })?);
    let clicked = relay.clone();
    let target = element.clone();
    listeners.push(Listener::attach(&element, "click", move |_: Event| {
        // focus() fires the focus listener synchronously, so the relay borrow must end first
        let action = clicked.borrow_mut().pointer_activated();
        if action == PointerAction::RequestFocus
            && let Err(e) = target.focus()
        {
            log::warn!("Surface refused focus: {}", describe(&e));
        }
    })?);
    Ok(())
}

/// Shows `error` inside the embedded page, for failures before the loader exists
pub fn report_failure(error: &BridgeError) {
    if let Some(document) = web_sys::window().and_then(|window| window.document()) {
        show_error(&document, error);
    }
}

fn show_error(document: &Document, error: &BridgeError) {
    let Ok(banner) = document.create_element("div") else {
        return;
    };
    banner.set_class_name("g8-error");
    let _ = banner.set_attribute("role", "alert");
    banner.set_text_content(Some(&format!("Failed to load emulator: {error}")));
    if let Some(body) = document.body() {
        let _ = body.append_child(&banner);
    }
}
