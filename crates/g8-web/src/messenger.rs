use g8_link::channel::Outbox;
use g8_link::prelude::*;
use js_sys::{ArrayBuffer, Object, Reflect, Uint8Array};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Event, EventTarget, MessageEvent, Window};

/// Identity of the window a message came from, compared with `Object.is`
#[derive(Clone)]
pub struct WindowRef(JsValue);

impl WindowRef {
    pub fn new(window: &Window) -> Self {
        Self(window.clone().into())
    }

    /// Events without a source window never match a trusted identity
    pub fn from_event(event: &MessageEvent) -> Self {
        Self(event.source().map(JsValue::from).unwrap_or(JsValue::NULL))
    }
}

impl PartialEq for WindowRef {
    fn eq(&self, other: &Self) -> bool {
        Object::is(&self.0, &other.0)
    }
}

/// Posts to one specific window (the parent, or an iframe's content window)
#[derive(Clone)]
pub struct WindowOutbox {
    target: Window,
    origin: String,
}

impl WindowOutbox {
    pub fn new(target: Window, origin: &str) -> Self {
        Self {
            target,
            origin: origin.to_string(),
        }
    }

    fn send(&self, value: &JsValue, what: &str) -> Result<(), BridgeError> {
        self.target.post_message(value, &self.origin).map_err(|e| {
            log::error!("postMessage({what}) failed: {}", describe(&e));
            BridgeError::ChannelClosed
        })
    }
}

impl Outbox<Signal> for WindowOutbox {
    fn post(&self, signal: Signal) -> Result<(), BridgeError> {
        let value = to_value(&signal).map_err(|e| BridgeError::Encode(e.to_string()))?;
        self.send(&value, signal.wire_name())
    }
}

impl Outbox<Command> for WindowOutbox {
    fn post(&self, command: Command) -> Result<(), BridgeError> {
        let value = encode_command(&command)?;
        self.send(&value, command.kind().wire_name())
    }
}

/// A DOM event listener that is removed when dropped
pub struct Listener {
    target: EventTarget,
    event: &'static str,
    closure: Option<Closure<dyn FnMut(Event)>>,
}

impl Listener {
    pub fn attach<E, F>(
        target: &EventTarget,
        event: &'static str,
        mut handler: F,
    ) -> Result<Self, JsValue>
    where
        E: JsCast + 'static,
        F: FnMut(E) + 'static,
    {
        let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            if let Ok(event) = event.dyn_into::<E>() {
                handler(event);
            }
        });
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            event,
            closure: Some(closure),
        })
    }

    pub fn detach(&mut self) {
        if let Some(closure) = self.closure.take() {
            let _ = self
                .target
                .remove_event_listener_with_callback(self.event, closure.as_ref().unchecked_ref());
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.detach();
    }
}

/// ROM bytes travel as a `Uint8Array`, like a page posting a file read would
pub fn encode_command(command: &Command) -> Result<JsValue, BridgeError> {
    let Command::LoadBinary { data } = command else {
        return to_value(command).map_err(|e| BridgeError::Encode(e.to_string()));
    };
    let object = Object::new();
    let kind = JsValue::from_str(command.kind().wire_name());
    let bytes = Uint8Array::from(data.as_slice());
    Reflect::set(&object, &"type".into(), &kind)
        .and_then(|_| Reflect::set(&object, &"data".into(), &bytes))
        .map_err(|e| BridgeError::Encode(describe(&e)))?;
    Ok(object.into())
}

pub fn decode_command(message: &JsValue) -> Option<Command> {
    if let Some(data) = binary_rom(message) {
        return Some(Command::LoadBinary { data });
    }
    from_value(message.clone()).ok()
}

/// A `loadRom` whose payload is a typed array or buffer rather than a plain array
fn binary_rom(message: &JsValue) -> Option<Vec<u8>> {
    if !message.is_object() {
        return None;
    }
    let kind = Reflect::get(message, &"type".into()).ok()?.as_string()?;
    if kind != CommandKind::LoadBinary.wire_name() {
        return None;
    }
    let payload = Reflect::get(message, &"data".into()).ok()?;
    if let Some(array) = payload.dyn_ref::<Uint8Array>() {
        Some(array.to_vec())
    } else {
        payload
            .dyn_ref::<ArrayBuffer>()
            .map(|buffer| Uint8Array::new(buffer).to_vec())
    }
}

pub fn decode_signal(message: &JsValue) -> Option<Signal> {
    from_value(message.clone()).ok()
}

pub fn describe(error: &JsValue) -> String {
    error
        .as_string()
        .or_else(|| {
            error
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{error:?}"))
}
