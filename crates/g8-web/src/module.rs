use crate::messenger::describe;
use g8_link::prelude::*;
use js_sys::{Function, Object, Promise, Reflect, Uint8Array, WebAssembly};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Response, Window};

/// Page-provided runner, e.g. `(instance) => go.run(instance)` for modules that need a host runtime
const RUNNER_GLOBAL: &str = "g8Run";
/// Page-provided import object handed to instantiation
const IMPORTS_GLOBAL: &str = "g8Imports";
const START_EXPORTS: [&str; 2] = ["_start", "main"];

/// Names the module registers its entry points under, on `window` or among its exports
const ENTRY_GLOBALS: [(CommandKind, &str); 4] = [
    (CommandKind::LoadBinary, "loadRom"),
    (CommandKind::Reset, "resetEmulator"),
    (CommandKind::TogglePause, "togglePause"),
    (CommandKind::SetFrequency, "setCpuFrequency"),
];

pub struct WasmModule {
    window: Window,
    instance: WebAssembly::Instance,
}

impl WasmModule {
    pub async fn instantiate(
        window: Window,
        url: String,
    ) -> Result<Box<dyn EmulationModule>, BridgeError> {
        let response = JsFuture::from(window.fetch_with_str(&url))
            .await
            .map_err(|e| BridgeError::ModuleFetch(describe(&e)))?;
        let response: Response = response
            .dyn_into()
            .map_err(|_| BridgeError::ModuleFetch(format!("{url} did not produce a response")))?;
        if !response.ok() {
            let status = response.status();
            return Err(BridgeError::ModuleFetch(format!("{url} returned HTTP {status}")));
        }

        let imports = lookup(window.as_ref(), IMPORTS_GLOBAL)
            .and_then(|value| value.dyn_into::<Object>().ok())
            .unwrap_or_else(Object::new);
        let source = Promise::resolve(&response);
        let result = JsFuture::from(WebAssembly::instantiate_streaming(&source, &imports))
            .await
            .map_err(|e| BridgeError::ModuleInstantiate(describe(&e)))?;
        let instance = Reflect::get(&result, &"instance".into())
            .ok()
            .and_then(|value| value.dyn_into::<WebAssembly::Instance>().ok())
            .ok_or_else(|| BridgeError::ModuleInstantiate("no instance in result".to_string()))?;

        Ok(Box::new(WasmModule { window, instance }))
    }

    fn entry_function(&self, name: &str) -> Option<Function> {
        function(self.window.as_ref(), name)
            .or_else(|| function(self.instance.exports().as_ref(), name))
    }
}

impl EmulationModule for WasmModule {
    fn run(&mut self, entry_points: &mut EntryPoints) -> Result<(), BridgeError> {
        if let Some(runner) = function(self.window.as_ref(), RUNNER_GLOBAL) {
            runner
                .call1(&JsValue::NULL, &self.instance)
                .map_err(|e| BridgeError::ModuleEntry(describe(&e)))?;
        } else {
            let exports = self.instance.exports();
            let start = START_EXPORTS
                .iter()
                .find_map(|name| function(exports.as_ref(), name));
            if let Some(start) = start {
                start
                    .call0(&JsValue::NULL)
                    .map_err(|e| BridgeError::ModuleEntry(describe(&e)))?;
            }
        }

        for (kind, name) in ENTRY_GLOBALS {
            match self.entry_function(name) {
                Some(f) => bind(entry_points, kind, name, f),
                None => log::debug!("Module exposes no {name}"),
            }
        }
        Ok(())
    }
}

fn bind(entry_points: &mut EntryPoints, kind: CommandKind, name: &'static str, f: Function) {
    match kind {
        CommandKind::LoadBinary => entry_points.register_load_binary(move |bytes| {
            report(name, f.call1(&JsValue::NULL, &Uint8Array::from(bytes)));
        }),
        CommandKind::Reset => {
            entry_points.register_reset(move || report(name, f.call0(&JsValue::NULL)))
        }
        CommandKind::TogglePause => {
            entry_points.register_toggle_pause(move || report(name, f.call0(&JsValue::NULL)))
        }
        CommandKind::SetFrequency => entry_points.register_set_frequency(move |hz| {
            report(name, f.call1(&JsValue::NULL, &JsValue::from(hz)));
        }),
    }
}

fn report(name: &str, result: Result<JsValue, JsValue>) {
    if let Err(e) = result {
        log::error!("{name} threw: {}", describe(&e));
    }
}

fn lookup(target: &JsValue, name: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

fn function(target: &JsValue, name: &str) -> Option<Function> {
    lookup(target, name)?.dyn_into::<Function>().ok()
}
