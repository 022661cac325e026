//! Browser glue for the g8 control plane.
//!
//! The host page builds a [`HostHandle`] around the emulator's iframe; the page
//! inside the iframe calls [`start_embed`] once after loading this module.
#![cfg(target_arch = "wasm32")]

mod console_log;
mod embed;
mod focus;
mod host;
mod messenger;
mod module;

use embed::EmbedContext;
use g8_link::config::BridgeConfig;
use g8_link::error::BridgeError;
use once_cell::unsync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use wasm_bindgen::prelude::*;

pub use host::HostHandle;

thread_local! {
    static EMBED: OnceCell<EmbedContext> = OnceCell::new();
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);

fn init_logging() {
    console_error_panic_hook::set_once();
    console_log::init();
}

fn parse_config(value: JsValue) -> Result<BridgeConfig, BridgeError> {
    if value.is_undefined() || value.is_null() {
        return Ok(BridgeConfig::default());
    }
    let config: BridgeConfig =
        serde_wasm_bindgen::from_value(value).map_err(|e| BridgeError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

fn to_js(error: BridgeError) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// Starts the sandboxed side: fetches the module, relays commands and reports focus.
#[wasm_bindgen(js_name = startEmbed)]
pub fn start_embed(config: JsValue) -> Result<(), JsValue> {
    init_logging();
    // A rejected config leaves the context startable
    let config = parse_config(config).map_err(|e| {
        log::error!("{e}");
        embed::report_failure(&e);
        to_js(e)
    })?;
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        log::warn!("Embedded context already started");
        return Ok(());
    }
    let context = embed::start(config)?;
    EMBED.with(|cell| {
        let _ = cell.set(context);
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_rejected_config_is_shown_and_start_can_be_retried() {
        let config = js_sys::Object::new();
        js_sys::Reflect::set(&config, &"module_url".into(), &"".into()).unwrap();

        assert!(start_embed(config.into()).is_err());
        assert!(!INITIALIZED.load(Ordering::SeqCst));

        let document = web_sys::window().unwrap().document().unwrap();
        let banner = document.query_selector(".g8-error").unwrap().unwrap();
        assert!(banner.text_content().unwrap().contains("module_url"));
    }
}
