use g8_link::prelude::*;
use js_sys::Object;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement};

/// Finds the emulator's drawing surface by selector
pub struct CanvasLocator {
    document: Document,
    selector: String,
}

impl CanvasLocator {
    pub fn new(document: Document, selector: &str) -> Self {
        Self {
            document,
            selector: selector.to_string(),
        }
    }
}

impl SurfaceLocator for CanvasLocator {
    type Surface = CanvasSurface;

    fn locate(&mut self) -> Option<CanvasSurface> {
        let element = self.document.query_selector(&self.selector).ok()??;
        let element = element.dyn_into::<HtmlElement>().ok()?;
        Some(CanvasSurface {
            document: self.document.clone(),
            element,
        })
    }
}

pub struct CanvasSurface {
    document: Document,
    element: HtmlElement,
}

impl CanvasSurface {
    pub fn element(&self) -> &HtmlElement {
        &self.element
    }
}

impl FocusSurface for CanvasSurface {
    fn is_focused(&self) -> bool {
        self.document
            .active_element()
            .is_some_and(|active| Object::is(active.as_ref(), self.element.as_ref()))
    }
}
