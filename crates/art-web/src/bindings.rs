use crate::audio::{ContextSlot, WebAudioBackend};
use crate::constants::{BUTTON_SELECTOR, FRAGMENT_SCRIPT_SELECTOR, VERTEX_SCRIPT_SELECTOR};
use crate::dom;
use crate::host::WebHost;
use crate::surface::CanvasSurface;
use art_core::{
    App, AudioConfig, ShaderSource, Topology, TransportState, DEFAULT_FRAGMENT_WGSL,
    DEFAULT_VERTEX_WGSL,
};
use art_render::GpuContext;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys as web;

type WebApp = App<WebAudioBackend, CanvasSurface>;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("[app] digital-art web starting");
    Ok(())
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Shader text from the element's `<script type="vert|frag">` children,
/// falling back to the bundled programs per stage.
fn read_shaders(element: &web::Element) -> Result<ShaderSource, JsValue> {
    let vertex = dom::child_text(element, VERTEX_SCRIPT_SELECTOR);
    let fragment = dom::child_text(element, FRAGMENT_SCRIPT_SELECTOR);
    if vertex.is_none() && fragment.is_none() {
        return Ok(ShaderSource::bundled());
    }
    ShaderSource::new(
        vertex.as_deref().unwrap_or(DEFAULT_VERTEX_WGSL),
        fragment.as_deref().unwrap_or(DEFAULT_FRAGMENT_WGSL),
    )
    .map_err(js_err)
}

/// Start or stop the music from a user gesture. A start also resumes the
/// audio context; if the browser refuses, the music is stopped again so the
/// transport never reports playing while the context is silent.
fn toggle_from_gesture(
    app: &Rc<RefCell<WebApp>>,
    context: &ContextSlot,
    label: Option<web::Element>,
) -> Result<&'static str, JsValue> {
    let (started, text) = {
        let mut app = app.borrow_mut();
        let toggled = app.toggle();
        if let Some(label) = &label {
            dom::set_label(label, app.label());
        }
        let state = toggled.map_err(js_err)?;
        (state == TransportState::Started, app.label())
    };
    if !started {
        return Ok(text);
    }
    let resume = context.borrow().as_ref().map(|ctx| ctx.resume());
    match resume {
        Some(Ok(promise)) => {
            let weak = Rc::downgrade(app);
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = JsFuture::from(promise).await {
                    audio_refused(&weak, label.as_ref(), e);
                }
            });
        }
        Some(Err(e)) => audio_refused(&Rc::downgrade(app), label.as_ref(), e),
        None => log::warn!("[audio] started without a context"),
    }
    Ok(text)
}

fn audio_refused(app: &Weak<RefCell<WebApp>>, label: Option<&web::Element>, e: JsValue) {
    log::error!("[audio] the browser did not start audio: {:?}", e);
    let Some(app) = app.upgrade() else {
        return;
    };
    let mut app = app.borrow_mut();
    app.stop();
    if let Some(label) = label {
        dom::set_label(label, app.label());
    }
}

#[wasm_bindgen]
pub struct DigitalArt {
    app: Rc<RefCell<WebApp>>,
    context: ContextSlot,
}

#[wasm_bindgen]
impl DigitalArt {
    /// Acquire the GPU, build the app around `element` and wire the page's
    /// toggle button. Nothing is attached or playing yet.
    pub async fn create(element: web::Element) -> Result<DigitalArt, JsValue> {
        let (window, document) =
            dom::window_document().ok_or_else(|| js_err("no window/document"))?;
        let shaders = read_shaders(&element)?;
        let gpu = GpuContext::new(wgpu::Instance::default(), None)
            .await
            .map_err(js_err)?;
        let host = WebHost::new(window, element.clone());
        let surface = CanvasSurface::new(Rc::new(gpu), document.clone(), element);
        let topology = Topology::digital_art().map_err(js_err)?;
        let backend = WebAudioBackend::default();
        let context = backend.context();
        let app = Rc::new(RefCell::new(App::new(
            backend,
            surface,
            shaders,
            topology,
            AudioConfig::default(),
            host,
        )));

        // Audio may only start from a user gesture, so the button is the
        // main path into the audio engine on the web.
        if let Some(button) = document.query_selector(BUTTON_SELECTOR).ok().flatten() {
            let weak = Rc::downgrade(&app);
            let context = context.clone();
            let label = button.clone();
            dom::add_click_listener(&button, move || {
                let Some(app) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = toggle_from_gesture(&app, &context, Some(label.clone())) {
                    log::error!("[app] {:?}", e);
                }
            });
        } else {
            log::warn!("[app] no toggle button on the page");
        }

        Ok(DigitalArt { app, context })
    }

    pub fn attach(&self) -> Result<(), JsValue> {
        self.app.borrow().visualizer.attach().map_err(js_err)
    }

    pub fn detach(&self) {
        self.app.borrow().visualizer.detach();
    }

    #[wasm_bindgen(js_name = setInput)]
    pub fn set_input(&self, name: &str, value: f32) {
        self.app.borrow().visualizer.set_input(name, value);
    }

    /// Start or stop the music; returns the new button label. Call it from a
    /// user gesture handler.
    pub fn toggle(&self) -> Result<String, JsValue> {
        toggle_from_gesture(&self.app, &self.context, None).map(str::to_owned)
    }

    pub fn state(&self) -> String {
        self.app.borrow().audio.state().as_str().to_owned()
    }

    /// Stop the music and tear down the visuals.
    pub fn dispose(&self) {
        self.app.borrow_mut().unmount();
    }
}
