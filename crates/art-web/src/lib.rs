//! Browser host for digital-art. A `<digital-art>` custom element shim (see
//! `index.html`) constructs a `DigitalArt` handle and forwards its
//! lifecycle callbacks to it.

#[cfg(target_arch = "wasm32")]
mod audio;
#[cfg(target_arch = "wasm32")]
mod bindings;
#[cfg(target_arch = "wasm32")]
mod constants;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod host;
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
mod retired;
#[cfg(target_arch = "wasm32")]
mod surface;

#[cfg(target_arch = "wasm32")]
pub use audio::{AnalyserMeter, ContextSlot, WebAudioBackend, WebAudioGraph};
#[cfg(target_arch = "wasm32")]
pub use bindings::DigitalArt;
#[cfg(target_arch = "wasm32")]
pub use host::WebHost;
#[cfg(target_arch = "wasm32")]
pub use surface::{CanvasRenderer, CanvasSurface};
