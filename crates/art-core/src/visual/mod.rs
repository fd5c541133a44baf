//! Shader visualizer lifecycle: attach to a render surface, drive a
//! per-refresh frame loop, accept named numeric inputs and tear everything
//! down again on detach.

pub mod renderer;
pub mod scene;
pub mod uniforms;

pub use renderer::{RenderSurface, Renderer, ShaderSource};
pub use scene::{
    Mesh, Node, NodeId, NodeKind, OrthoCamera, QuadGeometry, QuadVertex, ResourceId,
    ResourceList, Scene,
};
pub use uniforms::{UniformValue, Uniforms};

use crate::bridge::InputSink;
use crate::constants::{FALLBACK_VIEWPORT, UNIFORM_METER};
use crate::error::VisualError;
use crate::host::{EventKind, FrameHandle, Host, HostEvent, ListenerHandle, Resolution};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Shared flag checked at the top of every frame step. Set on detach so a
/// frame the host already dispatched becomes a no-op.
#[derive(Clone, Default)]
struct FrameToken(Rc<Cell<bool>>);

impl FrameToken {
    fn cancel(&self) {
        self.0.set(true);
    }

    fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

struct Attached<R> {
    renderer: R,
    camera: OrthoCamera,
    scene: Scene,
    uniforms: Uniforms,
    resources: ResourceList,
    started_at: f64,
    frame: Option<FrameHandle>,
    token: FrameToken,
    resize: ListenerHandle,
    pointer: ListenerHandle,
    frames_rendered: u64,
}

enum Attachment<R> {
    Unattached,
    Attached(Box<Attached<R>>),
}

struct Inner<S: RenderSurface> {
    shaders: ShaderSource,
    surface: S,
    host: Rc<dyn Host>,
    attachment: Attachment<S::Renderer>,
}

impl<S: RenderSurface> Inner<S> {
    fn attached(&mut self) -> Option<&mut Attached<S::Renderer>> {
        match &mut self.attachment {
            Attachment::Attached(att) => Some(att),
            Attachment::Unattached => None,
        }
    }

    fn apply_input(&mut self, name: &str, value: f32) {
        let Some(att) = self.attached() else {
            log::trace!("[visual] dropped `{}` while unattached", name);
            return;
        };
        match name {
            UNIFORM_METER => att.uniforms.meter = value,
            other => log::debug!("[visual] ignoring unknown input `{}`", other),
        }
    }
}

/// Full-viewport shader program bound to a render surface.
///
/// Exactly two states: unattached (no renderer, no frame loop, no listeners)
/// and attached (all of them). `attach` and `detach` are idempotent.
pub struct Visualizer<S: RenderSurface> {
    inner: Rc<RefCell<Inner<S>>>,
}

impl<S: RenderSurface> Visualizer<S> {
    /// Validates the shader text up front; a blank stage is rejected here and
    /// never at render time.
    pub fn new(
        vertex: &str,
        fragment: &str,
        surface: S,
        host: Rc<dyn Host>,
    ) -> Result<Self, VisualError> {
        let shaders = ShaderSource::new(vertex, fragment)?;
        Ok(Self::with_source(shaders, surface, host))
    }

    pub fn with_source(shaders: ShaderSource, surface: S, host: Rc<dyn Host>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                shaders,
                surface,
                host,
                attachment: Attachment::Unattached,
            })),
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.inner.borrow().attachment, Attachment::Attached(_))
    }

    /// Snapshot of the live uniforms; None while unattached.
    pub fn uniforms(&self) -> Option<Uniforms> {
        self.inner.borrow_mut().attached().map(|att| att.uniforms)
    }

    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms().and_then(|u| u.get(name))
    }

    pub fn frames_rendered(&self) -> u64 {
        self.inner
            .borrow_mut()
            .attached()
            .map_or(0, |att| att.frames_rendered)
    }

    /// Non-owning input handle for the sampling bridge.
    pub fn input(&self) -> VisualizerInput<S> {
        VisualizerInput {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn attach(&self) -> Result<(), VisualError> {
        let mut inner = self.inner.borrow_mut();
        if inner.attached().is_some() {
            log::debug!("[visual] attach ignored: already attached");
            return Ok(());
        }
        let host = inner.host.clone();
        let mut size = host.surface_size();
        if size.width == 0 || size.height == 0 {
            size = Resolution::new(FALLBACK_VIEWPORT[0], FALLBACK_VIEWPORT[1]);
        }

        let mut renderer = inner.surface.create_renderer(size)?;
        let mut resources = ResourceList::default();
        let mesh = match build_mesh(&mut renderer, &inner.shaders, &mut resources) {
            Ok(mesh) => mesh,
            Err(e) => {
                for id in resources.drain() {
                    renderer.release(id);
                }
                renderer.dispose();
                log::error!("[visual] attach failed: {}", e);
                return Err(e);
            }
        };
        let mut scene = Scene::new();
        scene.add_mesh(mesh);
        renderer.resize(size);

        let weak = Rc::downgrade(&self.inner);
        let token = FrameToken::default();
        let resize = {
            let weak = weak.clone();
            host.add_listener(
                EventKind::Resize,
                Box::new(move |event| on_event::<S>(&weak, event)),
            )
        };
        let pointer = {
            let weak = weak.clone();
            host.add_listener(
                EventKind::PointerMove,
                Box::new(move |event| on_event::<S>(&weak, event)),
            )
        };
        let frame = request_frame::<S>(&host, weak, token.clone());

        inner.attachment = Attachment::Attached(Box::new(Attached {
            renderer,
            camera: OrthoCamera::default(),
            scene,
            uniforms: Uniforms::new(size),
            resources,
            started_at: host.now(),
            frame: Some(frame),
            token,
            resize,
            pointer,
            frames_rendered: 0,
        }));
        log::info!("[visual] attached at {}x{}", size.width, size.height);
        Ok(())
    }

    pub fn detach(&self) {
        let mut inner = self.inner.borrow_mut();
        let host = inner.host.clone();
        let Attachment::Attached(mut att) =
            std::mem::replace(&mut inner.attachment, Attachment::Unattached)
        else {
            return;
        };
        att.token.cancel();
        if let Some(frame) = att.frame.take() {
            host.cancel_frame(frame);
        }
        host.remove_listener(att.resize);
        host.remove_listener(att.pointer);
        let removed = att
            .scene
            .clear(&mut |id| log::trace!("[visual] removed node {:?}", id));
        for id in att.resources.drain() {
            att.renderer.release(id);
        }
        att.renderer.dispose();
        log::info!(
            "[visual] detached after {} frames ({} nodes)",
            att.frames_rendered,
            removed
        );
    }

    /// Apply a named input. Only `meter` is recognised; writes while
    /// unattached are dropped.
    pub fn set_input(&self, name: &str, value: f32) {
        self.inner.borrow_mut().apply_input(name, value);
    }
}

impl<S: RenderSurface> Drop for Visualizer<S> {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Weak handle that forwards inputs to a visualizer if it still exists.
pub struct VisualizerInput<S: RenderSurface> {
    inner: Weak<RefCell<Inner<S>>>,
}

impl<S: RenderSurface> InputSink for VisualizerInput<S> {
    fn set_input(&self, name: &str, value: f32) {
        if let Some(inner) = self.inner.upgrade() {
            inner.borrow_mut().apply_input(name, value);
        }
    }
}

fn build_mesh<R: Renderer>(
    renderer: &mut R,
    shaders: &ShaderSource,
    resources: &mut ResourceList,
) -> Result<Mesh, VisualError> {
    let geometry = renderer.create_quad(&QuadGeometry::default())?;
    resources.track(geometry);
    let program = renderer.compile_program(shaders)?;
    resources.track(program);
    Ok(Mesh { geometry, program })
}

fn request_frame<S: RenderSurface>(
    host: &Rc<dyn Host>,
    weak: Weak<RefCell<Inner<S>>>,
    token: FrameToken,
) -> FrameHandle {
    host.request_frame(Box::new(move |ts| on_frame::<S>(weak, token, ts)))
}

fn on_frame<S: RenderSurface>(weak: Weak<RefCell<Inner<S>>>, token: FrameToken, ts: f64) {
    if token.is_cancelled() {
        return;
    }
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut inner = inner.borrow_mut();
    let host = inner.host.clone();
    let Some(att) = inner.attached() else {
        return;
    };
    // Queue the next refresh before drawing so a render error cannot stall the loop.
    att.frame = Some(request_frame::<S>(&host, weak, token));
    att.uniforms.time = (ts - att.started_at).max(0.0) as f32;
    match att.renderer.render(&att.scene, &att.camera, &att.uniforms) {
        Ok(()) => att.frames_rendered += 1,
        Err(e) => log::error!("[visual] frame failed: {}", e),
    }
}

fn on_event<S: RenderSurface>(weak: &Weak<RefCell<Inner<S>>>, event: HostEvent) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut inner = inner.borrow_mut();
    let host = inner.host.clone();
    let Some(att) = inner.attached() else {
        return;
    };
    match event {
        HostEvent::Resize => {
            let size = host.surface_size();
            att.renderer.resize(size);
            att.uniforms.resolution = size.as_vec2();
            log::debug!("[visual] resized to {}x{}", size.width, size.height);
        }
        HostEvent::PointerMove { x, y } => {
            att.uniforms.set_pointer(x, y, host.window_size());
        }
    }
}
