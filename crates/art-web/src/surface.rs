use art_core::visual::{OrthoCamera, QuadGeometry, ResourceId, Scene};
use art_core::{RenderSurface, Renderer, Resolution, ShaderSource, Uniforms, VisualError};
use art_render::{GpuContext, QuadRenderer};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use web_sys as web;

/// Creates a fresh `<canvas>` inside the attachment element for every
/// renderer, so a detach leaves the element as it found it.
pub struct CanvasSurface {
    gpu: Rc<GpuContext>,
    document: web::Document,
    element: web::Element,
}

impl CanvasSurface {
    pub fn new(gpu: Rc<GpuContext>, document: web::Document, element: web::Element) -> Self {
        Self {
            gpu,
            document,
            element,
        }
    }
}

impl RenderSurface for CanvasSurface {
    type Renderer = CanvasRenderer;

    fn create_renderer(&mut self, size: Resolution) -> Result<CanvasRenderer, VisualError> {
        let canvas: web::HtmlCanvasElement = self
            .document
            .create_element("canvas")
            .map_err(|e| VisualError::Surface(format!("{:?}", e)))?
            .dyn_into()
            .map_err(|_| VisualError::Surface("not a canvas element".into()))?;
        canvas.set_width(size.width.max(1));
        canvas.set_height(size.height.max(1));
        let style = canvas.style();
        let _ = style.set_property("display", "block");
        let _ = style.set_property("width", "100%");
        let _ = style.set_property("height", "100%");
        self.element
            .append_child(&canvas)
            .map_err(|e| VisualError::Surface(format!("{:?}", e)))?;

        let surface = match self
            .gpu
            .instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
        {
            Ok(surface) => surface,
            Err(e) => {
                canvas.remove();
                return Err(VisualError::Surface(e.to_string()));
            }
        };
        match QuadRenderer::new(self.gpu.clone(), surface, size) {
            Ok(inner) => {
                log::debug!("[visual] canvas {}x{} ({:?})", size.width, size.height, inner.format());
                Ok(CanvasRenderer { inner, canvas })
            }
            Err(e) => {
                canvas.remove();
                Err(e)
            }
        }
    }
}

pub struct CanvasRenderer {
    inner: QuadRenderer,
    canvas: web::HtmlCanvasElement,
}

impl Renderer for CanvasRenderer {
    fn resize(&mut self, size: Resolution) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.canvas.set_width(size.width);
        self.canvas.set_height(size.height);
        self.inner.resize(size);
    }

    fn create_quad(&mut self, geometry: &QuadGeometry) -> Result<ResourceId, VisualError> {
        self.inner.create_quad(geometry)
    }

    fn compile_program(&mut self, source: &ShaderSource) -> Result<ResourceId, VisualError> {
        self.inner.compile_program(source)
    }

    fn render(
        &mut self,
        scene: &Scene,
        camera: &OrthoCamera,
        uniforms: &Uniforms,
    ) -> Result<(), VisualError> {
        self.inner.render(scene, camera, uniforms)
    }

    fn release(&mut self, id: ResourceId) {
        self.inner.release(id);
    }

    fn dispose(&mut self) {
        self.inner.dispose();
        self.canvas.remove();
    }
}
