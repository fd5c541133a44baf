use art_core::{RenderSurface, Resolution, VisualError};
use art_render::{GpuContext, QuadRenderer};
use std::rc::Rc;
use std::sync::Arc;
use winit::window::Window;

/// Renders into the main window. Each attach creates a new `wgpu::Surface`;
/// the previous one is dropped when its renderer is disposed.
pub struct WindowSurface {
    gpu: Rc<GpuContext>,
    window: Arc<Window>,
}

impl WindowSurface {
    pub fn new(gpu: Rc<GpuContext>, window: Arc<Window>) -> Self {
        Self { gpu, window }
    }
}

impl RenderSurface for WindowSurface {
    type Renderer = QuadRenderer;

    fn create_renderer(&mut self, size: Resolution) -> Result<QuadRenderer, VisualError> {
        let surface = self
            .gpu
            .instance
            .create_surface(self.window.clone())
            .map_err(|e| VisualError::Surface(e.to_string()))?;
        QuadRenderer::new(self.gpu.clone(), surface, size)
    }
}
