use super::scene::{OrthoCamera, QuadGeometry, ResourceId, Scene};
use super::uniforms::Uniforms;
use crate::error::{ShaderStage, VisualError};
use crate::host::Resolution;

/// Vertex and fragment program text, validated non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    vertex: String,
    fragment: String,
}

impl ShaderSource {
    pub fn new(vertex: &str, fragment: &str) -> Result<Self, VisualError> {
        if vertex.trim().is_empty() {
            return Err(VisualError::MissingShaderSource(ShaderStage::Vertex));
        }
        if fragment.trim().is_empty() {
            return Err(VisualError::MissingShaderSource(ShaderStage::Fragment));
        }
        Ok(Self {
            vertex: vertex.to_owned(),
            fragment: fragment.to_owned(),
        })
    }

    /// The bundled full-screen quad and glow programs.
    pub fn bundled() -> Self {
        Self {
            vertex: crate::DEFAULT_VERTEX_WGSL.to_owned(),
            fragment: crate::DEFAULT_FRAGMENT_WGSL.to_owned(),
        }
    }

    pub fn vertex(&self) -> &str {
        &self.vertex
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }
}

/// A GPU rendering context bound to one surface.
///
/// Resource ids are issued by the renderer and are only meaningful to it.
/// `release` on an unknown id is a no-op. After `dispose` the renderer must
/// not be used again.
pub trait Renderer {
    fn resize(&mut self, size: Resolution);
    fn create_quad(&mut self, geometry: &QuadGeometry) -> Result<ResourceId, VisualError>;
    fn compile_program(&mut self, source: &ShaderSource) -> Result<ResourceId, VisualError>;
    fn render(
        &mut self,
        scene: &Scene,
        camera: &OrthoCamera,
        uniforms: &Uniforms,
    ) -> Result<(), VisualError>;
    fn release(&mut self, id: ResourceId);
    fn dispose(&mut self);
}

/// Where a visualizer draws: produces a fresh renderer on every attach.
pub trait RenderSurface: 'static {
    type Renderer: Renderer + 'static;

    fn create_renderer(&mut self, size: Resolution) -> Result<Self::Renderer, VisualError>;
}
