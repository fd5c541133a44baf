//! wgpu implementation of the visualizer's `Renderer`: one full-screen quad
//! per mesh, drawn with a vertex/fragment program pair and a single uniform
//! block.

mod uniforms;

pub use uniforms::UniformBlock;

use art_core::visual::{
    OrthoCamera, QuadGeometry, QuadVertex, Renderer, ResourceId, Scene, ShaderSource,
};
use art_core::{Resolution, Uniforms, VisualError};
use fnv::FnvHashMap;
use std::rc::Rc;
use wgpu::util::DeviceExt;

/// Adapter, device and queue acquired once up front so that attaching a
/// visualizer never has to wait on the GPU.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn new(
        instance: wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> anyhow::Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No GPU adapter"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    // Default limits keep older WebGPU implementations happy
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    label: None,
                },
                None,
            )
            .await
            .map_err(|e| anyhow::anyhow!(format!("request_device error: {:?}", e)))?;
        // Shader compile failures arrive here rather than panicking.
        device.on_uncaptured_error(Box::new(|e| log::error!("[gpu] {}", e)));
        let info = adapter.get_info();
        log::info!("[gpu] adapter: {} ({:?})", info.name, info.backend);
        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

enum GpuResource {
    Quad {
        vertices: wgpu::Buffer,
        indices: wgpu::Buffer,
        index_count: u32,
    },
    Program {
        pipeline: wgpu::RenderPipeline,
        uniforms: wgpu::Buffer,
        bind_group: wgpu::BindGroup,
    },
}

pub struct QuadRenderer {
    gpu: Rc<GpuContext>,
    surface: Option<wgpu::Surface<'static>>,
    config: wgpu::SurfaceConfiguration,
    uniform_layout: wgpu::BindGroupLayout,
    resources: FnvHashMap<u32, GpuResource>,
    next_id: u32,
    clear_color: wgpu::Color,
}

impl QuadRenderer {
    pub fn new(
        gpu: Rc<GpuContext>,
        surface: wgpu::Surface<'static>,
        size: Resolution,
    ) -> Result<Self, VisualError> {
        let caps = surface.get_capabilities(&gpu.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| {
                matches!(
                    f,
                    wgpu::TextureFormat::Bgra8UnormSrgb | wgpu::TextureFormat::Rgba8UnormSrgb
                )
            })
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| VisualError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);

        let uniform_layout = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("quad_bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        Ok(Self {
            gpu,
            surface: Some(surface),
            config,
            uniform_layout,
            resources: FnvHashMap::default(),
            next_id: 0,
            clear_color: wgpu::Color::BLACK,
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn insert(&mut self, resource: GpuResource) -> ResourceId {
        self.next_id += 1;
        self.resources.insert(self.next_id, resource);
        ResourceId(self.next_id)
    }
}

impl Renderer for QuadRenderer {
    fn resize(&mut self, size: Resolution) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if size.width == self.config.width && size.height == self.config.height {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.gpu.device, &self.config);
        }
    }

    fn create_quad(&mut self, geometry: &QuadGeometry) -> Result<ResourceId, VisualError> {
        let device = &self.gpu.device;
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_vertices"),
            contents: bytemuck::cast_slice(&geometry.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_indices"),
            contents: bytemuck::cast_slice(&QuadGeometry::INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Ok(self.insert(GpuResource::Quad {
            vertices,
            indices,
            index_count: QuadGeometry::INDICES.len() as u32,
        }))
    }

    fn compile_program(&mut self, source: &ShaderSource) -> Result<ResourceId, VisualError> {
        let device = &self.gpu.device;
        let vs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quad_vs"),
            source: wgpu::ShaderSource::Wgsl(source.vertex().into()),
        });
        let fs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quad_fs"),
            source: wgpu::ShaderSource::Wgsl(source.fragment().into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad_pl"),
            bind_group_layouts: &[&self.uniform_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("quad_pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &vs,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fs,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            cache: None,
            multiview: None,
        });
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quad_uniforms"),
            size: std::mem::size_of::<UniformBlock>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad_bg"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });
        Ok(self.insert(GpuResource::Program {
            pipeline,
            uniforms,
            bind_group,
        }))
    }

    fn render(
        &mut self,
        scene: &Scene,
        camera: &OrthoCamera,
        uniforms: &Uniforms,
    ) -> Result<(), VisualError> {
        let Some(surface) = &self.surface else {
            return Err(VisualError::Render("renderer disposed".into()));
        };
        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(&self.gpu.device, &self.config);
                return Ok(());
            }
            Err(e) => return Err(VisualError::Render(e.to_string())),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let block = UniformBlock::new(camera, uniforms);

        let mut meshes = Vec::new();
        scene.for_each_mesh(|m| meshes.push(*m));

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quad_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            for mesh in &meshes {
                let (
                    Some(GpuResource::Quad {
                        vertices,
                        indices,
                        index_count,
                    }),
                    Some(GpuResource::Program {
                        pipeline,
                        uniforms,
                        bind_group,
                    }),
                ) = (
                    self.resources.get(&mesh.geometry.0),
                    self.resources.get(&mesh.program.0),
                )
                else {
                    log::warn!("[gpu] mesh references released resources");
                    continue;
                };
                self.gpu
                    .queue
                    .write_buffer(uniforms, 0, bytemuck::bytes_of(&block));
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, bind_group, &[]);
                rpass.set_vertex_buffer(0, vertices.slice(..));
                rpass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
                rpass.draw_indexed(0..*index_count, 0, 0..1);
            }
        }
        self.gpu.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn release(&mut self, id: ResourceId) {
        match self.resources.remove(&id.0) {
            Some(GpuResource::Quad {
                vertices, indices, ..
            }) => {
                vertices.destroy();
                indices.destroy();
            }
            Some(GpuResource::Program { uniforms, .. }) => uniforms.destroy(),
            None => {}
        }
    }

    fn dispose(&mut self) {
        let ids: Vec<u32> = self.resources.keys().copied().collect();
        for id in ids {
            self.release(ResourceId(id));
        }
        self.surface = None;
        log::debug!("[gpu] renderer disposed");
    }
}
