//! The wgpu device wrapper.
//!
//! [`Context`] owns the surface, device, queue, depth buffer, samplers,
//! projection and the shared bind group layouts, and implements
//! [`gpu::Device`](crate::gpu::Device) for the scene.

use std::{num::NonZeroU64, ops::Range, sync::Arc};

use cgmath::Matrix4;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::Projection,
    config::SceneConfig,
    data_structures::texture::{self, Texture},
    error::{Result, SceneError},
    gpu::{self, BindingsDesc, BufferContents, BufferDesc, BufferKind, ProgramDesc, RenderTarget, SamplerKind, TextureDesc},
    pipelines::{basic::mk_render_pipeline, layout},
    shader::{CAMERA_CONSTANTS_SIZE, LIGHT_CONSTANTS_SIZE, MATERIAL_CONSTANTS_SIZE, OBJECT_CONSTANTS_SIZE},
};

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub projection: Projection,
    is_surface_configured: bool,
    constants_layout: wgpu::BindGroupLayout,
    textures_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    linear_sampler: wgpu::Sampler,
    anisotropic_sampler: wgpu::Sampler,
}

impl Context {
    pub async fn new(window: Arc<Window>, scene: &SceneConfig) -> Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| SceneError::creation("surface", e))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| SceneError::creation("adapter", e))?;
        let info = adapter.get_info();
        log::info!("Using {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("scene device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(|e| SceneError::creation("device", e))?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders write linear colour and rely on an sRGB surface for the conversion.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| SceneError::creation("surface", "no supported surface formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let is_surface_configured = size.width > 0 && size.height > 0;
        if is_surface_configured {
            surface.configure(&device, &config);
        }

        let projection = Projection::new(
            config.width,
            config.height,
            scene.fovy,
            scene.screen_near,
            scene.screen_depth,
        );
        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");

        let constants_layout = layout::constants_layout(
            &device,
            OBJECT_CONSTANTS_SIZE,
            CAMERA_CONSTANTS_SIZE,
            LIGHT_CONSTANTS_SIZE,
            MATERIAL_CONSTANTS_SIZE,
        );
        let textures_layout = layout::textures_layout(&device);
        let pipeline_layout = mk_pipeline_layout(&device, &constants_layout, &textures_layout);
        let linear_sampler = texture::create_linear_sampler(&device);
        let anisotropic_sampler = texture::create_anisotropic_sampler(&device);

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            projection,
            is_surface_configured,
            constants_layout,
            textures_layout,
            pipeline_layout,
            linear_sampler,
            anisotropic_sampler,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Reconfigures the swapchain, depth buffer and projection. A zero size
    /// (minimised window) only suspends rendering.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            self.is_surface_configured = false;
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.projection.resize(width, height);
        self.surface.configure(&self.device, &self.config);
        self.depth_texture = Texture::create_depth_texture(
            &self.device,
            [self.config.width, self.config.height],
            "depth_texture",
        );
        self.is_surface_configured = true;
    }
}

fn mk_pipeline_layout(
    device: &wgpu::Device,
    constants_layout: &wgpu::BindGroupLayout,
    textures_layout: &wgpu::BindGroupLayout,
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Scene Pipeline Layout"),
        bind_group_layouts: &[Some(constants_layout), Some(textures_layout)],
        immediate_size: 0,
    })
}

/// Compiles the module and builds the pipeline inside a validation scope, so
/// WGSL errors and interface mismatches come back as
/// [`SceneError::ShaderCompile`] instead of reaching the uncaptured error
/// handler.
fn build_program(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    desc: &ProgramDesc<'_>,
) -> Result<wgpu::RenderPipeline> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(desc.label),
        source: wgpu::ShaderSource::Wgsl(desc.source.into()),
    });
    let pipeline = mk_render_pipeline(device, layout, &module, color_format, desc);
    match futures::executor::block_on(scope.pop()) {
        Some(error) => Err(SceneError::ShaderCompile {
            label: desc.label.to_string(),
            message: error.to_string(),
        }),
        None => Ok(pipeline),
    }
}

fn sized_binding(buffer: &wgpu::Buffer, size: u64) -> wgpu::BindingResource<'_> {
    wgpu::BindingResource::Buffer(wgpu::BufferBinding {
        buffer,
        offset: 0,
        size: NonZeroU64::new(size),
    })
}

impl gpu::Device for Context {
    type Buffer = wgpu::Buffer;
    type Texture = Texture;
    type Program = wgpu::RenderPipeline;
    type Bindings = wgpu::BindGroup;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<wgpu::Buffer> {
        desc.validate()?;
        let usage = match desc.kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Constant => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        };
        log::debug!("Creating buffer {} ({} bytes)", desc.label, desc.size());
        Ok(match desc.contents {
            BufferContents::Init(contents) => {
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(desc.label),
                    contents,
                    usage,
                })
            }
            BufferContents::Zeroed(size) => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.label),
                size,
                usage,
                mapped_at_creation: false,
            }),
        })
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    fn create_texture(&self, desc: &TextureDesc<'_>) -> Result<Texture> {
        log::debug!("Creating texture {} ({}x{})", desc.label, desc.width, desc.height);
        Texture::from_desc(&self.device, &self.queue, desc)
    }

    fn create_program(&self, desc: &ProgramDesc<'_>) -> Result<wgpu::RenderPipeline> {
        log::debug!("Compiling program {}", desc.label);
        build_program(&self.device, &self.pipeline_layout, self.config.format, desc)
    }

    fn create_bindings(
        &self,
        label: &str,
        _program: &wgpu::RenderPipeline,
        desc: &BindingsDesc<'_, Self>,
    ) -> Result<wgpu::BindGroup> {
        let group = match desc {
            BindingsDesc::Constants {
                object,
                object_size,
                camera,
                light,
                material,
                material_size,
            } => self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &self.constants_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: sized_binding(object, *object_size),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: camera.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: light.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: sized_binding(material, *material_size),
                    },
                ],
                label: Some(label),
            }),
            BindingsDesc::Textures {
                diffuse,
                cubemap,
                normal_map,
                sampler,
            } => {
                let sampler = match sampler {
                    SamplerKind::Linear => &self.linear_sampler,
                    SamplerKind::Anisotropic => &self.anisotropic_sampler,
                };
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &self.textures_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&diffuse.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&cubemap.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(&normal_map.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                    ],
                    label: Some(label),
                })
            }
        };
        Ok(group)
    }

    fn constant_alignment(&self) -> u64 {
        self.device.limits().min_uniform_buffer_offset_alignment as u64
    }

    fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection.calc_matrix()
    }

    fn render_frame(
        &self,
        clear: wgpu::Color,
        draw: &mut dyn FnMut(&mut dyn RenderTarget<Self>) -> Result<()>,
    ) -> Result<()> {
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = match self.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture) => texture,
            wgpu::CurrentSurfaceTexture::Suboptimal(texture) => {
                log::debug!("Surface is suboptimal");
                texture
            }
            wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Outdated => {
                return Err(SceneError::Surface("surface is outdated".to_string()));
            }
            wgpu::CurrentSurfaceTexture::Lost => {
                return Err(SceneError::Surface("surface was lost".to_string()));
            }
            wgpu::CurrentSurfaceTexture::Validation => {
                return Err(SceneError::Surface("surface texture failed validation".to_string()));
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            let mut target = PassTarget { pass: render_pass };
            draw(&mut target)?;
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// Records into the frame's render pass.
struct PassTarget<'p> {
    pass: wgpu::RenderPass<'p>,
}

impl RenderTarget<Context> for PassTarget<'_> {
    fn set_program(&mut self, program: &wgpu::RenderPipeline) {
        self.pass.set_pipeline(program);
    }

    fn set_geometry(&mut self, vertices: &wgpu::Buffer, indices: &wgpu::Buffer) {
        self.pass.set_vertex_buffer(0, vertices.slice(..));
        self.pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
    }

    fn set_bindings(&mut self, group: u32, bindings: &wgpu::BindGroup, offsets: &[u32]) {
        self.pass.set_bind_group(group, bindings, offsets);
    }

    fn draw_indexed(&mut self, indices: Range<u32>) {
        self.pass.draw_indexed(indices, 0, 0..1);
    }
}
