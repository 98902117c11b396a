use crate::{
    data_structures::{
        model::{ModelVertex, Vertex},
        texture::Texture,
    },
    gpu::{BlendMode, ProgramDesc, VertexLayout},
};

const POSITION_ONLY: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

/// Vertex buffer layout for a program: the full vertex, or just its position
/// read with the full vertex stride.
pub fn vertex_layout(layout: VertexLayout) -> wgpu::VertexBufferLayout<'static> {
    match layout {
        VertexLayout::Full => ModelVertex::desc(),
        VertexLayout::PositionOnly => wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &POSITION_ONLY,
        },
    }
}

pub fn blend_state(blend: BlendMode) -> wgpu::BlendState {
    match blend {
        BlendMode::Opaque => wgpu::BlendState {
            alpha: wgpu::BlendComponent::REPLACE,
            color: wgpu::BlendComponent::REPLACE,
        },
        BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
    }
}

/// Builds the pipeline for `desc` from an already validated shader module.
///
/// Front faces wind clockwise, matching the left-handed projection. Alpha
/// blended pipelines test depth but leave it untouched.
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    desc: &ProgramDesc<'_>,
) -> wgpu::RenderPipeline {
    let vertex_layouts = [vertex_layout(desc.layout)];
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(desc.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(desc.vertex_entry),
            buffers: &vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(desc.fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(blend_state(desc.blend)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Cw,
            cull_mode: desc.cull_back_faces.then_some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: Some(desc.blend == BlendMode::Opaque),
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
