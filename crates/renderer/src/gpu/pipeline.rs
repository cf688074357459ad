use crate::link::LinkedInterface;
use crate::reflect::OpaqueKind;

use super::context::GpuContext;

/// Which triangle faces to discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FaceCulling {
    #[default]
    None,
    Back,
    Front,
}

impl FaceCulling {
    fn face(self) -> Option<wgpu::Face> {
        match self {
            FaceCulling::None => None,
            FaceCulling::Back => Some(wgpu::Face::Back),
            FaceCulling::Front => Some(wgpu::Face::Front),
        }
    }
}

/// One vertex buffer slot as the pipeline sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct VertexSlot {
    pub location: u32,
    pub stride: u32,
    pub format: wgpu::VertexFormat,
}

/// Everything a render pipeline depends on besides the program itself.
///
/// Pipelines are built lazily the first time a key is drawn with, because the
/// vertex layout is only known once geometry is bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub format: wgpu::TextureFormat,
    pub culling: FaceCulling,
    pub vertex: Vec<VertexSlot>,
}

pub(crate) struct ProgramLayouts {
    pub groups: Vec<wgpu::BindGroupLayout>,
    pub pipeline: wgpu::PipelineLayout,
}

/// Bind group layouts for every group index up to the highest one in use.
/// Gaps get empty layouts so group indices line up with the shader.
pub(crate) fn create_layouts(
    context: &GpuContext,
    label: &str,
    interface: &LinkedInterface,
) -> ProgramLayouts {
    let group_count = interface.max_group().map_or(0, |max| max + 1);
    let groups: Vec<wgpu::BindGroupLayout> = (0..group_count)
        .map(|group| {
            let mut entries: Vec<wgpu::BindGroupLayoutEntry> = interface
                .blocks
                .iter()
                .filter(|block| block.group == group)
                .map(|block| wgpu::BindGroupLayoutEntry {
                    binding: block.binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                })
                .collect();
            entries.extend(
                interface
                    .opaque
                    .iter()
                    .filter(|binding| binding.group == group)
                    .map(|binding| wgpu::BindGroupLayoutEntry {
                        binding: binding.binding,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: match binding.kind {
                            OpaqueKind::Texture => wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            OpaqueKind::Sampler => {
                                wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                            }
                        },
                        count: None,
                    }),
            );
            context
                .device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(label),
                    entries: &entries,
                })
        })
        .collect();

    let group_refs: Vec<&wgpu::BindGroupLayout> = groups.iter().collect();
    let pipeline = context
        .device
        .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &group_refs,
            push_constant_ranges: &[],
        });

    ProgramLayouts { groups, pipeline }
}

pub(crate) fn create_pipeline(
    context: &GpuContext,
    label: &str,
    layout: &wgpu::PipelineLayout,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
    key: &PipelineKey,
) -> Result<wgpu::RenderPipeline, String> {
    let attributes: Vec<[wgpu::VertexAttribute; 1]> = key
        .vertex
        .iter()
        .map(|slot| {
            [wgpu::VertexAttribute {
                format: slot.format,
                offset: 0,
                shader_location: slot.location,
            }]
        })
        .collect();
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = key
        .vertex
        .iter()
        .zip(&attributes)
        .map(|(slot, attributes)| wgpu::VertexBufferLayout {
            array_stride: u64::from(slot.stride),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();

    let (pipeline, error) = context.with_error_scope(|device| {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: vertex_module,
                entry_point: Some("main"),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: key.culling.face(),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        })
    });

    match error {
        Some(error) => Err(error.to_string()),
        None => {
            tracing::debug!(
                program = label,
                format = ?key.format,
                slots = key.vertex.len(),
                "built render pipeline"
            );
            Ok(pipeline)
        }
    }
}
