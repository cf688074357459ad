use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use wgpu::util::StagingBelt;

use crate::compile::ShaderStage;
use crate::error::{DrawError, ProgramLinkError, UnknownAttributeError};
use crate::geometry::{GeometryBuffer, GeometryStore, ResolvedSlice};
use crate::gpu::pipeline::{self, FaceCulling, PipelineKey, ProgramLayouts, VertexSlot};
use crate::gpu::GpuContext;
use crate::link::{link_interface, AttributeLocation, LinkedInterface, UniformLocation};
use crate::math::Matrix;
use crate::reflect::{OpaqueKind, ValueType};
use crate::types::StageKind;
use crate::uniforms::{self, UniformStore};

/// A linked vertex + fragment pair with its resolved binding tables, uniform
/// storage, bound geometry and textures.
///
/// The program owns both stages; they are released together with it.
pub struct Program {
    label: String,
    interface: LinkedInterface,
    vertex: ShaderStage,
    fragment: ShaderStage,
    layouts: ProgramLayouts,
    uniforms: UniformStore,
    samplers: BTreeMap<(u32, u32), wgpu::Sampler>,
    textures: BTreeMap<(u32, u32), wgpu::TextureView>,
    bind_groups: Option<Vec<wgpu::BindGroup>>,
    geometry: GeometryStore,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    culling: FaceCulling,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("label", &self.label)
            .field("attributes", &self.interface.attributes)
            .field("uniforms", &self.interface.uniforms)
            .finish_non_exhaustive()
    }
}

impl Program {
    /// Links `vertex` and `fragment` and resolves the requested names.
    ///
    /// Every name in `attributes` and `uniforms` ends up in the binding
    /// tables; names the program doesn't use map to `None`.
    pub fn link(
        context: &GpuContext,
        label: impl Into<String>,
        vertex: ShaderStage,
        fragment: ShaderStage,
        attributes: &[&str],
        uniforms: &[&str],
    ) -> Result<Self, ProgramLinkError> {
        let label = label.into();
        let fail = |diagnostic: String| ProgramLinkError {
            label: label.clone(),
            diagnostic,
        };

        if vertex.kind != StageKind::Vertex || fragment.kind != StageKind::Fragment {
            return Err(fail(format!(
                "expected a vertex and a fragment stage, got {} and {}",
                vertex.kind, fragment.kind
            )));
        }

        let interface = link_interface(&vertex.interface, &fragment.interface, attributes, uniforms)
            .map_err(&fail)?;

        let (created, error) = context.with_error_scope(|_| {
            let layouts = pipeline::create_layouts(context, &label, &interface);
            let uniforms = UniformStore::new(context, &label, &interface.blocks);
            let samplers = interface
                .opaque
                .iter()
                .filter(|binding| binding.kind == OpaqueKind::Sampler)
                .map(|binding| {
                    let sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
                        label: binding.name.as_deref(),
                        address_mode_u: wgpu::AddressMode::ClampToEdge,
                        address_mode_v: wgpu::AddressMode::ClampToEdge,
                        address_mode_w: wgpu::AddressMode::ClampToEdge,
                        mag_filter: wgpu::FilterMode::Nearest,
                        min_filter: wgpu::FilterMode::Nearest,
                        ..Default::default()
                    });
                    ((binding.group, binding.binding), sampler)
                })
                .collect::<BTreeMap<_, _>>();
            (layouts, uniforms, samplers)
        });
        if let Some(error) = error {
            // Dropping `created` and the stages releases everything made so far.
            drop(created);
            return Err(fail(error.to_string()));
        }
        let (layouts, uniform_store, samplers) = created;

        tracing::debug!(
            program = %label,
            attributes = ?interface.attributes,
            uniforms = ?interface.uniforms,
            "linked program"
        );

        Ok(Self {
            label,
            interface,
            vertex,
            fragment,
            layouts,
            uniforms: uniform_store,
            samplers,
            textures: BTreeMap::new(),
            bind_groups: None,
            geometry: GeometryStore::default(),
            pipelines: HashMap::new(),
            culling: FaceCulling::None,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn interface(&self) -> &LinkedInterface {
        &self.interface
    }

    pub fn attribute_location(&self, name: &str) -> Option<AttributeLocation> {
        self.interface.attribute(name)
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.interface.uniform(name)
    }

    #[cfg(test)]
    pub(crate) fn has_bind_groups(&self) -> bool {
        self.bind_groups.is_some()
    }

    pub fn set_face_culling(&mut self, culling: FaceCulling) {
        self.culling = culling;
    }

    /// Uploads `geometry` and points each of its slices' attributes at it.
    ///
    /// Binding the same attribute set again rewrites the existing buffer;
    /// locations are never looked up again. The copy is recorded ahead of the
    /// next draw, so draws already recorded keep the previous contents.
    pub fn bind_geometry(
        &mut self,
        context: &GpuContext,
        geometry: &GeometryBuffer,
    ) -> Result<(), UnknownAttributeError> {
        let resolved = geometry
            .slices()
            .iter()
            .map(|slice| {
                self.interface
                    .attribute(&slice.name)
                    .map(|AttributeLocation(location)| ResolvedSlice {
                        location,
                        slice: slice.clone(),
                    })
                    .ok_or_else(|| UnknownAttributeError {
                        program: self.label.clone(),
                        name: slice.name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.geometry
            .bind(context, &self.label, resolved, geometry.data());
        tracing::trace!(
            program = %self.label,
            buffers = self.geometry.buffer_count(),
            floats = geometry.data().len(),
            "bound geometry"
        );
        Ok(())
    }

    /// Shorthand for a tightly packed single-attribute upload.
    pub fn upload(
        &mut self,
        context: &GpuContext,
        attribute: &str,
        data: &[f32],
        components: u32,
    ) -> Result<(), UnknownAttributeError> {
        self.bind_geometry(
            context,
            &GeometryBuffer::packed(attribute, data.to_vec(), components),
        )
    }

    pub fn set_scalar(&mut self, name: &str, value: f32) {
        self.write_uniform(name, |ty| uniforms::encode_scalar(ty, value));
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.write_uniform(name, |ty| uniforms::encode_int(ty, value));
    }

    pub fn set_vector(&mut self, name: &str, value: &[f32]) {
        self.write_uniform(name, |ty| uniforms::encode_vector(ty, value));
    }

    pub fn set_matrix<const N: usize>(&mut self, name: &str, value: &Matrix<N>) {
        self.write_uniform(name, |ty| uniforms::encode_matrix(ty, value));
    }

    /// Points a texture uniform at `view`. Unknown names are ignored like any
    /// other absent uniform.
    pub fn bind_texture(&mut self, name: &str, view: &wgpu::TextureView) {
        match self.interface.uniform(name) {
            Some(UniformLocation::Texture { group, binding }) => {
                // Rebinding the view already in place keeps the bind groups.
                if self.textures.get(&(group, binding)) != Some(view) {
                    self.textures.insert((group, binding), view.clone());
                    self.bind_groups = None;
                }
            }
            Some(UniformLocation::Value { .. }) => {
                tracing::warn!(program = %self.label, uniform = name, "not a texture uniform; ignoring");
            }
            None => {}
        }
    }

    fn write_uniform(&mut self, name: &str, encode: impl FnOnce(ValueType) -> Result<Vec<u8>, String>) {
        // Absent or never-requested uniforms are a silent no-op.
        let Some(location) = self.interface.uniform(name) else {
            return;
        };
        let UniformLocation::Value {
            group,
            binding,
            offset,
            ty,
        } = location
        else {
            tracing::warn!(program = %self.label, uniform = name, "cannot write a value into a texture uniform");
            return;
        };
        match encode(ty) {
            Ok(bytes) => self.uniforms.write(group, binding, offset, &bytes),
            Err(reason) => {
                tracing::warn!(program = %self.label, uniform = name, %reason, "uniform write dropped");
            }
        }
    }

    /// Validates a draw and records everything that must precede its render
    /// pass. Nothing is recorded when validation fails.
    pub(crate) fn prepare(
        &mut self,
        context: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        staging: &mut StagingBelt,
        format: wgpu::TextureFormat,
        vertices: &Range<u32>,
    ) -> Result<PipelineKey, DrawError> {
        let mut slots = Vec::with_capacity(self.interface.vertex_inputs.len());
        let mut available = u32::MAX;
        for input in &self.interface.vertex_inputs {
            let source = self
                .geometry
                .source(input.location)
                .ok_or_else(|| DrawError::MissingGeometry {
                    program: self.label.clone(),
                    location: input.location,
                })?;
            available = available.min(source.slice.slice.available_vertices(source.byte_len));
            slots.push(VertexSlot {
                location: input.location,
                stride: source.slice.slice.effective_stride(),
                format: source.slice.slice.vertex_format(),
            });
        }
        if vertices.end > available {
            return Err(DrawError::VertexOverrun {
                program: self.label.clone(),
                start: vertices.start,
                end: vertices.end,
                available,
            });
        }

        let key = PipelineKey {
            format,
            culling: self.culling,
            vertex: slots,
        };
        if !self.pipelines.contains_key(&key) {
            let pipeline = pipeline::create_pipeline(
                context,
                &self.label,
                &self.layouts.pipeline,
                &self.vertex.module,
                &self.fragment.module,
                &key,
            )
            .map_err(|message| DrawError::Pipeline {
                program: self.label.clone(),
                message,
            })?;
            self.pipelines.insert(key.clone(), pipeline);
        }

        if self.bind_groups.is_none() {
            self.bind_groups = Some(self.create_bind_groups(context)?);
        }

        self.geometry.flush(context, encoder, staging);
        self.uniforms.flush(context, encoder, staging);
        Ok(key)
    }

    fn create_bind_groups(&self, context: &GpuContext) -> Result<Vec<wgpu::BindGroup>, DrawError> {
        let mut groups = Vec::with_capacity(self.layouts.groups.len());
        for (group, layout) in (0u32..).zip(&self.layouts.groups) {
            let mut entries = Vec::new();
            for block in self.interface.blocks.iter().filter(|block| block.group == group) {
                if let Some(buffer) = self.uniforms.buffer(block.group, block.binding) {
                    entries.push(wgpu::BindGroupEntry {
                        binding: block.binding,
                        resource: buffer.as_entire_binding(),
                    });
                }
            }
            for binding in self.interface.opaque.iter().filter(|binding| binding.group == group) {
                let slot = (binding.group, binding.binding);
                let resource = match binding.kind {
                    OpaqueKind::Texture => match self.textures.get(&slot) {
                        Some(view) => wgpu::BindingResource::TextureView(view),
                        None => {
                            return Err(DrawError::UnboundTexture {
                                program: self.label.clone(),
                                name: binding.name.clone().unwrap_or_default(),
                            })
                        }
                    },
                    OpaqueKind::Sampler => match self.samplers.get(&slot) {
                        Some(sampler) => wgpu::BindingResource::Sampler(sampler),
                        None => continue,
                    },
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: binding.binding,
                    resource,
                });
            }
            groups.push(context.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&self.label),
                layout,
                entries: &entries,
            }));
        }
        Ok(groups)
    }

    /// Records the draw into an open pass. `prepare` must have succeeded with
    /// the same `key` first.
    pub(crate) fn record(&self, pass: &mut wgpu::RenderPass<'_>, key: &PipelineKey, vertices: Range<u32>) {
        let Some(pipeline) = self.pipelines.get(key) else {
            return;
        };
        pass.set_pipeline(pipeline);
        if let Some(groups) = self.bind_groups.as_ref() {
            for (index, group) in (0u32..).zip(groups) {
                pass.set_bind_group(index, group, &[]);
            }
        }
        for (slot, vertex) in (0u32..).zip(&key.vertex) {
            if let Some(source) = self.geometry.source(vertex.location) {
                let offset = u64::from(source.slice.slice.offset);
                pass.set_vertex_buffer(slot, source.buffer.slice(offset..source.byte_len.max(offset)));
            }
        }
        pass.draw(vertices, 0..1);
    }
}
