//! Interface reflection over a validated naga module.
//!
//! GLSL stage inputs and outputs surface in naga as entry-point arguments and
//! result struct members carrying `Binding::Location`. Uniform blocks are
//! globals in the `Uniform` address space whose struct members carry the
//! std140 offsets naga computed. Textures and samplers are `Handle` globals.

use serde::Serialize;
use wgpu::naga::{self, AddressSpace, Binding, ImageClass, ImageDimension, ScalarKind, TypeInner};

use crate::types::StageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Float,
    Int,
    Uint,
    Bool,
}

/// Shape of a value crossing a stage boundary or living in a uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum ValueType {
    Scalar { scalar: ScalarType },
    Vector { scalar: ScalarType, size: u8 },
    Matrix { columns: u8, rows: u8 },
    /// Arrays, nested structs and anything else the channel cannot write.
    Other,
}

impl ValueType {
    /// Number of scalar components, for scalars and vectors.
    pub fn components(&self) -> Option<u8> {
        match self {
            ValueType::Scalar { .. } => Some(1),
            ValueType::Vector { size, .. } => Some(*size),
            _ => None,
        }
    }
}

/// A located stage input or output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceVar {
    pub name: Option<String>,
    pub location: u32,
    #[serde(rename = "type")]
    pub ty: ValueType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    #[serde(rename = "type")]
    pub ty: ValueType,
}

/// Layout of one uniform block as the shader sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniformBlockLayout {
    pub name: Option<String>,
    pub group: u32,
    pub binding: u32,
    /// Byte span of the block, already padded by naga.
    pub size: u32,
    pub members: Vec<UniformMember>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpaqueKind {
    Texture,
    Sampler,
}

/// A texture or sampler binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpaqueBinding {
    pub name: Option<String>,
    pub group: u32,
    pub binding: u32,
    pub kind: OpaqueKind,
}

/// Everything a single stage exposes to the linker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageInterface {
    pub kind: StageKind,
    pub inputs: Vec<InterfaceVar>,
    pub outputs: Vec<InterfaceVar>,
    pub blocks: Vec<UniformBlockLayout>,
    pub opaque: Vec<OpaqueBinding>,
}

pub(crate) fn reflect(kind: StageKind, module: &naga::Module) -> Result<StageInterface, String> {
    let stage = kind.naga_stage();
    let entry = module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage)
        .ok_or_else(|| format!("no {kind} entry point found in module"))?;

    let mut inputs = Vec::new();
    for argument in &entry.function.arguments {
        collect_located(
            module,
            argument.name.as_deref(),
            argument.ty,
            argument.binding.as_ref(),
            &mut inputs,
        );
    }

    let mut outputs = Vec::new();
    if let Some(result) = entry.function.result.as_ref() {
        collect_located(module, None, result.ty, result.binding.as_ref(), &mut outputs);
    }

    inputs.sort_by_key(|var| var.location);
    outputs.sort_by_key(|var| var.location);

    let mut blocks = Vec::new();
    let mut opaque = Vec::new();
    for (_, global) in module.global_variables.iter() {
        let Some(slot) = global.binding.as_ref() else {
            continue;
        };
        let inner = &module.types[global.ty].inner;
        match global.space {
            AddressSpace::Uniform => {
                blocks.push(block_layout(module, global.name.clone(), slot, inner));
            }
            AddressSpace::Handle => {
                let kind = match inner {
                    TypeInner::Image {
                        dim: ImageDimension::D2,
                        arrayed: false,
                        class:
                            ImageClass::Sampled {
                                kind: ScalarKind::Float,
                                multi: false,
                            },
                    } => OpaqueKind::Texture,
                    TypeInner::Sampler { comparison: false } => OpaqueKind::Sampler,
                    other => {
                        return Err(format!(
                            "unsupported opaque uniform '{}' of type {other:?}; only texture2D and sampler are supported",
                            global.name.as_deref().unwrap_or("<unnamed>")
                        ));
                    }
                };
                opaque.push(OpaqueBinding {
                    name: global.name.clone(),
                    group: slot.group,
                    binding: slot.binding,
                    kind,
                });
            }
            _ => {}
        }
    }

    Ok(StageInterface {
        kind,
        inputs,
        outputs,
        blocks,
        opaque,
    })
}

fn collect_located(
    module: &naga::Module,
    name: Option<&str>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    out: &mut Vec<InterfaceVar>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(InterfaceVar {
            name: name.map(str::to_owned),
            location: *location,
            ty: value_type(&module.types[ty].inner),
        }),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_located(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

fn block_layout(
    module: &naga::Module,
    name: Option<String>,
    slot: &naga::ResourceBinding,
    inner: &TypeInner,
) -> UniformBlockLayout {
    let (members, size) = match inner {
        TypeInner::Struct { members, span } => (
            members
                .iter()
                .filter_map(|member| {
                    Some(UniformMember {
                        name: member.name.clone()?,
                        offset: member.offset,
                        ty: value_type(&module.types[member.ty].inner),
                    })
                })
                .collect(),
            *span,
        ),
        // A bare (non-struct) uniform global: expose it under the global's own name.
        other => {
            let size = other.size(module.to_ctx());
            let members = name
                .clone()
                .map(|name| {
                    vec![UniformMember {
                        name,
                        offset: 0,
                        ty: value_type(other),
                    }]
                })
                .unwrap_or_default();
            (members, size)
        }
    };

    UniformBlockLayout {
        name,
        group: slot.group,
        binding: slot.binding,
        size,
        members,
    }
}

pub(crate) fn value_type(inner: &TypeInner) -> ValueType {
    match inner {
        TypeInner::Scalar(scalar) => match scalar_type(scalar.kind) {
            Some(scalar) => ValueType::Scalar { scalar },
            None => ValueType::Other,
        },
        TypeInner::Vector { size, scalar } => match scalar_type(scalar.kind) {
            Some(kind) => ValueType::Vector {
                scalar: kind,
                size: vector_len(*size),
            },
            None => ValueType::Other,
        },
        TypeInner::Matrix { columns, rows, .. } => ValueType::Matrix {
            columns: vector_len(*columns),
            rows: vector_len(*rows),
        },
        _ => ValueType::Other,
    }
}

fn scalar_type(kind: ScalarKind) -> Option<ScalarType> {
    match kind {
        ScalarKind::Float => Some(ScalarType::Float),
        ScalarKind::Sint => Some(ScalarType::Int),
        ScalarKind::Uint => Some(ScalarType::Uint),
        ScalarKind::Bool => Some(ScalarType::Bool),
        _ => None,
    }
}

fn vector_len(size: naga::VectorSize) -> u8 {
    match size {
        naga::VectorSize::Bi => 2,
        naga::VectorSize::Tri => 3,
        naga::VectorSize::Quad => 4,
    }
}
