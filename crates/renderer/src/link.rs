//! Interface matching between a vertex and a fragment stage, and resolution
//! of the caller's attribute and uniform names into stable locations.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::reflect::{
    InterfaceVar, OpaqueBinding, OpaqueKind, StageInterface, UniformBlockLayout, ValueType,
};

/// Shader input slot an attribute is fed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AttributeLocation(pub u32);

/// Where a named uniform lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UniformLocation {
    /// A member of a uniform block at `offset` bytes.
    Value {
        group: u32,
        binding: u32,
        offset: u32,
        #[serde(rename = "type")]
        ty: ValueType,
    },
    Texture { group: u32, binding: u32 },
}

/// Name-to-location tables plus the merged resource layout of a program.
///
/// Every requested name has an entry; `None` marks a name the linked program
/// does not actively use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedInterface {
    pub attributes: BTreeMap<String, Option<AttributeLocation>>,
    pub uniforms: BTreeMap<String, Option<UniformLocation>>,
    /// Every located vertex input, requested or not.
    pub vertex_inputs: Vec<InterfaceVar>,
    pub varyings: Vec<InterfaceVar>,
    pub blocks: Vec<UniformBlockLayout>,
    pub opaque: Vec<OpaqueBinding>,
}

impl LinkedInterface {
    pub fn attribute(&self, name: &str) -> Option<AttributeLocation> {
        self.attributes.get(name).copied().flatten()
    }

    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied().flatten()
    }

    /// Highest bind group index in use, if any resources are bound at all.
    pub fn max_group(&self) -> Option<u32> {
        self.blocks
            .iter()
            .map(|block| block.group)
            .chain(self.opaque.iter().map(|binding| binding.group))
            .max()
    }
}

/// Links two stage interfaces; `Err` holds a human-readable link log.
pub fn link_interface(
    vertex: &StageInterface,
    fragment: &StageInterface,
    attributes: &[&str],
    uniforms: &[&str],
) -> Result<LinkedInterface, String> {
    let mut problems = Vec::new();

    for input in &fragment.inputs {
        match vertex
            .outputs
            .iter()
            .find(|output| output.location == input.location)
        {
            None => problems.push(format!(
                "fragment input {} at location {} is not written by the vertex stage",
                describe(input),
                input.location
            )),
            Some(output) if output.ty != input.ty => problems.push(format!(
                "varying at location {} is {:?} in the vertex stage but {:?} in the fragment stage",
                input.location, output.ty, input.ty
            )),
            Some(_) => {}
        }
    }

    let mut blocks: Vec<UniformBlockLayout> = Vec::new();
    for block in vertex.blocks.iter().chain(&fragment.blocks) {
        match blocks
            .iter()
            .find(|known| known.group == block.group && known.binding == block.binding)
        {
            Some(known) if known.members != block.members => problems.push(format!(
                "uniform block at set {} binding {} is declared differently in the two stages",
                block.group, block.binding
            )),
            Some(_) => {}
            None => blocks.push(block.clone()),
        }
    }

    let mut opaque: Vec<OpaqueBinding> = Vec::new();
    for binding in vertex.opaque.iter().chain(&fragment.opaque) {
        if blocks
            .iter()
            .any(|block| block.group == binding.group && block.binding == binding.binding)
        {
            problems.push(format!(
                "set {} binding {} is used both as a uniform block and as a {:?}",
                binding.group, binding.binding, binding.kind
            ));
            continue;
        }
        match opaque
            .iter()
            .find(|known| known.group == binding.group && known.binding == binding.binding)
        {
            Some(known) if known.kind != binding.kind => problems.push(format!(
                "set {} binding {} is declared as both {:?} and {:?}",
                binding.group, binding.binding, known.kind, binding.kind
            )),
            Some(_) => {}
            None => opaque.push(binding.clone()),
        }
    }

    if !problems.is_empty() {
        return Err(problems.join("\n"));
    }

    let attributes = attributes
        .iter()
        .map(|name| {
            let location = vertex
                .inputs
                .iter()
                .find(|input| input.name.as_deref() == Some(*name))
                .map(|input| AttributeLocation(input.location));
            ((*name).to_owned(), location)
        })
        .collect();

    let uniforms = uniforms
        .iter()
        .map(|name| ((*name).to_owned(), resolve_uniform(name, &blocks, &opaque)))
        .collect();

    Ok(LinkedInterface {
        attributes,
        uniforms,
        vertex_inputs: vertex.inputs.clone(),
        varyings: fragment.inputs.clone(),
        blocks,
        opaque,
    })
}

fn resolve_uniform(
    name: &str,
    blocks: &[UniformBlockLayout],
    opaque: &[OpaqueBinding],
) -> Option<UniformLocation> {
    let member = blocks.iter().find_map(|block| {
        block
            .members
            .iter()
            .find(|member| member.name == name)
            .map(|member| UniformLocation::Value {
                group: block.group,
                binding: block.binding,
                offset: member.offset,
                ty: member.ty,
            })
    });
    member.or_else(|| {
        opaque
            .iter()
            .find(|binding| binding.kind == OpaqueKind::Texture && binding.name.as_deref() == Some(name))
            .map(|binding| UniformLocation::Texture {
                group: binding.group,
                binding: binding.binding,
            })
    })
}

fn describe(var: &InterfaceVar) -> String {
    match var.name.as_deref() {
        Some(name) => format!("'{name}'"),
        None => "<unnamed>".to_string(),
    }
}
