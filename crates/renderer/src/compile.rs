use std::borrow::Cow;

use wgpu::naga::{self, front::glsl, valid};

use crate::error::ShaderCompileError;
use crate::gpu::{GpuContext, ResourceClass, Tracked};
use crate::reflect::{self, StageInterface};
use crate::types::StageKind;

/// GLSL that parsed, validated and reflected cleanly, but has no GPU object yet.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    pub kind: StageKind,
    pub interface: StageInterface,
    module: naga::Module,
}

impl CompiledStage {
    pub fn module(&self) -> &naga::Module {
        &self.module
    }
}

/// Runs the front end for a single stage without touching the GPU.
///
/// Diagnostics are rendered against `source` so they carry line/column
/// information, exactly as the GPU path reports them.
pub fn compile_glsl(kind: StageKind, source: &str) -> Result<CompiledStage, ShaderCompileError> {
    let fail = |diagnostic: String| ShaderCompileError { kind, diagnostic };

    let mut frontend = glsl::Frontend::default();
    let options = glsl::Options::from(kind.naga_stage());
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| fail(errors.emit_to_string(source)))?;

    valid::Validator::new(valid::ValidationFlags::all(), valid::Capabilities::all())
        .validate(&module)
        .map_err(|error| fail(error.emit_to_string(source)))?;

    let interface = reflect::reflect(kind, &module).map_err(fail)?;

    Ok(CompiledStage {
        kind,
        interface,
        module,
    })
}

/// A compiled stage backed by a GPU shader module.
///
/// Only successfully compiled stages exist as values; a failed compile never
/// hands out a handle.
pub struct ShaderStage {
    pub kind: StageKind,
    pub interface: StageInterface,
    pub(crate) module: Tracked<wgpu::ShaderModule>,
}

impl std::fmt::Debug for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderStage")
            .field("kind", &self.kind)
            .field("inputs", &self.interface.inputs.len())
            .field("outputs", &self.interface.outputs.len())
            .finish()
    }
}

impl ShaderStage {
    /// Compiles `source` as a `kind` stage and creates its GPU module.
    ///
    /// The device is asked to validate the module inside an error scope; if it
    /// objects, the module is released before the error is returned.
    pub fn compile(
        context: &GpuContext,
        kind: StageKind,
        source: &str,
    ) -> Result<Self, ShaderCompileError> {
        let compiled = compile_glsl(kind, source).inspect_err(|err| {
            tracing::debug!(%kind, diagnostic = %err.diagnostic, "shader front end rejected stage");
        })?;
        Self::from_compiled(context, compiled)
    }

    pub fn from_compiled(
        context: &GpuContext,
        compiled: CompiledStage,
    ) -> Result<Self, ShaderCompileError> {
        let CompiledStage {
            kind,
            interface,
            module,
        } = compiled;

        let label = format!("{kind} stage");
        let (module, scope_error) = context.with_error_scope(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Naga(Cow::Owned(module)),
            })
        });
        let module = Tracked::new(module, context.ledger(), ResourceClass::ShaderModule);

        if let Some(error) = scope_error {
            drop(module);
            return Err(ShaderCompileError {
                kind,
                diagnostic: error.to_string(),
            });
        }

        tracing::debug!(
            %kind,
            inputs = interface.inputs.len(),
            outputs = interface.outputs.len(),
            blocks = interface.blocks.len(),
            "compiled shader stage"
        );

        Ok(Self {
            kind,
            interface,
            module,
        })
    }
}
