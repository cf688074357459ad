use crate::types::StageKind;

/// A stage failed to compile; `diagnostic` holds the compiler's log verbatim.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to compile {kind} shader:\n{diagnostic}")]
pub struct ShaderCompileError {
    pub kind: StageKind,
    pub diagnostic: String,
}

/// Two compiled stages could not be combined into a program.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to link program '{label}':\n{diagnostic}")]
pub struct ProgramLinkError {
    pub label: String,
    pub diagnostic: String,
}

/// Geometry was bound for an attribute the program never resolved.
///
/// Unlike uniforms, missing attributes are a hard error: drawing without the
/// data would read garbage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("program '{program}' has no active attribute named '{name}'")]
pub struct UnknownAttributeError {
    pub program: String,
    pub name: String,
}

/// Anything that can go wrong while a demo builds its programs and buffers.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Compile(#[from] ShaderCompileError),
    #[error(transparent)]
    Link(#[from] ProgramLinkError),
    #[error(transparent)]
    UnknownAttribute(#[from] UnknownAttributeError),
}

/// Failures detected while recording a draw.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    #[error("program '{program}': attribute at location {location} has no bound geometry")]
    MissingGeometry { program: String, location: u32 },
    #[error(
        "program '{program}': draw of vertices {start}..{end} exceeds the {available} vertices bound"
    )]
    VertexOverrun {
        program: String,
        start: u32,
        end: u32,
        available: u32,
    },
    #[error("program '{program}': texture '{name}' has nothing bound")]
    UnboundTexture { program: String, name: String },
    #[error("program '{program}': failed to build render pipeline: {message}")]
    Pipeline { program: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ViewportError {
    #[error("scale factor must be a positive finite number, got {0}")]
    InvalidScaleFactor(f64),
    #[error("device pixel ratio must be a positive finite number, got {0}")]
    InvalidPixelRatio(f64),
}
