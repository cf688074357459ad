//! Small GPU shader-pipeline scaffold on top of `wgpu`.
//!
//! A demo goes through the same steps every time:
//!
//! ```text
//!   GLSL source ──compile──▶ ShaderStage ─┐
//!   GLSL source ──compile──▶ ShaderStage ─┴─link──▶ Program
//!                                                     │  bind_geometry / set_* uniforms
//!   FrameLoop::tick ──▶ Frame (canvas | offscreen) ──draw──▶ submit
//! ```
//!
//! Setup failures (`ShaderCompileError`, `ProgramLinkError`,
//! `UnknownAttributeError`) abort a demo before anything is drawn. Writes to
//! uniforms a program does not use are silently dropped.
//!
//! The `window` and `headless` modules host a [`Demo`] either in a winit
//! window or against an offscreen canvas.

pub mod compile;
pub mod demo;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod headless;
pub mod link;
pub mod math;
mod program;
pub mod reflect;
pub mod runtime;
pub mod types;
mod uniforms;
pub mod viewport;
pub mod window;

pub use compile::{compile_glsl, CompiledStage, ShaderStage};
pub use demo::Demo;
pub use error::{
    DrawError, ProgramLinkError, SetupError, ShaderCompileError, UnknownAttributeError,
    ViewportError,
};
pub use geometry::{AttributeSlice, GeometryBuffer};
pub use gpu::{
    Canvas, FaceCulling, Frame, GpuContext, LiveResources, OffscreenRelay, OffscreenTarget,
    Presenter, TARGET_FORMAT,
};
pub use headless::{capture_frame, run_headless, HeadlessOptions, HeadlessReport};
pub use link::{link_interface, AttributeLocation, LinkedInterface, UniformLocation};
pub use math::{compose, Mat2, Mat3, Mat4, Matrix};
pub use program::Program;
pub use runtime::{
    BoxedTimeSource, CancelHandle, FixedTimeSource, FrameLoop, FramePacer, FrameTime,
    SteppedTimeSource, SystemTimeSource, TimeSample, TimeSource,
};
pub use types::{AdapterProfile, GpuOptions, GpuPowerPreference, HostOptions, StageKind};
pub use viewport::{scale_factor_for_key, Viewport};
pub use window::run_windowed;
