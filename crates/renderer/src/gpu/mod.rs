//! GPU plumbing underneath programs and frames.
//! - `context` owns the wgpu instance/device/queue and optional window surface.
//! - `ledger` counts live GPU objects so leaks show up in tests.
//! - `target` holds the canvas, fixed-size offscreen targets and read-back.
//! - `pipeline` builds bind group layouts and lazily created render pipelines.
//! - `frame` records a frame's passes and tracks the bound target.
//! - `offscreen` is the render-to-texture-then-present relay.
//! - `present` blits the canvas onto a window swapchain.

mod context;
mod frame;
mod ledger;
mod offscreen;
pub(crate) mod pipeline;
mod present;
mod target;

pub use context::{GpuContext, WindowSurface};
pub use frame::Frame;
pub use ledger::LiveResources;
pub(crate) use ledger::{ResourceClass, Tracked};
pub use offscreen::OffscreenRelay;
pub use pipeline::FaceCulling;
pub use present::Presenter;
pub use target::{Canvas, OffscreenTarget, TARGET_FORMAT};
