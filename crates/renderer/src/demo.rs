use crate::error::{DrawError, SetupError};
use crate::gpu::{Frame, GpuContext};
use crate::runtime::FrameTime;
use crate::viewport::Viewport;

/// A self-contained scene the hosts know how to drive.
///
/// Hosts call `setup` once, `resize` after every viewport recompute
/// (including right after setup) and `render` once per frame tick. A setup
/// error aborts the demo before any draw; a draw error stops the loop.
pub trait Demo {
    fn name(&self) -> &str;

    fn setup(&mut self, context: &GpuContext, viewport: &Viewport) -> Result<(), SetupError>;

    /// Push size-dependent state such as `u_resolution`.
    fn resize(&mut self, viewport: &Viewport) {
        let _ = viewport;
    }

    fn render(&mut self, frame: &mut Frame<'_>, time: FrameTime) -> Result<(), DrawError>;
}
