use super::context::GpuContext;
use super::frame::Frame;
use super::target::OffscreenTarget;
use crate::error::DrawError;
use crate::program::Program;

/// Two-pass relay: draw a scene into a fixed-resolution target, then draw a
/// second program on the default target that samples it.
pub struct OffscreenRelay {
    target: OffscreenTarget,
    texture_uniform: String,
}

impl OffscreenRelay {
    /// `texture_uniform` names the texture the presenting program samples.
    pub fn new(context: &GpuContext, resolution: (u32, u32), texture_uniform: impl Into<String>) -> Self {
        let target = OffscreenTarget::new(context, resolution);
        tracing::debug!(
            width = target.size().width,
            height = target.size().height,
            "created offscreen relay target"
        );
        Self {
            target,
            texture_uniform: texture_uniform.into(),
        }
    }

    pub fn target(&self) -> &OffscreenTarget {
        &self.target
    }

    /// Binds the offscreen target (viewport = its resolution) and runs `draw`.
    pub fn render_to_offscreen<F>(
        &self,
        frame: &mut Frame<'_>,
        program: &mut Program,
        draw: F,
    ) -> Result<(), DrawError>
    where
        F: FnOnce(&mut Frame<'_>, &mut Program) -> Result<(), DrawError>,
    {
        frame.bind_offscreen(&self.target);
        draw(frame, program)
    }

    /// Rebinds the default target at the main viewport, feeds the offscreen
    /// image to `program` through the texture uniform and runs `draw`.
    pub fn present_to_screen<F>(
        &self,
        frame: &mut Frame<'_>,
        program: &mut Program,
        draw: F,
    ) -> Result<(), DrawError>
    where
        F: FnOnce(&mut Frame<'_>, &mut Program) -> Result<(), DrawError>,
    {
        frame.bind_screen();
        program.bind_texture(&self.texture_uniform, self.target.view());
        draw(frame, program)
    }
}
