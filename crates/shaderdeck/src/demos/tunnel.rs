use renderer::{Demo, DrawError, Frame, FrameTime, GpuContext, Program, SetupError, Viewport};

use super::{build_program, FULLSCREEN_QUAD, QUAD_VERTEX};

pub(crate) const FRAGMENT: &str = include_str!("../../shaders/tunnel.frag");

/// Builds the tunnel program with its quad already uploaded.
pub(crate) fn tunnel_program(context: &GpuContext, label: &str) -> Result<Program, SetupError> {
    let mut program = build_program(
        context,
        label,
        QUAD_VERTEX,
        FRAGMENT,
        &["a_position"],
        &["u_time", "u_resolution"],
    )?;
    program.upload(context, "a_position", &FULLSCREEN_QUAD, 2)?;
    Ok(program)
}

#[derive(Default)]
pub struct Tunnel {
    program: Option<Program>,
}

impl Demo for Tunnel {
    fn name(&self) -> &str {
        "tunnel"
    }

    fn setup(&mut self, context: &GpuContext, _viewport: &Viewport) -> Result<(), SetupError> {
        self.program = Some(tunnel_program(context, "tunnel")?);
        Ok(())
    }

    fn resize(&mut self, viewport: &Viewport) {
        if let Some(program) = self.program.as_mut() {
            program.set_vector("u_resolution", &viewport.resolution());
        }
    }

    fn render(&mut self, frame: &mut Frame<'_>, time: FrameTime) -> Result<(), DrawError> {
        let Some(program) = self.program.as_mut() else {
            return Ok(());
        };
        program.set_scalar("u_time", time.elapsed);
        frame.draw(program, 0..6)
    }
}
