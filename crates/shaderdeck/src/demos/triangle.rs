use renderer::{Demo, DrawError, Frame, FrameTime, GpuContext, Program, SetupError, Viewport};

use super::build_program;

pub(crate) const VERTEX: &str = include_str!("../../shaders/triangle.vert");
pub(crate) const FRAGMENT: &str = include_str!("../../shaders/triangle.frag");

/// Three vertices, two floats each.
const POSITIONS: [f32; 6] = [0.0, 0.0, 0.0, 0.5, 0.7, 0.0];

#[derive(Default)]
pub struct Triangle {
    program: Option<Program>,
}

impl Demo for Triangle {
    fn name(&self) -> &str {
        "triangle"
    }

    fn setup(&mut self, context: &GpuContext, _viewport: &Viewport) -> Result<(), SetupError> {
        let mut program = build_program(
            context,
            "triangle",
            VERTEX,
            FRAGMENT,
            &["a_position"],
            &["u_color"],
        )?;
        program.upload(context, "a_position", &POSITIONS, 2)?;
        program.set_vector("u_color", &[1.0, 0.0, 0.5, 1.0]);
        self.program = Some(program);
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>, _time: FrameTime) -> Result<(), DrawError> {
        let Some(program) = self.program.as_mut() else {
            return Ok(());
        };
        frame.clear([0.0, 0.0, 0.0, 1.0]);
        frame.draw(program, 0..3)
    }
}
