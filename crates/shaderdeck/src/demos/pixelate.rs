use renderer::{
    Demo, DrawError, Frame, FrameTime, GpuContext, OffscreenRelay, Program, SetupError, Viewport,
};

use super::tunnel::tunnel_program;
use super::{build_program, FULLSCREEN_QUAD, QUAD_VERTEX};

pub(crate) const PRESENT_FRAGMENT: &str = include_str!("../../shaders/present.frag");

/// Renders the tunnel into a small fixed-size target, then stretches that
/// target over the screen with nearest sampling.
pub struct Pixelate {
    resolution: (u32, u32),
    state: Option<State>,
}

struct State {
    relay: OffscreenRelay,
    scene: Program,
    present: Program,
}

impl Pixelate {
    pub fn new(resolution: (u32, u32)) -> Self {
        Self {
            resolution: (resolution.0.max(1), resolution.1.max(1)),
            state: None,
        }
    }
}

impl Demo for Pixelate {
    fn name(&self) -> &str {
        "pixelate"
    }

    fn setup(&mut self, context: &GpuContext, _viewport: &Viewport) -> Result<(), SetupError> {
        let relay = OffscreenRelay::new(context, self.resolution, "u_scene");

        let mut scene = tunnel_program(context, "pixelate scene")?;
        // The scene always renders at the relay's resolution, whatever the window does.
        scene.set_vector(
            "u_resolution",
            &[self.resolution.0 as f32, self.resolution.1 as f32],
        );

        let mut present = build_program(
            context,
            "pixelate present",
            QUAD_VERTEX,
            PRESENT_FRAGMENT,
            &["a_position"],
            &["u_scene"],
        )?;
        present.upload(context, "a_position", &FULLSCREEN_QUAD, 2)?;

        self.state = Some(State {
            relay,
            scene,
            present,
        });
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>, time: FrameTime) -> Result<(), DrawError> {
        let Some(State {
            relay,
            scene,
            present,
        }) = self.state.as_mut()
        else {
            return Ok(());
        };

        scene.set_scalar("u_time", time.elapsed);
        relay.render_to_offscreen(frame, scene, |frame, program| frame.draw(program, 0..6))?;
        relay.present_to_screen(frame, present, |frame, program| {
            frame.clear([0.0, 0.0, 0.0, 1.0]);
            frame.draw(program, 0..6)
        })
    }
}
