use renderer::{
    capture_frame, run_headless, Demo, DrawError, Frame, FrameTime, GpuContext, GpuOptions,
    HeadlessOptions, Program, SetupError, ShaderStage, StageKind, Viewport,
};

const FULLSCREEN_VS: &str = r"#version 450
const vec2 corners[3] = vec2[3](vec2(-1.0, -1.0), vec2(3.0, -1.0), vec2(-1.0, 3.0));

void main() {
    gl_Position = vec4(corners[gl_VertexIndex], 0.0, 1.0);
}
";

// Red ramps across the canvas only if u_resolution matches its width.
const GRADIENT_FS: &str = r"#version 450
layout(location = 0) out vec4 o_color;

layout(set = 0, binding = 0) uniform Frame {
    vec2 u_resolution;
    float u_time;
};

void main() {
    o_color = vec4(gl_FragCoord.x / u_resolution.x, fract(u_time), 0.0, 1.0);
}
";

#[derive(Default)]
struct Gradient {
    program: Option<Program>,
    resolutions: Vec<[f32; 2]>,
    times: Vec<FrameTime>,
}

impl Demo for Gradient {
    fn name(&self) -> &str {
        "gradient"
    }

    fn setup(&mut self, context: &GpuContext, _viewport: &Viewport) -> Result<(), SetupError> {
        let vertex = ShaderStage::compile(context, StageKind::Vertex, FULLSCREEN_VS)?;
        let fragment = ShaderStage::compile(context, StageKind::Fragment, GRADIENT_FS)?;
        self.program = Some(Program::link(
            context,
            "gradient",
            vertex,
            fragment,
            &[],
            &["u_resolution", "u_time"],
        )?);
        Ok(())
    }

    fn resize(&mut self, viewport: &Viewport) {
        let resolution = viewport.resolution();
        self.resolutions.push(resolution);
        if let Some(program) = self.program.as_mut() {
            program.set_vector("u_resolution", &resolution);
        }
    }

    fn render(&mut self, frame: &mut Frame<'_>, time: FrameTime) -> Result<(), DrawError> {
        self.times.push(time);
        let Some(program) = self.program.as_mut() else {
            return Ok(());
        };
        program.set_scalar("u_time", time.elapsed);
        frame.clear([0.0, 0.0, 0.0, 1.0]);
        frame.draw(program, 0..3)
    }
}

fn context_or_skip(test: &str) -> Option<GpuContext> {
    match GpuContext::headless(&GpuOptions::default()) {
        Ok(context) => Some(context),
        Err(err) => {
            eprintln!("skipping {test}: no wgpu adapter available ({err:#})");
            None
        }
    }
}

#[test]
fn headless_run_stops_after_requested_frames() {
    let Some(context) = context_or_skip("headless_run_stops_after_requested_frames") else {
        return;
    };
    let mut demo = Gradient::default();
    let options = HeadlessOptions {
        size: (32, 16),
        frames: Some(3),
        ..HeadlessOptions::default()
    };

    let report = run_headless(&context, &mut demo, &options).unwrap();

    assert_eq!(report.frames, 3);
    assert_eq!(report.last_frame.dimensions(), (32, 16));
    let indices: Vec<u64> = demo.times.iter().map(|time| time.frame_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(demo.times[0].elapsed, 0.0);
    assert!((demo.times[2].elapsed - 2.0 / 60.0).abs() < 1e-6);
    assert_eq!(demo.resolutions, vec![[32.0, 16.0]]);

    let left = report.last_frame.get_pixel(0, 8).0;
    let right = report.last_frame.get_pixel(31, 8).0;
    assert!(left[0] < 16, "left edge {left:?}");
    assert!(right[0] > 240, "right edge {right:?}");
}

#[test]
fn headless_run_needs_a_stop_condition() {
    let Some(context) = context_or_skip("headless_run_needs_a_stop_condition") else {
        return;
    };
    let mut demo = Gradient::default();
    let options = HeadlessOptions {
        frames: None,
        duration: None,
        ..HeadlessOptions::default()
    };
    assert!(run_headless(&context, &mut demo, &options).is_err());
    assert!(demo.times.is_empty());
}

#[test]
fn capture_renders_at_fixed_time_and_scaled_resolution() {
    let Some(context) = context_or_skip("capture_renders_at_fixed_time_and_scaled_resolution")
    else {
        return;
    };
    let mut demo = Gradient::default();

    // Scale factor 2 halves the physical canvas; resize must push the
    // halved resolution for the ramp to still span the image.
    let image = capture_frame(&context, &mut demo, (32, 16), 2.0, 3.25).unwrap();

    assert_eq!(image.dimensions(), (16, 8));
    assert_eq!(demo.resolutions, vec![[16.0, 8.0]]);
    assert_eq!(demo.times.len(), 1);
    assert_eq!(demo.times[0].elapsed, 3.25);

    let left = image.get_pixel(0, 4).0;
    let right = image.get_pixel(15, 4).0;
    assert!(left[0] < 32, "left edge {left:?}");
    assert!(right[0] > 224, "right edge {right:?}");
    // fract(3.25) = 0.25
    assert!((63..=64).contains(&left[1]), "green {left:?}");
}
