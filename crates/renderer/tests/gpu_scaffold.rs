use renderer::{
    AttributeLocation, Canvas, DrawError, Frame, GpuContext, GpuOptions, OffscreenRelay, Program,
    ShaderStage, StageKind, UniformLocation,
};
use winit::dpi::PhysicalSize;

const POSITION_VS: &str = r"#version 450
layout(location = 0) in vec2 a_position;

void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

const COLOR_FS: &str = r"#version 450
layout(location = 0) out vec4 o_color;

layout(set = 0, binding = 0) uniform Params {
    vec4 u_color;
    float u_gain;
};

void main() {
    o_color = vec4(u_color.rgb * u_gain, u_color.a);
}
";

const QUAD_VS: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = vec2(a_position.x * 0.5 + 0.5, 0.5 - a_position.y * 0.5);
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

const QUAD_FS: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 o_color;

layout(set = 0, binding = 0) uniform texture2D u_scene;
layout(set = 0, binding = 1) uniform sampler u_scene_sampler;
layout(set = 0, binding = 2) uniform Quad {
    vec4 u_background;
};

void main() {
    vec4 scene = texture(sampler2D(u_scene, u_scene_sampler), v_uv);
    if (scene.a < 0.5) {
        o_color = u_background;
    } else {
        o_color = scene;
    }
}
";

const FULL_TRIANGLE: [f32; 6] = [-1.0, -1.0, 3.0, -1.0, -1.0, 3.0];
const SMALL_TRIANGLE: [f32; 6] = [-0.5, -0.5, 0.5, -0.5, 0.0, 0.5];
const QUAD: [f32; 12] = [
    -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, //
    -1.0, -1.0, 1.0, 1.0, -1.0, 1.0,
];

fn context_or_skip(test: &str) -> Option<GpuContext> {
    match GpuContext::headless(&GpuOptions::default()) {
        Ok(context) => Some(context),
        Err(err) => {
            eprintln!("skipping {test}: no wgpu adapter available ({err:#})");
            None
        }
    }
}

fn color_program(context: &GpuContext) -> Program {
    let vertex = ShaderStage::compile(context, StageKind::Vertex, POSITION_VS).unwrap();
    let fragment = ShaderStage::compile(context, StageKind::Fragment, COLOR_FS).unwrap();
    let mut program = Program::link(
        context,
        "color",
        vertex,
        fragment,
        &["a_position", "a_missing"],
        &["u_color", "u_gain", "u_absent"],
    )
    .unwrap();
    program.set_vector("u_color", &[1.0, 0.0, 0.0, 1.0]);
    program.set_scalar("u_gain", 1.0);
    program
}

fn render(context: &GpuContext, canvas: &Canvas, program: &mut Program, vertices: u32) -> [u8; 4] {
    let mut frame = Frame::for_canvas(context, canvas);
    frame.clear([0.0, 0.0, 0.0, 1.0]);
    frame.draw(program, 0..vertices).unwrap();
    frame.submit();
    let image = canvas.read_pixels(context).unwrap();
    image.get_pixel(image.width() / 2, image.height() / 2).0
}

#[test]
fn failed_compile_retains_no_shader_module() {
    let Some(context) = context_or_skip("failed_compile_retains_no_shader_module") else {
        return;
    };
    let before = context.live_resources();
    let err = ShaderStage::compile(
        &context,
        StageKind::Vertex,
        "#version 450\nvoid main() { gl_Position = vec4(0.0 }\n",
    )
    .unwrap_err();
    assert_eq!(err.kind, StageKind::Vertex);
    assert!(!err.diagnostic.is_empty());
    assert_eq!(context.live_resources(), before);
}

#[test]
fn dropping_a_program_releases_its_stages() {
    let Some(context) = context_or_skip("dropping_a_program_releases_its_stages") else {
        return;
    };
    let before = context.live_resources().shader_modules;
    let program = color_program(&context);
    assert_eq!(context.live_resources().shader_modules, before + 2);
    drop(program);
    assert_eq!(context.live_resources().shader_modules, before);
}

#[test]
fn link_resolves_every_requested_name() {
    let Some(context) = context_or_skip("link_resolves_every_requested_name") else {
        return;
    };
    let program = color_program(&context);

    assert_eq!(program.attribute_location("a_position"), Some(AttributeLocation(0)));
    assert_eq!(program.attribute_location("a_missing"), None);
    assert!(matches!(
        program.uniform_location("u_color"),
        Some(UniformLocation::Value { offset: 0, .. })
    ));
    assert!(matches!(
        program.uniform_location("u_gain"),
        Some(UniformLocation::Value { offset: 16, .. })
    ));
    assert_eq!(program.uniform_location("u_absent"), None);

    let interface = program.interface();
    assert_eq!(interface.attributes.len(), 2);
    assert_eq!(interface.uniforms.len(), 3);
    for _ in 0..3 {
        assert_eq!(program.uniform_location("u_gain"), program.uniform_location("u_gain"));
        assert_eq!(program.attribute_location("a_position"), Some(AttributeLocation(0)));
    }
}

#[test]
fn three_vertices_from_six_floats() {
    let Some(context) = context_or_skip("three_vertices_from_six_floats") else {
        return;
    };
    let canvas = Canvas::new(&context, PhysicalSize::new(16, 16));
    let mut program = color_program(&context);
    program
        .upload(&context, "a_position", &FULL_TRIANGLE, 2)
        .unwrap();

    assert_eq!(render(&context, &canvas, &mut program, 3), [255, 0, 0, 255]);

    let mut frame = Frame::for_canvas(&context, &canvas);
    let err = frame.draw(&mut program, 0..4).unwrap_err();
    assert!(matches!(
        err,
        DrawError::VertexOverrun {
            available: 3,
            end: 4,
            ..
        }
    ));
}

#[test]
fn rebinding_identical_geometry_is_idempotent() {
    let Some(context) = context_or_skip("rebinding_identical_geometry_is_idempotent") else {
        return;
    };
    let canvas = Canvas::new(&context, PhysicalSize::new(16, 16));
    let mut program = color_program(&context);

    program
        .upload(&context, "a_position", &FULL_TRIANGLE, 2)
        .unwrap();
    let first = render(&context, &canvas, &mut program, 3);
    let buffers = context.live_resources().buffers;

    program
        .upload(&context, "a_position", &FULL_TRIANGLE, 2)
        .unwrap();
    let second = render(&context, &canvas, &mut program, 3);

    assert_eq!(first, second);
    assert_eq!(context.live_resources().buffers, buffers);
}

#[test]
fn reupload_between_draws_keeps_call_order() {
    let Some(context) = context_or_skip("reupload_between_draws_keeps_call_order") else {
        return;
    };
    let canvas = Canvas::new(&context, PhysicalSize::new(16, 16));
    let mut program = color_program(&context);

    let mut frame = Frame::for_canvas(&context, &canvas);
    frame.clear([0.0, 0.0, 0.0, 1.0]);
    program
        .upload(&context, "a_position", &FULL_TRIANGLE, 2)
        .unwrap();
    frame.draw(&mut program, 0..3).unwrap();
    // A degenerate triangle drawn afterwards must not erase the first draw.
    program.upload(&context, "a_position", &[0.0; 6], 2).unwrap();
    frame.draw(&mut program, 0..3).unwrap();
    frame.submit();

    let image = canvas.read_pixels(&context).unwrap();
    assert_eq!(image.get_pixel(8, 8).0, [255, 0, 0, 255]);
}

#[test]
fn uniform_changes_between_draws_keep_call_order() {
    let Some(context) = context_or_skip("uniform_changes_between_draws_keep_call_order") else {
        return;
    };
    let canvas = Canvas::new(&context, PhysicalSize::new(16, 16));
    let mut program = color_program(&context);
    program
        .upload(&context, "a_position", &FULL_TRIANGLE, 2)
        .unwrap();

    let mut frame = Frame::for_canvas(&context, &canvas);
    frame.clear([0.0, 0.0, 0.0, 1.0]);
    frame.draw(&mut program, 0..3).unwrap();
    let first = canvas_snapshot_after(&context, &canvas, frame);

    let mut frame = Frame::for_canvas(&context, &canvas);
    frame.clear([0.0, 0.0, 0.0, 1.0]);
    program.set_vector("u_color", &[0.0, 1.0, 0.0, 1.0]);
    frame.draw(&mut program, 0..3).unwrap();
    program.set_vector("u_color", &[0.0, 0.0, 1.0, 1.0]);
    program
        .upload(&context, "a_position", &SMALL_TRIANGLE, 2)
        .unwrap();
    frame.draw(&mut program, 0..3).unwrap();
    let second = canvas_snapshot_after(&context, &canvas, frame);

    assert_eq!(first.get_pixel(0, 0).0, [255, 0, 0, 255]);
    // Outside the small triangle the full-screen green draw shows through.
    assert_eq!(second.get_pixel(0, 0).0, [0, 255, 0, 255]);
    assert_eq!(second.get_pixel(8, 8).0, [0, 0, 255, 255]);
}

fn canvas_snapshot_after(context: &GpuContext, canvas: &Canvas, frame: Frame<'_>) -> image::RgbaImage {
    frame.submit();
    canvas.read_pixels(context).unwrap()
}

#[test]
fn absent_uniforms_are_ignored() {
    let Some(context) = context_or_skip("absent_uniforms_are_ignored") else {
        return;
    };
    let canvas = Canvas::new(&context, PhysicalSize::new(8, 8));
    let mut program = color_program(&context);
    program
        .upload(&context, "a_position", &FULL_TRIANGLE, 2)
        .unwrap();

    program.set_scalar("u_absent", 42.0);
    program.set_vector("u_never_requested", &[0.0, 1.0, 0.0, 1.0]);
    program.set_int("u_absent", -1);

    assert_eq!(render(&context, &canvas, &mut program, 3), [255, 0, 0, 255]);
}

#[test]
fn unknown_attribute_is_an_error() {
    let Some(context) = context_or_skip("unknown_attribute_is_an_error") else {
        return;
    };
    let mut program = color_program(&context);

    let err = program
        .upload(&context, "a_missing", &[0.0; 6], 2)
        .unwrap_err();
    assert_eq!(err.name, "a_missing");
    assert_eq!(err.program, "color");
    assert!(program.upload(&context, "a_colour", &[0.0; 6], 2).is_err());
}

#[test]
fn draw_without_geometry_fails() {
    let Some(context) = context_or_skip("draw_without_geometry_fails") else {
        return;
    };
    let canvas = Canvas::new(&context, PhysicalSize::new(8, 8));
    let mut program = color_program(&context);
    let mut frame = Frame::for_canvas(&context, &canvas);
    assert!(matches!(
        frame.draw(&mut program, 0..3),
        Err(DrawError::MissingGeometry { location: 0, .. })
    ));
}

#[test]
fn offscreen_relay_composites_scene_over_background() {
    let Some(context) = context_or_skip("offscreen_relay_composites_scene_over_background") else {
        return;
    };
    let canvas = Canvas::new(&context, PhysicalSize::new(64, 64));
    let relay = OffscreenRelay::new(&context, (32, 32), "u_scene");
    assert_eq!(relay.target().size(), PhysicalSize::new(32, 32));

    let mut scene = color_program(&context);
    scene
        .upload(&context, "a_position", &SMALL_TRIANGLE, 2)
        .unwrap();

    let vertex = ShaderStage::compile(&context, StageKind::Vertex, QUAD_VS).unwrap();
    let fragment = ShaderStage::compile(&context, StageKind::Fragment, QUAD_FS).unwrap();
    let mut quad = Program::link(
        &context,
        "quad",
        vertex,
        fragment,
        &["a_position"],
        &["u_scene", "u_background"],
    )
    .unwrap();
    quad.upload(&context, "a_position", &QUAD, 2).unwrap();
    quad.set_vector("u_background", &[0.0, 0.0, 1.0, 1.0]);

    let mut frame = Frame::for_canvas(&context, &canvas);
    relay
        .render_to_offscreen(&mut frame, &mut scene, |frame, program| {
            assert_eq!(frame.viewport(), PhysicalSize::new(32, 32));
            frame.clear([0.0, 0.0, 0.0, 0.0]);
            frame.draw(program, 0..3)
        })
        .unwrap();
    relay
        .present_to_screen(&mut frame, &mut quad, |frame, program| {
            assert_eq!(frame.viewport(), PhysicalSize::new(64, 64));
            frame.clear([0.0, 0.0, 0.0, 1.0]);
            frame.draw(program, 0..6)
        })
        .unwrap();
    frame.submit();

    let image = canvas.read_pixels(&context).unwrap();
    assert_eq!(image.dimensions(), (64, 64));
    let red = [255, 0, 0, 255];
    let blue = [0, 0, 255, 255];
    assert_eq!(image.get_pixel(32, 32).0, red);
    for (x, y) in [(0, 0), (63, 0), (0, 63), (63, 63)] {
        assert_eq!(image.get_pixel(x, y).0, blue, "corner ({x}, {y})");
    }

    let offscreen = relay.target().read_pixels(&context).unwrap();
    assert_eq!(offscreen.get_pixel(0, 0).0, [0, 0, 0, 0]);
    assert_eq!(offscreen.get_pixel(16, 16).0, red);
}
