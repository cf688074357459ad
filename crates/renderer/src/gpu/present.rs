use winit::dpi::PhysicalSize;

use super::context::GpuContext;
use super::frame::Frame;
use super::target::Canvas;
use crate::compile::ShaderStage;
use crate::error::{DrawError, SetupError};
use crate::program::Program;
use crate::types::StageKind;

/// Copies the canvas onto a window swapchain image, stretching it with
/// nearest filtering so coarse scale factors stay crisp.
pub struct Presenter {
    program: Program,
}

impl Presenter {
    pub fn new(context: &GpuContext) -> Result<Self, SetupError> {
        let vertex = ShaderStage::compile(context, StageKind::Vertex, BLIT_VERTEX)?;
        let fragment = ShaderStage::compile(context, StageKind::Fragment, BLIT_FRAGMENT)?;
        let program = Program::link(context, "canvas blit", vertex, fragment, &[], &["u_canvas"])?;
        Ok(Self { program })
    }

    pub fn present(
        &mut self,
        context: &GpuContext,
        canvas: &Canvas,
        surface_view: &wgpu::TextureView,
        surface_format: wgpu::TextureFormat,
        surface_size: PhysicalSize<u32>,
    ) -> Result<(), DrawError> {
        let mut frame = Frame::new(context, surface_view, surface_format, surface_size);
        self.program.bind_texture("u_canvas", canvas.view());
        frame.clear([0.0, 0.0, 0.0, 1.0]);
        frame.draw(&mut self.program, 0..3)?;
        frame.submit();
        Ok(())
    }
}

const BLIT_VERTEX: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    vec2 pos = positions[gl_VertexIndex];
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

const BLIT_FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 o_color;

layout(set = 0, binding = 0) uniform texture2D u_canvas;
layout(set = 0, binding = 1) uniform sampler u_canvas_sampler;

void main() {
    o_color = texture(sampler2D(u_canvas, u_canvas_sampler), v_uv);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::TARGET_FORMAT;
    use crate::types::GpuOptions;

    #[test]
    fn bind_groups_survive_until_the_canvas_changes() {
        let context = match GpuContext::headless(&GpuOptions::default()) {
            Ok(context) => context,
            Err(err) => {
                eprintln!("skipping bind_groups_survive_until_the_canvas_changes: no wgpu adapter available ({err:#})");
                return;
            }
        };
        let mut presenter = Presenter::new(&context).unwrap();
        let mut canvas = Canvas::new(&context, PhysicalSize::new(8, 8));
        let screen = Canvas::new(&context, PhysicalSize::new(16, 16));
        let present = |presenter: &mut Presenter, canvas: &Canvas| {
            presenter
                .present(&context, canvas, screen.view(), TARGET_FORMAT, screen.size())
                .unwrap();
        };

        present(&mut presenter, &canvas);
        assert!(presenter.program.has_bind_groups());
        present(&mut presenter, &canvas);
        assert!(presenter.program.has_bind_groups());

        assert!(canvas.resize(&context, PhysicalSize::new(4, 4)));
        presenter.program.bind_texture("u_canvas", canvas.view());
        assert!(!presenter.program.has_bind_groups());
        present(&mut presenter, &canvas);
        assert!(presenter.program.has_bind_groups());
    }
}
