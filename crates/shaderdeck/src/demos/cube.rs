use std::f32::consts::FRAC_PI_3;

use renderer::{
    compose, AttributeSlice, Demo, DrawError, FaceCulling, Frame, FrameTime, GeometryBuffer,
    GpuContext, Mat4, Program, SetupError, Viewport,
};

use super::build_program;

pub(crate) const VERTEX: &str = include_str!("../../shaders/cube.vert");
pub(crate) const FRAGMENT: &str = include_str!("../../shaders/cube.frag");

/// Position (vec3) followed by colour (vec3).
const STRIDE: u32 = 6 * 4;
const HALF_EXTENT: f32 = 0.6;

/// Face normal, then two in-plane axes with `u × v = normal`, then colour.
const FACES: [([f32; 3], [f32; 3], [f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.93, 0.33, 0.31]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.98, 0.75, 0.18]),
    ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.40, 0.73, 0.42]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.26, 0.65, 0.96]),
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.67, 0.28, 0.74]),
    ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.96, 0.96, 0.96]),
];

/// Counter-clockwise corners of a face in its (u, v) plane.
const CORNERS: [(f32, f32); 6] = [
    (-1.0, -1.0),
    (1.0, -1.0),
    (1.0, 1.0),
    (-1.0, -1.0),
    (1.0, 1.0),
    (-1.0, 1.0),
];

pub(crate) fn cube_vertices() -> Vec<f32> {
    let mut data = Vec::with_capacity(FACES.len() * CORNERS.len() * 6);
    for (normal, u, v, color) in FACES {
        for (su, sv) in CORNERS {
            for axis in 0..3 {
                data.push(HALF_EXTENT * (normal[axis] + su * u[axis] + sv * v[axis]));
            }
            data.extend_from_slice(&color);
        }
    }
    data
}

#[derive(Default)]
pub struct Cube {
    program: Option<Program>,
    aspect: f32,
}

impl Demo for Cube {
    fn name(&self) -> &str {
        "cube"
    }

    fn setup(&mut self, context: &GpuContext, _viewport: &Viewport) -> Result<(), SetupError> {
        let mut program = build_program(
            context,
            "cube",
            VERTEX,
            FRAGMENT,
            &["a_position", "a_color"],
            &["u_mvp"],
        )?;
        // No depth buffer: culling back faces is enough for a convex mesh.
        program.set_face_culling(FaceCulling::Back);
        let geometry = GeometryBuffer::new(
            cube_vertices(),
            vec![
                AttributeSlice::new("a_position", 3, STRIDE, 0),
                AttributeSlice::new("a_color", 3, STRIDE, 12),
            ],
        );
        program.bind_geometry(context, &geometry)?;
        self.program = Some(program);
        Ok(())
    }

    fn resize(&mut self, viewport: &Viewport) {
        let [width, height] = viewport.resolution();
        self.aspect = width / height.max(1.0);
    }

    fn render(&mut self, frame: &mut Frame<'_>, time: FrameTime) -> Result<(), DrawError> {
        let Some(program) = self.program.as_mut() else {
            return Ok(());
        };
        let aspect = if self.aspect > 0.0 { self.aspect } else { 1.0 };
        // Rightmost applies first: spin about x, then y, push back, project.
        let mvp = compose(&[
            Mat4::perspective(FRAC_PI_3, aspect, 0.1, 100.0),
            Mat4::translation(0.0, 0.0, -3.0),
            Mat4::rotation_y(time.elapsed * 0.9),
            Mat4::rotation_x(time.elapsed * 0.6),
        ]);
        program.set_matrix("u_mvp", &mvp);

        frame.clear([0.05, 0.05, 0.08, 1.0]);
        frame.draw(program, 0..36)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    #[test]
    fn face_axes_are_right_handed() {
        for (normal, u, v, _) in FACES {
            assert_eq!(cross(u, v), normal);
        }
    }

    #[test]
    fn triangles_wind_outwards() {
        let data = cube_vertices();
        assert_eq!(data.len(), 36 * 6);
        for triangle in data.chunks_exact(18) {
            let vertex = |i: usize| [triangle[i * 6], triangle[i * 6 + 1], triangle[i * 6 + 2]];
            let (a, b, c) = (vertex(0), vertex(1), vertex(2));
            let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let facing = cross(ab, ac);
            let centre = [
                (a[0] + b[0] + c[0]) / 3.0,
                (a[1] + b[1] + c[1]) / 3.0,
                (a[2] + b[2] + c[2]) / 3.0,
            ];
            let dot: f32 = facing.iter().zip(centre).map(|(f, p)| f * p).sum();
            assert!(dot > 0.0, "inward-facing triangle {a:?} {b:?} {c:?}");
        }
    }
}
