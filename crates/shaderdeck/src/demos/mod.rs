//! Bundled demos. Each one owns its programs and buffers; the hosts in
//! `renderer` drive them through the `Demo` trait.

mod cube;
mod pixelate;
mod triangle;
mod tunnel;

use anyhow::{bail, Result};
use renderer::{Demo, GpuContext, Program, SetupError, ShaderStage, StageKind};

pub struct DemoInfo {
    pub name: &'static str,
    pub summary: &'static str,
}

pub const CATALOG: &[DemoInfo] = &[
    DemoInfo {
        name: "triangle",
        summary: "a single static triangle",
    },
    DemoInfo {
        name: "tunnel",
        summary: "animated full-screen tunnel driven by u_time and u_resolution",
    },
    DemoInfo {
        name: "pixelate",
        summary: "tunnel rendered offscreen at a fixed low resolution, then upscaled",
    },
    DemoInfo {
        name: "cube",
        summary: "spinning cube from an interleaved buffer with back-face culling",
    },
];

/// Knobs from the config file that individual demos care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoSettings {
    pub offscreen_resolution: (u32, u32),
}

pub fn create(name: &str, settings: &DemoSettings) -> Result<Box<dyn Demo>> {
    let demo: Box<dyn Demo> = match name.trim().to_ascii_lowercase().as_str() {
        "triangle" => Box::new(triangle::Triangle::default()),
        "tunnel" => Box::new(tunnel::Tunnel::default()),
        "pixelate" => Box::new(pixelate::Pixelate::new(settings.offscreen_resolution)),
        "cube" => Box::new(cube::Cube::default()),
        other => {
            let known: Vec<&str> = CATALOG.iter().map(|info| info.name).collect();
            bail!("unknown demo '{other}'; expected one of {}", known.join(", "));
        }
    };
    Ok(demo)
}

/// Two triangles covering clip space, for full-screen fragment effects.
pub(crate) const FULLSCREEN_QUAD: [f32; 12] = [
    -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, //
    -1.0, -1.0, 1.0, 1.0, -1.0, 1.0,
];

pub(crate) const QUAD_VERTEX: &str = include_str!("../../shaders/quad.vert");

/// Compiles both stages and links them.
pub(crate) fn build_program(
    context: &GpuContext,
    label: &str,
    vertex: &str,
    fragment: &str,
    attributes: &[&str],
    uniforms: &[&str],
) -> Result<Program, SetupError> {
    let vertex = ShaderStage::compile(context, StageKind::Vertex, vertex)?;
    let fragment = ShaderStage::compile(context, StageKind::Fragment, fragment)?;
    Ok(Program::link(context, label, vertex, fragment, attributes, uniforms)?)
}

#[cfg(test)]
mod tests {
    use renderer::compile_glsl;

    use super::*;

    const SOURCES: &[(&str, StageKind, &str)] = &[
        ("quad.vert", StageKind::Vertex, QUAD_VERTEX),
        ("triangle.vert", StageKind::Vertex, triangle::VERTEX),
        ("triangle.frag", StageKind::Fragment, triangle::FRAGMENT),
        ("tunnel.frag", StageKind::Fragment, tunnel::FRAGMENT),
        ("present.frag", StageKind::Fragment, pixelate::PRESENT_FRAGMENT),
        ("cube.vert", StageKind::Vertex, cube::VERTEX),
        ("cube.frag", StageKind::Fragment, cube::FRAGMENT),
    ];

    #[test]
    fn bundled_shaders_compile() {
        for (name, kind, source) in SOURCES {
            if let Err(err) = compile_glsl(*kind, source) {
                panic!("{name}: {err}");
            }
        }
    }

    #[test]
    fn every_catalog_entry_can_be_created() {
        let settings = DemoSettings {
            offscreen_resolution: (32, 18),
        };
        for info in CATALOG {
            let demo = create(info.name, &settings).unwrap();
            assert_eq!(demo.name(), info.name);
        }
        assert!(create("nope", &settings).is_err());
    }

    #[test]
    fn tunnel_uniforms_share_one_block() {
        let vertex = compile_glsl(StageKind::Vertex, QUAD_VERTEX).unwrap();
        let fragment = compile_glsl(StageKind::Fragment, tunnel::FRAGMENT).unwrap();
        let linked = renderer::link_interface(
            &vertex.interface,
            &fragment.interface,
            &["a_position"],
            &["u_time", "u_resolution", "u_mouse"],
        )
        .unwrap();
        assert!(linked.uniform("u_time").is_some());
        assert!(linked.uniform("u_resolution").is_some());
        assert!(linked.uniform("u_mouse").is_none());
        assert_eq!(linked.blocks.len(), 1);
    }
}
