use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use deckconfig::{DeckConfig, PowerSetting};
use renderer::{
    compile_glsl, link_interface, CompiledStage, GpuContext, GpuOptions, GpuPowerPreference,
    HeadlessOptions, HostOptions, LinkedInterface, StageKind,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{CaptureArgs, InspectArgs, RunArgs};
use crate::demos::{self, DemoSettings};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DeckConfig> {
    match path {
        Some(path) => {
            let config = DeckConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config");
            Ok(config)
        }
        None => Ok(DeckConfig::default()),
    }
}

fn gpu_options(config: &DeckConfig) -> GpuOptions {
    GpuOptions {
        power: match config.gpu.power {
            PowerSetting::Low => GpuPowerPreference::Low,
            PowerSetting::High => GpuPowerPreference::High,
        },
        force_fallback_adapter: config.gpu.fallback_adapter,
    }
}

fn demo_settings(config: &DeckConfig) -> DemoSettings {
    DemoSettings {
        offscreen_resolution: config.render.offscreen_resolution,
    }
}

pub fn run(config_path: Option<&Path>, args: RunArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let name = args.demo.clone().unwrap_or_else(|| config.run.demo.clone());
    let mut demo = demos::create(&name, &demo_settings(&config))?;

    let size = args
        .size
        .unwrap_or((config.window.width, config.window.height));
    let scale = args.scale.unwrap_or(config.render.scale_factor);
    let fps = match args.fps {
        Some(fps) if fps > 0.0 => Some(fps),
        Some(_) => None,
        None => config.fps(),
    };
    let duration = args.duration.or(config.run.duration);

    if args.headless {
        let context = GpuContext::headless(&gpu_options(&config))
            .context("failed to initialise headless GPU context")?;
        let frames = match (args.frames, duration) {
            (None, None) => Some(1),
            (frames, _) => frames,
        };
        let options = HeadlessOptions {
            size,
            scale_factor: f64::from(scale),
            device_pixel_ratio: config.render.device_pixel_ratio.unwrap_or(1.0),
            frames,
            duration,
            target_fps: fps,
        };
        let report = renderer::run_headless(&context, demo.as_mut(), &options)?;
        println!(
            "{name}: rendered {} frame(s) at {}x{} in {:.2?}",
            report.frames,
            report.last_frame.width(),
            report.last_frame.height(),
            report.wall_time
        );
        return Ok(());
    }

    let options = HostOptions {
        window_size: size,
        title: format!("{} - {name}", config.window.title),
        scale_factor: scale,
        device_pixel_ratio: config.render.device_pixel_ratio,
        target_fps: fps,
        run_for: duration,
        gpu: gpu_options(&config),
    };
    tracing::info!(demo = %name, ?size, scale, ?fps, "launching window");
    renderer::run_windowed(options, demo)
}

pub fn capture(config_path: Option<&Path>, args: CaptureArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let mut demo = demos::create(&args.demo, &demo_settings(&config))?;
    let size = args
        .size
        .unwrap_or((config.window.width, config.window.height));
    let scale = args.scale.unwrap_or(config.render.scale_factor);

    let context = GpuContext::headless(&gpu_options(&config))
        .context("failed to initialise headless GPU context")?;
    let image = renderer::capture_frame(&context, demo.as_mut(), size, f64::from(scale), args.time)?;

    if let Some(parent) = args.output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    tracing::info!(
        path = %args.output.display(),
        width = image.width(),
        height = image.height(),
        time = args.time,
        "captured frame"
    );
    Ok(())
}

#[derive(Serialize)]
struct InspectReport<'a> {
    vertex: &'a renderer::reflect::StageInterface,
    fragment: &'a renderer::reflect::StageInterface,
    program: &'a LinkedInterface,
}

pub fn inspect(args: InspectArgs) -> Result<()> {
    let vertex = compile_file(StageKind::Vertex, &args.vertex)?;
    let fragment = compile_file(StageKind::Fragment, &args.fragment)?;

    let attributes: Vec<&str> = args.attributes.iter().map(String::as_str).collect();
    let uniforms: Vec<&str> = args.uniforms.iter().map(String::as_str).collect();
    let program = link_interface(&vertex.interface, &fragment.interface, &attributes, &uniforms)
        .map_err(|log| anyhow::anyhow!("failed to link program:\n{log}"))?;

    let report = InspectReport {
        vertex: &vertex.interface,
        fragment: &fragment.interface,
        program: &program,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn compile_file(kind: StageKind, path: &Path) -> Result<CompiledStage> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {kind} shader {}", path.display()))?;
    let stage = compile_glsl(kind, &source).with_context(|| path.display().to_string())?;
    Ok(stage)
}

pub fn list() {
    println!("Bundled demos:");
    for info in demos::CATALOG {
        println!("  {:<10} {}", info.name, info.summary);
    }
}
