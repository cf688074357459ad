use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "shaderdeck",
    author,
    version,
    about = "Runs small GLSL demos on the GPU"
)]
pub struct Cli {
    /// Configuration file (TOML); can also be supplied via `SHADERDECK_CONFIG`.
    #[arg(long, global = true, env = "SHADERDECK_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a demo in a window (or headless with `--headless`).
    Run(RunArgs),
    /// Render a single frame of a demo to a PNG file.
    Capture(CaptureArgs),
    /// Compile and link two GLSL stages and print their binding tables as JSON.
    Inspect(InspectArgs),
    /// List the bundled demos.
    List,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Demo name; defaults to `run.demo` from the config file.
    #[arg(value_name = "DEMO")]
    pub demo: Option<String>,

    /// Logical pixels per rendered pixel (>1 renders fewer pixels).
    #[arg(long, value_name = "FACTOR", value_parser = parse_scale)]
    pub scale: Option<f32>,

    /// Window or canvas size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Frame rate cap (0=uncapped).
    #[arg(long, value_name = "FPS", value_parser = parse_fps)]
    pub fps: Option<f32>,

    /// Stop after this long (seconds or e.g. `30s`, `2m`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Render without a window.
    #[arg(long)]
    pub headless: bool,

    /// Number of frames to render in headless mode.
    #[arg(long, value_name = "N", requires = "headless")]
    pub frames: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct CaptureArgs {
    /// Demo name.
    #[arg(value_name = "DEMO")]
    pub demo: String,

    /// Destination PNG path.
    #[arg(long, short, value_name = "PATH", value_parser = parse_png_path)]
    pub output: PathBuf,

    /// Timestamp to render the frame at, in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0)]
    pub time: f32,

    /// Canvas size (e.g. `640x360`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Logical pixels per rendered pixel.
    #[arg(long, value_name = "FACTOR", value_parser = parse_scale)]
    pub scale: Option<f32>,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Vertex stage source.
    #[arg(long, value_name = "FILE")]
    pub vertex: PathBuf,

    /// Fragment stage source.
    #[arg(long, value_name = "FILE")]
    pub fragment: PathBuf,

    /// Attribute names to resolve (repeatable).
    #[arg(long = "attribute", value_name = "NAME")]
    pub attributes: Vec<String>,

    /// Uniform names to resolve (repeatable).
    #[arg(long = "uniform", value_name = "NAME")]
    pub uniforms: Vec<String>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = deckconfig::parse_resolution(value)?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_scale(value: &str) -> Result<f32, String> {
    let scale: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid scale factor '{value}'"))?;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(format!("scale factor must be > 0, got {scale}"));
    }
    Ok(scale)
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame rate '{value}'"))?;
    if !fps.is_finite() || fps < 0.0 {
        return Err("frame rate must be >= 0".into());
    }
    Ok(fps)
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let duration = deckconfig::parse_duration(value)?;
    if duration.is_zero() {
        return Err("duration must be greater than zero".into());
    }
    Ok(duration)
}

pub fn parse_png_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Ok(path),
        None => Err("output path has no extension; expected .png".to_string()),
        Some(other) => Err(format!("unsupported output format '.{other}'; expected .png")),
    }
}
