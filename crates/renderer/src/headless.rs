//! Window-less host: renders a demo into a canvas for a bounded number of
//! frames, or captures a single frame at a fixed timestamp.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use image::RgbaImage;
use winit::dpi::LogicalSize;

use crate::demo::Demo;
use crate::gpu::{Canvas, Frame, GpuContext};
use crate::runtime::{FixedTimeSource, FrameLoop, FramePacer, SteppedTimeSource};
use crate::viewport::Viewport;

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessOptions {
    /// Logical canvas size.
    pub size: (u32, u32),
    pub scale_factor: f64,
    pub device_pixel_ratio: f64,
    /// Stop after this many frames.
    pub frames: Option<u64>,
    /// Stop once this much wall-clock time has passed.
    pub duration: Option<Duration>,
    /// Caps the frame rate and sets the simulated time step (60 when unset).
    pub target_fps: Option<f32>,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            size: (640, 360),
            scale_factor: 1.0,
            device_pixel_ratio: 1.0,
            frames: Some(1),
            duration: None,
            target_fps: None,
        }
    }
}

/// Summary of a headless run. `last_frame` holds the canvas contents after
/// the final frame.
#[derive(Debug)]
pub struct HeadlessReport {
    pub frames: u64,
    pub wall_time: Duration,
    pub last_frame: RgbaImage,
}

pub fn run_headless(
    context: &GpuContext,
    demo: &mut dyn Demo,
    options: &HeadlessOptions,
) -> Result<HeadlessReport> {
    if options.frames.is_none() && options.duration.is_none() {
        bail!("a headless run needs a frame count or a duration");
    }
    if options.frames == Some(0) {
        bail!("frame count must be at least 1");
    }

    let viewport = Viewport::new(
        LogicalSize::new(f64::from(options.size.0), f64::from(options.size.1)),
        options.scale_factor,
        options.device_pixel_ratio,
    )
    .context("invalid headless viewport")?;
    let canvas = prepare_demo(context, demo, &viewport)?;

    let source = SteppedTimeSource::from_fps(options.target_fps.unwrap_or(60.0));
    let mut frame_loop = FrameLoop::start(Box::new(source));
    let mut pacer = FramePacer::new(options.target_fps);
    let started = Instant::now();
    let deadline = options.duration.map(|duration| started + duration);

    tracing::info!(
        demo = demo.name(),
        width = canvas.size().width,
        height = canvas.size().height,
        frames = ?options.frames,
        duration = ?options.duration,
        "starting headless run"
    );

    let frames = frame_loop.run(&mut pacer, |time, cancel| {
        let mut frame = Frame::for_canvas(context, &canvas);
        demo.render(&mut frame, time)
            .with_context(|| format!("demo '{}' failed to draw frame {}", demo.name(), time.frame_index))?;
        frame.submit();

        let done_by_count = options
            .frames
            .is_some_and(|limit| time.frame_index + 1 >= limit);
        let done_by_time = deadline.is_some_and(|deadline| Instant::now() >= deadline);
        if done_by_count || done_by_time {
            cancel.cancel();
        }
        Ok(())
    })?;

    let last_frame = canvas
        .read_pixels(context)
        .context("failed to read back the final frame")?;
    let wall_time = started.elapsed();
    tracing::info!(frames, ?wall_time, "headless run finished");
    Ok(HeadlessReport {
        frames,
        wall_time,
        last_frame,
    })
}

/// Renders exactly one frame of `demo` at `time` seconds and returns it.
pub fn capture_frame(
    context: &GpuContext,
    demo: &mut dyn Demo,
    size: (u32, u32),
    scale_factor: f64,
    time: f32,
) -> Result<RgbaImage> {
    let viewport = Viewport::new(
        LogicalSize::new(f64::from(size.0), f64::from(size.1)),
        scale_factor,
        1.0,
    )
    .context("invalid capture viewport")?;
    let canvas = prepare_demo(context, demo, &viewport)?;

    let mut frame_loop = FrameLoop::start(Box::new(FixedTimeSource::new(time)));
    frame_loop
        .tick(|time| {
            let mut frame = Frame::for_canvas(context, &canvas);
            demo.render(&mut frame, time)?;
            frame.submit();
            Ok::<_, crate::error::DrawError>(())
        })
        .context("frame loop was cancelled before the capture")?
        .with_context(|| format!("demo '{}' failed to draw", demo.name()))?;
    frame_loop.cancel();

    canvas
        .read_pixels(context)
        .context("failed to read back the captured frame")
}

fn prepare_demo(context: &GpuContext, demo: &mut dyn Demo, viewport: &Viewport) -> Result<Canvas> {
    let canvas = Canvas::new(context, viewport.physical_size());
    demo.setup(context, viewport)
        .with_context(|| format!("failed to set up demo '{}'", demo.name()))?;
    demo.resize(viewport);
    Ok(canvas)
}
