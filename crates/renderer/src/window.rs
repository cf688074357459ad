use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::demo::Demo;
use crate::gpu::{Canvas, Frame, GpuContext, Presenter, WindowSurface};
use crate::runtime::{FrameLoop, FramePacer};
use crate::types::HostOptions;
use crate::viewport::{scale_factor_for_key, Viewport};

/// Frame cap applied on software rasterizers unless the caller picked one.
const SOFTWARE_FPS_CAP: f32 = 15.0;

/// Everything the interactive host owns. `surface` is declared before
/// `window` so it is dropped first.
struct WindowHost {
    demo: Box<dyn Demo>,
    presenter: Presenter,
    canvas: Canvas,
    surface: WindowSurface,
    context: GpuContext,
    window: Arc<Window>,
    viewport: Viewport,
    frame_loop: FrameLoop,
    pacer: FramePacer,
    pixel_ratio_override: Option<f64>,
    stop_at: Option<Instant>,
}

enum RedrawOutcome {
    Presented,
    Skipped,
    Stopped,
}

/// Opens a window and drives `demo` until it is closed, Escape is pressed,
/// `run_for` elapses or a frame fails.
pub fn run_windowed(options: HostOptions, demo: Box<dyn Demo>) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = WindowBuilder::new()
        .with_title(options.title.clone())
        .with_inner_size(PhysicalSize::new(options.window_size.0, options.window_size.1))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut host = WindowHost::new(window, &options, demo)?;
    tracing::info!(
        demo = host.demo.name(),
        adapter = %host.context.adapter_profile().name,
        width = host.viewport.physical_size().width,
        height = host.viewport.physical_size().height,
        scale = host.viewport.scale_factor(),
        "window host started; digits 0-9 change the scale factor, Escape quits"
    );

    let mut failure: Option<anyhow::Error> = None;
    let failure_slot = &mut failure;
    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == host.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                host.frame_loop.cancel();
                elwt.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if host.handle_key(&event) {
                    elwt.exit();
                }
            }
            WindowEvent::Resized(new_size) => host.resize_window(new_size),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                host.pixel_ratio_changed(scale_factor);
            }
            WindowEvent::RedrawRequested => match host.redraw() {
                Ok(RedrawOutcome::Presented) | Ok(RedrawOutcome::Skipped) => {}
                Ok(RedrawOutcome::Stopped) => elwt.exit(),
                Err(err) => {
                    host.frame_loop.cancel();
                    *failure_slot = Some(err);
                    elwt.exit();
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if host.stop_at.is_some_and(|stop_at| now >= stop_at) {
                tracing::info!("run duration reached; stopping");
                host.frame_loop.cancel();
            }
            if !host.frame_loop.is_running() {
                elwt.exit();
                return;
            }
            if host.pacer.ready(now) {
                host.window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = host.pacer.next_deadline() {
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
        }
        _ => {}
    });

    if let Some(err) = failure {
        return Err(err);
    }
    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

impl WindowHost {
    fn new(window: Arc<Window>, options: &HostOptions, mut demo: Box<dyn Demo>) -> Result<Self> {
        let inner_size = window.inner_size();
        let (context, surface) = GpuContext::with_window(window.as_ref(), inner_size, &options.gpu)
            .context("failed to initialise GPU for the window")?;

        let window_ratio = window.scale_factor();
        let pixel_ratio = options.device_pixel_ratio.unwrap_or(window_ratio);
        let viewport = Viewport::new(
            inner_size.to_logical::<f64>(window_ratio),
            f64::from(options.scale_factor),
            pixel_ratio,
        )
        .context("invalid viewport settings")?;

        let mut canvas = Canvas::new(&context, PhysicalSize::new(1, 1));
        canvas.resize(&context, viewport.physical_size());
        let presenter = Presenter::new(&context).context("failed to build the canvas presenter")?;

        demo.setup(&context, &viewport)
            .with_context(|| format!("failed to set up demo '{}'", demo.name()))?;
        demo.resize(&viewport);

        let profile = context.adapter_profile();
        let mut target_fps = options.target_fps;
        if target_fps.is_none() && profile.is_software() {
            tracing::warn!(
                adapter = %profile.name,
                backend = ?profile.backend,
                cap = SOFTWARE_FPS_CAP,
                "software rasterizer detected; capping frame rate (override with --fps)"
            );
            target_fps = Some(SOFTWARE_FPS_CAP);
        }

        Ok(Self {
            demo,
            presenter,
            canvas,
            surface,
            context,
            window,
            viewport,
            frame_loop: FrameLoop::system(),
            pacer: FramePacer::new(target_fps),
            pixel_ratio_override: options.device_pixel_ratio,
            stop_at: options.run_for.map(|duration| Instant::now() + duration),
        })
    }

    /// Returns true when the key asks the host to quit.
    fn handle_key(&mut self, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed || event.repeat {
            return false;
        }
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => {
                self.frame_loop.cancel();
                true
            }
            Key::Character(text) => {
                if let Some(factor) = text.chars().next().and_then(scale_factor_for_key) {
                    match self.viewport.set_scale_factor(f64::from(factor)) {
                        Ok(physical) => {
                            tracing::info!(
                                scale = factor,
                                width = physical.width,
                                height = physical.height,
                                "scale factor changed"
                            );
                            self.sync_canvas();
                        }
                        Err(err) => tracing::warn!(%err, "ignoring scale factor"),
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn resize_window(&mut self, new_size: PhysicalSize<u32>) {
        self.surface.resize(&self.context, new_size);
        self.viewport
            .set_logical_size(new_size.to_logical::<f64>(self.window.scale_factor()));
        self.sync_canvas();
    }

    fn pixel_ratio_changed(&mut self, ratio: f64) {
        if self.pixel_ratio_override.is_some() {
            return;
        }
        match self.viewport.set_device_pixel_ratio(ratio) {
            Ok(_) => self.sync_canvas(),
            Err(err) => tracing::warn!(%err, "ignoring device pixel ratio"),
        }
    }

    /// Pushes a recomputed viewport to the canvas and the demo. Takes effect
    /// from the next frame on.
    fn sync_canvas(&mut self) {
        if self.canvas.resize(&self.context, self.viewport.physical_size()) {
            tracing::debug!(size = ?self.canvas.size(), "canvas resized");
        }
        self.demo.resize(&self.viewport);
    }

    fn redraw(&mut self) -> Result<RedrawOutcome> {
        let surface_texture = match self.surface.acquire() {
            Ok(texture) => texture,
            Err(err) => return self.handle_surface_error(err),
        };

        let rendered = self.frame_loop.tick(|time| {
            let mut frame = Frame::for_canvas(&self.context, &self.canvas);
            self.demo.render(&mut frame, time)?;
            frame.submit();
            Ok::<_, crate::error::DrawError>(())
        });
        match rendered {
            None => return Ok(RedrawOutcome::Stopped),
            Some(result) => {
                result.with_context(|| format!("demo '{}' failed to draw", self.demo.name()))?
            }
        }

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.presenter
            .present(
                &self.context,
                &self.canvas,
                &view,
                self.surface.format(),
                self.surface.size(),
            )
            .context("failed to present the canvas")?;
        self.window.pre_present_notify();
        surface_texture.present();
        Ok(RedrawOutcome::Presented)
    }

    fn handle_surface_error(&mut self, err: wgpu::SurfaceError) -> Result<RedrawOutcome> {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                tracing::debug!(?err, "reconfiguring surface");
                self.surface.reconfigure(&self.context);
                Ok(RedrawOutcome::Skipped)
            }
            wgpu::SurfaceError::OutOfMemory => Err(anyhow!("surface out of memory")),
            wgpu::SurfaceError::Timeout => {
                tracing::warn!("surface timeout; retrying next frame");
                Ok(RedrawOutcome::Skipped)
            }
            other => {
                tracing::warn!(error = ?other, "surface error; retrying next frame");
                Ok(RedrawOutcome::Skipped)
            }
        }
    }
}
