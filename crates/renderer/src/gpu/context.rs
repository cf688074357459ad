use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::util::StagingBelt;
use winit::dpi::PhysicalSize;

use super::ledger::{LiveResources, ResourceLedger};
use crate::types::{AdapterProfile, GpuOptions, GpuPowerPreference};

/// Size of each staging chunk; larger uploads get a chunk of their own.
pub(crate) const STAGING_CHUNK_SIZE: wgpu::BufferAddress = 16 * 1024;

/// Instance, adapter, device and queue shared by every program and target.
pub struct GpuContext {
    _instance: wgpu::Instance,
    staging: Mutex<StagingBelt>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_profile: AdapterProfile,
    ledger: Arc<ResourceLedger>,
}

/// Swapchain wiring for a window; kept apart from the context so the same
/// device can also render headless.
pub struct WindowSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Creates a context without any presentation surface.
    pub fn headless(options: &GpuOptions) -> Result<Self> {
        let instance = create_instance();
        let adapter = request_adapter(&instance, options, None)?;
        Self::from_adapter(instance, adapter)
    }

    /// Creates a context plus a configured surface for `target`.
    ///
    /// # Safety contract
    /// The caller must keep `target` alive for as long as the returned
    /// [`WindowSurface`] exists; the window host does so by holding the
    /// window in an `Arc` next to the surface.
    pub fn with_window<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        options: &GpuOptions,
    ) -> Result<(Self, WindowSurface)>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = create_instance();

        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = request_adapter(&instance, options, Some(&surface))?;
        let surface_caps = surface.get_capabilities(&adapter);
        let context = Self::from_adapter(instance, adapter)?;

        let max_dimension = context.adapter_profile.max_texture_dimension;
        let width = initial_size.width.max(1);
        let height = initial_size.height.max(1);
        if width > max_dimension || height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested surface is {width}x{height}"
            );
        }

        // Shader output is written as-is, so prefer a non-sRGB swapchain.
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        if format.is_srgb() {
            tracing::warn!(
                ?format,
                "no linear (non-sRGB) surface format available; colours will be gamma-encoded"
            );
        }

        let present_mode = surface_caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .unwrap_or(wgpu::PresentMode::AutoVsync);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        tracing::debug!(?format, ?present_mode, "configuring window surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &config);

        Ok((context, WindowSurface { surface, config }))
    }

    fn from_adapter(instance: wgpu::Instance, adapter: wgpu::Adapter) -> Result<Self> {
        let adapter_profile = AdapterProfile::from_wgpu(&adapter.get_info(), &adapter.limits());
        tracing::info!(
            name = %adapter_profile.name,
            backend = ?adapter_profile.backend,
            device_type = ?adapter_profile.device_type,
            is_software = adapter_profile.is_software(),
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("shaderdeck device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        // Errors outside an explicit scope are logged instead of aborting the process.
        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(%error, "uncaptured GPU error");
        }));

        Ok(Self {
            _instance: instance,
            staging: Mutex::new(StagingBelt::new(STAGING_CHUNK_SIZE)),
            device,
            queue,
            adapter_profile,
            ledger: Arc::new(ResourceLedger::default()),
        })
    }

    pub fn adapter_profile(&self) -> &AdapterProfile {
        &self.adapter_profile
    }

    /// Live GPU objects created through this context.
    pub fn live_resources(&self) -> LiveResources {
        self.ledger.snapshot()
    }

    pub(crate) fn ledger(&self) -> &Arc<ResourceLedger> {
        &self.ledger
    }

    /// Shared upload belt for in-frame buffer writes. A frame holds the lock
    /// from creation until it is submitted.
    pub(crate) fn staging(&self) -> &Mutex<StagingBelt> {
        &self.staging
    }

    /// Runs `create` inside a validation error scope and reports what the
    /// device complained about, if anything.
    pub(crate) fn with_error_scope<T>(
        &self,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }

    /// Blocks until all submitted work has finished.
    pub fn wait_idle(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| anyhow!("failed waiting for GPU: {err}"))?;
        Ok(())
    }
}

impl WindowSurface {
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    /// Reconfigures the swapchain; zero-sized requests (minimised windows) are ignored.
    pub fn resize(&mut self, context: &GpuContext, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&context.device, &self.config);
    }

    pub fn reconfigure(&self, context: &GpuContext) {
        self.surface.configure(&context.device, &self.config);
    }

    pub fn acquire(&self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.surface.get_current_texture()
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

fn request_adapter(
    instance: &wgpu::Instance,
    options: &GpuOptions,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<wgpu::Adapter> {
    let power_preference = match options.power {
        GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
        GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
    };
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference,
        compatible_surface: surface,
        force_fallback_adapter: options.force_fallback_adapter,
    }))
    .context("failed to find a suitable GPU adapter")
}
