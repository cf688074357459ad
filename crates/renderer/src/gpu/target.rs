use std::sync::mpsc;

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use winit::dpi::PhysicalSize;

use super::context::GpuContext;
use super::ledger::{ResourceClass, Tracked};

/// Format of every texture the scaffold renders into itself.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A colour texture that can be drawn into, sampled and copied out.
pub(crate) struct ColorTarget {
    texture: Tracked<wgpu::Texture>,
    view: wgpu::TextureView,
    size: PhysicalSize<u32>,
}

impl ColorTarget {
    pub(crate) fn new(context: &GpuContext, label: &str, size: PhysicalSize<u32>) -> Self {
        let size = PhysicalSize::new(size.width.max(1), size.height.max(1));
        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture: Tracked::new(texture, context.ledger(), ResourceClass::Texture),
            view,
            size,
        }
    }

    pub(crate) fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Copies the texture back to the host. Blocks until the GPU is done.
    pub(crate) fn read_pixels(&self, context: &GpuContext) -> Result<RgbaImage> {
        let PhysicalSize { width, height } = self.size;
        let unpadded_bytes_per_row = width * 4;
        let padded_bytes_per_row = unpadded_bytes_per_row
            .next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let readback = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("target readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("target readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        context.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        context.wait_idle()?;
        receiver
            .recv()
            .context("readback callback was dropped")?
            .map_err(|err| anyhow!("failed to map readback buffer: {err}"))?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in mapped.chunks_exact(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        drop(mapped);
        readback.unmap();

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("readback produced a short image"))
    }
}

/// Default render target of a demo: sized to the viewport's physical
/// resolution and recreated whenever that changes.
pub struct Canvas {
    target: ColorTarget,
}

impl Canvas {
    pub fn new(context: &GpuContext, size: PhysicalSize<u32>) -> Self {
        Self {
            target: ColorTarget::new(context, "canvas", size),
        }
    }

    /// Recreates the backing texture if `size` differs; returns whether it did.
    pub fn resize(&mut self, context: &GpuContext, size: PhysicalSize<u32>) -> bool {
        let max = context.adapter_profile().max_texture_dimension;
        let clamped = PhysicalSize::new(size.width.clamp(1, max), size.height.clamp(1, max));
        if clamped != size {
            tracing::warn!(
                requested = ?size,
                ?clamped,
                "canvas size exceeds GPU texture limit; clamping"
            );
        }
        if clamped == self.target.size() {
            return false;
        }
        self.target = ColorTarget::new(context, "canvas", clamped);
        true
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.target.size()
    }

    pub fn view(&self) -> &wgpu::TextureView {
        self.target.view()
    }

    pub fn read_pixels(&self, context: &GpuContext) -> Result<RgbaImage> {
        self.target.read_pixels(context)
    }
}

/// Fixed-resolution render target used as the first pass of a relay.
///
/// The resolution is chosen once and never follows the window.
pub struct OffscreenTarget {
    target: ColorTarget,
}

impl OffscreenTarget {
    pub fn new(context: &GpuContext, resolution: (u32, u32)) -> Self {
        let size = PhysicalSize::new(resolution.0, resolution.1);
        Self {
            target: ColorTarget::new(context, "offscreen target", size),
        }
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.target.size()
    }

    pub fn view(&self) -> &wgpu::TextureView {
        self.target.view()
    }

    pub fn read_pixels(&self, context: &GpuContext) -> Result<RgbaImage> {
        self.target.read_pixels(context)
    }
}
