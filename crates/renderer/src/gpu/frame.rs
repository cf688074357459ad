use std::ops::Range;
use std::sync::MutexGuard;

use wgpu::util::StagingBelt;
use winit::dpi::PhysicalSize;

use super::context::{GpuContext, STAGING_CHUNK_SIZE};
use super::target::{Canvas, OffscreenTarget, TARGET_FORMAT};
use crate::error::DrawError;
use crate::program::Program;

#[derive(Clone)]
struct BoundTarget {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    viewport: PhysicalSize<u32>,
}

/// Upload belt a frame records its buffer writes through. Frames normally
/// borrow the context's belt; one created while another frame still holds it
/// gets a private belt instead.
enum Staging<'a> {
    Shared(MutexGuard<'a, StagingBelt>),
    Private(StagingBelt),
}

impl Staging<'_> {
    fn belt(&mut self) -> &mut StagingBelt {
        match self {
            Staging::Shared(guard) => &mut **guard,
            Staging::Private(belt) => belt,
        }
    }
}

/// Records one frame's passes into a single command encoder.
///
/// A frame always has a default ("screen") target and optionally switches to
/// offscreen targets in between. Passes run on the GPU in the order they
/// were recorded, so a target drawn earlier in the frame is complete by the
/// time a later pass samples it.
pub struct Frame<'a> {
    context: &'a GpuContext,
    encoder: wgpu::CommandEncoder,
    staging: Staging<'a>,
    screen: BoundTarget,
    current: BoundTarget,
    pending_clear: Option<wgpu::Color>,
    draws: u32,
}

impl<'a> Frame<'a> {
    /// Starts a frame whose default target is `view`, drawn at `viewport`.
    pub fn new(
        context: &'a GpuContext,
        view: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        viewport: PhysicalSize<u32>,
    ) -> Self {
        let screen = BoundTarget {
            view: view.clone(),
            format,
            viewport,
        };
        let encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        let staging = match context.staging().try_lock() {
            Ok(guard) => Staging::Shared(guard),
            Err(_) => Staging::Private(StagingBelt::new(STAGING_CHUNK_SIZE)),
        };
        Self {
            context,
            encoder,
            staging,
            current: screen.clone(),
            screen,
            pending_clear: None,
            draws: 0,
        }
    }

    pub fn for_canvas(context: &'a GpuContext, canvas: &Canvas) -> Self {
        Self::new(context, canvas.view(), TARGET_FORMAT, canvas.size())
    }

    pub fn context(&self) -> &'a GpuContext {
        self.context
    }

    /// Viewport of whichever target is currently bound.
    pub fn viewport(&self) -> PhysicalSize<u32> {
        self.current.viewport
    }

    /// Redirects subsequent draws into `target` at its fixed resolution.
    pub fn bind_offscreen(&mut self, target: &OffscreenTarget) {
        self.flush_clear();
        self.current = BoundTarget {
            view: target.view().clone(),
            format: TARGET_FORMAT,
            viewport: target.size(),
        };
    }

    /// Restores the default target and its viewport.
    pub fn bind_screen(&mut self) {
        self.flush_clear();
        self.current = self.screen.clone();
    }

    /// Clears the bound target before its next pass.
    pub fn clear(&mut self, rgba: [f64; 4]) {
        self.pending_clear = Some(wgpu::Color {
            r: rgba[0],
            g: rgba[1],
            b: rgba[2],
            a: rgba[3],
        });
    }

    /// Draws `vertices` of `program`'s bound geometry as a triangle list.
    pub fn draw(&mut self, program: &mut Program, vertices: Range<u32>) -> Result<(), DrawError> {
        let key = program.prepare(
            self.context,
            &mut self.encoder,
            self.staging.belt(),
            self.current.format,
            &vertices,
        )?;
        if vertices.is_empty() {
            return Ok(());
        }

        let load = match self.pending_clear.take() {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };
        let viewport = self.current.viewport;
        let mut pass = self.begin_pass(load);
        pass.set_viewport(
            0.0,
            0.0,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );
        program.record(&mut pass, &key, vertices);
        drop(pass);
        self.draws += 1;
        Ok(())
    }

    /// Finishes the encoder and hands it to the queue.
    pub fn submit(mut self) -> wgpu::SubmissionIndex {
        self.flush_clear();
        tracing::trace!(draws = self.draws, "submitting frame");
        let Frame {
            context,
            encoder,
            mut staging,
            ..
        } = self;
        staging.belt().finish();
        let index = context.queue.submit(Some(encoder.finish()));
        staging.belt().recall();
        index
    }

    fn flush_clear(&mut self) {
        if let Some(color) = self.pending_clear.take() {
            drop(self.begin_pass(wgpu::LoadOp::Clear(color)));
        }
    }

    fn begin_pass(&mut self, load: wgpu::LoadOp<wgpu::Color>) -> wgpu::RenderPass<'_> {
        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frame pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.current.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        })
    }
}
