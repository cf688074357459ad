//! Vertex data and how it is sliced into attributes.

use std::collections::BTreeSet;

use wgpu::util::StagingBelt;

use crate::gpu::{GpuContext, ResourceClass, Tracked};

const FLOAT_BYTES: u32 = std::mem::size_of::<f32>() as u32;

/// Where one attribute lives inside a [`GeometryBuffer`].
///
/// `stride` and `offset` are in bytes. A stride of 0 means tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSlice {
    pub name: String,
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
}

impl AttributeSlice {
    /// # Panics
    /// If the layout cannot describe float vertex data: `components` outside
    /// `1..=4`, a stride or offset that is not 4-byte aligned, or a non-zero
    /// stride shorter than one element.
    pub fn new(name: impl Into<String>, components: u32, stride: u32, offset: u32) -> Self {
        let name = name.into();
        assert!(
            (1..=4).contains(&components),
            "attribute '{name}' must have 1-4 components, got {components}"
        );
        assert!(
            stride % FLOAT_BYTES == 0 && offset % FLOAT_BYTES == 0,
            "attribute '{name}' stride ({stride}) and offset ({offset}) must be multiples of 4"
        );
        assert!(
            stride == 0 || stride >= components * FLOAT_BYTES,
            "attribute '{name}' stride {stride} is shorter than one {components}-float element"
        );
        Self {
            name,
            components,
            stride,
            offset,
        }
    }

    pub fn packed(name: impl Into<String>, components: u32) -> Self {
        Self::new(name, components, 0, 0)
    }

    pub fn effective_stride(&self) -> u32 {
        if self.stride == 0 {
            self.components * FLOAT_BYTES
        } else {
            self.stride
        }
    }

    pub(crate) fn vertex_format(&self) -> wgpu::VertexFormat {
        match self.components {
            1 => wgpu::VertexFormat::Float32,
            2 => wgpu::VertexFormat::Float32x2,
            3 => wgpu::VertexFormat::Float32x3,
            _ => wgpu::VertexFormat::Float32x4,
        }
    }

    /// How many whole vertices a buffer of `byte_len` bytes supplies.
    pub fn available_vertices(&self, byte_len: u64) -> u32 {
        let element = u64::from(self.components * FLOAT_BYTES);
        let offset = u64::from(self.offset);
        if byte_len < offset + element {
            return 0;
        }
        let count = (byte_len - offset - element) / u64::from(self.effective_stride()) + 1;
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Flat float data plus the attribute slices that read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryBuffer {
    data: Vec<f32>,
    slices: Vec<AttributeSlice>,
}

impl GeometryBuffer {
    /// # Panics
    /// If `slices` is empty or names the same attribute twice.
    pub fn new(data: Vec<f32>, slices: Vec<AttributeSlice>) -> Self {
        assert!(!slices.is_empty(), "geometry needs at least one attribute slice");
        let unique: BTreeSet<_> = slices.iter().map(|slice| slice.name.as_str()).collect();
        assert_eq!(
            unique.len(),
            slices.len(),
            "geometry slices must name distinct attributes"
        );
        Self { data, slices }
    }

    /// A buffer feeding a single tightly packed attribute.
    pub fn packed(name: impl Into<String>, data: Vec<f32>, components: u32) -> Self {
        Self::new(data, vec![AttributeSlice::packed(name, components)])
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn slices(&self) -> &[AttributeSlice] {
        &self.slices
    }

    pub fn byte_len(&self) -> u64 {
        (self.data.len() * std::mem::size_of::<f32>()) as u64
    }

    /// The vertex count every slice can supply.
    pub fn vertex_count(&self) -> u32 {
        self.slices
            .iter()
            .map(|slice| slice.available_vertices(self.byte_len()))
            .min()
            .unwrap_or(0)
    }
}

/// An attribute slice whose name already resolved to a shader location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedSlice {
    pub location: u32,
    pub slice: AttributeSlice,
}

struct BoundBuffer {
    /// Sorted attribute names fed by this buffer; re-binding the same set reuses it.
    key: Vec<String>,
    buffer: Tracked<wgpu::Buffer>,
    capacity: u64,
    byte_len: u64,
    slices: Vec<ResolvedSlice>,
    /// Contents waiting to be copied in ahead of the next draw.
    pending: Option<Vec<u8>>,
}

/// Vertex source for one location at draw time.
pub(crate) struct VertexSource<'a> {
    pub buffer: &'a wgpu::Buffer,
    pub slice: &'a ResolvedSlice,
    pub byte_len: u64,
}

/// The GPU buffers a program's attributes currently read from.
///
/// Uploads are not written straight to the queue: they wait until the next
/// draw records them into its frame's encoder, so a draw recorded before a
/// re-upload still reads the data it was issued with.
#[derive(Default)]
pub(crate) struct GeometryStore {
    buffers: Vec<BoundBuffer>,
}

impl GeometryStore {
    pub(crate) fn bind(
        &mut self,
        context: &GpuContext,
        label: &str,
        resolved: Vec<ResolvedSlice>,
        data: &[f32],
    ) {
        let mut key: Vec<String> = resolved.iter().map(|r| r.slice.name.clone()).collect();
        key.sort();
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let byte_len = bytes.len() as u64;

        if let Some(existing) = self.buffers.iter_mut().find(|bound| bound.key == key) {
            if byte_len > existing.capacity {
                existing.buffer = create_vertex_buffer(context, label, byte_len);
                existing.capacity = byte_len;
                tracing::debug!(program = label, bytes = byte_len, "grew vertex buffer");
            }
            existing.pending = Some(bytes.to_vec());
            existing.byte_len = byte_len;
            existing.slices = resolved;
            return;
        }

        // Attributes moving to a new buffer stop reading from their old one.
        for bound in &mut self.buffers {
            bound
                .slices
                .retain(|slice| !key.contains(&slice.slice.name));
            bound.key.retain(|name| !key.contains(name));
        }
        self.buffers.retain(|bound| !bound.slices.is_empty());

        let buffer = create_vertex_buffer(context, label, byte_len);
        self.buffers.push(BoundBuffer {
            key,
            buffer,
            capacity: byte_len,
            byte_len,
            slices: resolved,
            pending: Some(bytes.to_vec()),
        });
    }

    /// Records every pending upload into `encoder`.
    pub(crate) fn flush(
        &mut self,
        context: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        staging: &mut StagingBelt,
    ) {
        for bound in &mut self.buffers {
            let Some(bytes) = bound.pending.take() else {
                continue;
            };
            let Some(size) = wgpu::BufferSize::new(bytes.len() as u64) else {
                continue;
            };
            staging
                .write_buffer(encoder, &bound.buffer, 0, size, &context.device)
                .copy_from_slice(&bytes);
        }
    }

    pub(crate) fn source(&self, location: u32) -> Option<VertexSource<'_>> {
        self.buffers.iter().find_map(|bound| {
            bound
                .slices
                .iter()
                .find(|slice| slice.location == location)
                .map(|slice| VertexSource {
                    buffer: &bound.buffer,
                    slice,
                    byte_len: bound.byte_len,
                })
        })
    }

    pub(crate) fn buffer_count(&self) -> usize {
        self.buffers.len()
    }
}

fn create_vertex_buffer(context: &GpuContext, label: &str, byte_len: u64) -> Tracked<wgpu::Buffer> {
    let buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        // Zero-sized buffers cannot be bound, so keep one float of room.
        size: byte_len.max(u64::from(FLOAT_BYTES)),
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    Tracked::new(buffer, context.ledger(), ResourceClass::Buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_packed_vec2_vertices_from_six_floats() {
        let geometry = GeometryBuffer::packed("a_position", vec![0.0, 0.0, 0.0, 0.5, 0.7, 0.0], 2);
        assert_eq!(geometry.vertex_count(), 3);
    }

    #[test]
    fn interleaved_slices_share_the_shortest_count() {
        // position (3) + colour (3) per vertex, 4 vertices, last colour truncated.
        let mut data = vec![0.0; 6 * 4];
        data.truncate(6 * 4 - 1);
        let geometry = GeometryBuffer::new(
            data,
            vec![
                AttributeSlice::new("a_position", 3, 24, 0),
                AttributeSlice::new("a_color", 3, 24, 12),
            ],
        );
        assert_eq!(geometry.slices()[0].available_vertices(geometry.byte_len()), 4);
        assert_eq!(geometry.slices()[1].available_vertices(geometry.byte_len()), 3);
        assert_eq!(geometry.vertex_count(), 3);
    }

    #[test]
    fn offset_past_end_yields_no_vertices() {
        let slice = AttributeSlice::new("a_uv", 2, 16, 8);
        assert_eq!(slice.available_vertices(12), 0);
        assert_eq!(slice.available_vertices(16), 1);
    }

    #[test]
    #[should_panic(expected = "1-4 components")]
    fn rejects_five_components() {
        AttributeSlice::packed("a_bad", 5);
    }

    #[test]
    #[should_panic(expected = "shorter than one")]
    fn rejects_overlapping_stride() {
        AttributeSlice::new("a_bad", 4, 8, 0);
    }

    #[test]
    fn vertex_formats_follow_component_count() {
        assert_eq!(
            AttributeSlice::packed("a", 1).vertex_format(),
            wgpu::VertexFormat::Float32
        );
        assert_eq!(
            AttributeSlice::packed("a", 4).vertex_format(),
            wgpu::VertexFormat::Float32x4
        );
    }
}
