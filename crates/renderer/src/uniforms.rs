//! CPU shadows of uniform blocks and the value encoders that fill them.
//!
//! Setters write into a shadow at the offset reflection reported; the shadow
//! is copied into the GPU buffer inside the command stream right before the
//! program's next draw, so each draw observes the values set before it.
//! Copies go through the frame's staging belt.

use wgpu::util::StagingBelt;

use crate::gpu::{GpuContext, ResourceClass, Tracked};
use crate::math::Matrix;
use crate::reflect::{ScalarType, UniformBlockLayout, ValueType};

/// Encodes a single float for a `float` slot.
pub(crate) fn encode_scalar(ty: ValueType, value: f32) -> Result<Vec<u8>, String> {
    match ty {
        ValueType::Scalar {
            scalar: ScalarType::Float,
        } => Ok(bytemuck::bytes_of(&value).to_vec()),
        other => Err(format!("cannot write a float into a {other:?} uniform")),
    }
}

/// Encodes an integer for `int`, `uint` or `bool` slots (all 4 bytes wide).
pub(crate) fn encode_int(ty: ValueType, value: i32) -> Result<Vec<u8>, String> {
    match ty {
        ValueType::Scalar {
            scalar: ScalarType::Int,
        } => Ok(bytemuck::bytes_of(&value).to_vec()),
        ValueType::Scalar {
            scalar: ScalarType::Uint | ScalarType::Bool,
        } => {
            let value = u32::try_from(value)
                .map_err(|_| format!("cannot write negative {value} into an unsigned uniform"))?;
            Ok(bytemuck::bytes_of(&value).to_vec())
        }
        other => Err(format!("cannot write an integer into a {other:?} uniform")),
    }
}

/// Encodes `values` for a float vector slot of exactly `values.len()` components.
pub(crate) fn encode_vector(ty: ValueType, values: &[f32]) -> Result<Vec<u8>, String> {
    match ty {
        ValueType::Vector {
            scalar: ScalarType::Float,
            size,
        } if usize::from(size) == values.len() => Ok(bytemuck::cast_slice(values).to_vec()),
        ValueType::Scalar {
            scalar: ScalarType::Float,
        } if values.len() == 1 => Ok(bytemuck::cast_slice(values).to_vec()),
        other => Err(format!(
            "cannot write {} floats into a {other:?} uniform",
            values.len()
        )),
    }
}

/// Encodes a square matrix column by column, each column padded to 16 bytes.
///
/// std140 blocks cannot hold two-row matrices, so a 2×2 matrix goes into a
/// `mat2x4` slot: the shader reads it back with `mat2(u_matrix)`. More
/// generally any slot with `N` columns and at least `N` rows accepts a
/// `Matrix<N>`; the extra rows stay zero.
pub(crate) fn encode_matrix<const N: usize>(
    ty: ValueType,
    matrix: &Matrix<N>,
) -> Result<Vec<u8>, String> {
    match ty {
        ValueType::Matrix { columns, rows }
            if usize::from(columns) == N && usize::from(rows) >= N =>
        {
            let mut bytes = vec![0u8; MATRIX_COLUMN_STRIDE * N];
            for (index, column) in matrix.columns().iter().enumerate() {
                let start = index * MATRIX_COLUMN_STRIDE;
                let column_bytes: &[u8] = bytemuck::cast_slice(column);
                bytes[start..start + column_bytes.len()].copy_from_slice(column_bytes);
            }
            Ok(bytes)
        }
        other => Err(format!("cannot write a mat{N} into a {other:?} uniform")),
    }
}

const MATRIX_COLUMN_STRIDE: usize = 16;

/// Host-side copy of one uniform block.
#[derive(Debug, Clone)]
pub(crate) struct BlockShadow {
    pub group: u32,
    pub binding: u32,
    bytes: Vec<u8>,
    dirty: bool,
}

impl BlockShadow {
    pub(crate) fn new(layout: &UniformBlockLayout) -> Self {
        Self {
            group: layout.group,
            binding: layout.binding,
            bytes: vec![0; padded_block_size(layout.size) as usize],
            dirty: true,
        }
    }

    pub(crate) fn write(&mut self, offset: u32, data: &[u8]) {
        let start = offset as usize;
        let end = start + data.len();
        if end > self.bytes.len() {
            tracing::warn!(
                group = self.group,
                binding = self.binding,
                offset,
                len = data.len(),
                "uniform write exceeds block size; ignoring"
            );
            return;
        }
        // Skip identical writes so unchanged uniforms don't force an upload.
        if self.bytes[start..end] != *data {
            self.bytes[start..end].copy_from_slice(data);
            self.dirty = true;
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }
}

fn padded_block_size(size: u32) -> u64 {
    u64::from(size.max(16)).next_multiple_of(16)
}

struct UniformBlock {
    shadow: BlockShadow,
    buffer: Tracked<wgpu::Buffer>,
}

/// All uniform blocks of one program, with their GPU buffers.
pub(crate) struct UniformStore {
    blocks: Vec<UniformBlock>,
}

impl UniformStore {
    pub(crate) fn new(context: &GpuContext, label: &str, layouts: &[UniformBlockLayout]) -> Self {
        let blocks = layouts
            .iter()
            .map(|layout| {
                let shadow = BlockShadow::new(layout);
                let buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size: shadow.bytes().len() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                UniformBlock {
                    shadow,
                    buffer: Tracked::new(buffer, context.ledger(), ResourceClass::Buffer),
                }
            })
            .collect();
        Self { blocks }
    }

    pub(crate) fn write(&mut self, group: u32, binding: u32, offset: u32, data: &[u8]) {
        if let Some(block) = self
            .blocks
            .iter_mut()
            .find(|block| block.shadow.group == group && block.shadow.binding == binding)
        {
            block.shadow.write(offset, data);
        }
    }

    pub(crate) fn buffer(&self, group: u32, binding: u32) -> Option<&wgpu::Buffer> {
        self.blocks
            .iter()
            .find(|block| block.shadow.group == group && block.shadow.binding == binding)
            .map(|block| &*block.buffer)
    }

    /// Records copies of every dirty shadow into `encoder`.
    pub(crate) fn flush(
        &mut self,
        context: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        staging: &mut StagingBelt,
    ) {
        for block in self.blocks.iter_mut().filter(|block| block.shadow.dirty) {
            let bytes = block.shadow.bytes();
            let Some(size) = wgpu::BufferSize::new(bytes.len() as u64) else {
                continue;
            };
            staging
                .write_buffer(encoder, &block.buffer, 0, size, &context.device)
                .copy_from_slice(bytes);
            block.shadow.dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Mat2, Mat4};
    use crate::reflect::UniformMember;

    const FLOAT: ValueType = ValueType::Scalar {
        scalar: ScalarType::Float,
    };
    const VEC2: ValueType = ValueType::Vector {
        scalar: ScalarType::Float,
        size: 2,
    };

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes(chunk.try_into().unwrap()))
            .collect()
    }

    fn layout(size: u32) -> UniformBlockLayout {
        UniformBlockLayout {
            name: Some("Globals".into()),
            group: 0,
            binding: 0,
            size,
            members: vec![UniformMember {
                name: "u_time".into(),
                offset: 8,
                ty: FLOAT,
            }],
        }
    }

    #[test]
    fn vector_length_must_match_slot() {
        assert_eq!(encode_vector(VEC2, &[1.0, 2.0]).unwrap().len(), 8);
        assert!(encode_vector(VEC2, &[1.0, 2.0, 3.0]).is_err());
        assert!(encode_vector(FLOAT, &[1.0]).is_ok());
    }

    #[test]
    fn scalar_refuses_matrix_slot() {
        let mat4 = ValueType::Matrix {
            columns: 4,
            rows: 4,
        };
        assert!(encode_scalar(mat4, 1.0).is_err());
        assert!(encode_matrix(mat4, &Mat4::identity()).is_ok());
        assert!(encode_matrix(mat4, &Mat2::identity()).is_err());
    }

    #[test]
    fn mat4_columns_are_sixteen_bytes_apart() {
        let ty = ValueType::Matrix {
            columns: 4,
            rows: 4,
        };
        let bytes = encode_matrix(ty, &Mat4::translation(3.0, 4.0, 5.0)).unwrap();
        assert_eq!(bytes.len(), 64);
        assert_eq!(&floats(&bytes)[12..16], &[3.0, 4.0, 5.0, 1.0]);
    }

    #[test]
    fn mat2_fills_the_top_of_a_mat2x4_slot() {
        let ty = ValueType::Matrix {
            columns: 2,
            rows: 4,
        };
        let bytes = encode_matrix(ty, &Mat2::from_columns([[1.0, 2.0], [3.0, 4.0]])).unwrap();
        assert_eq!(floats(&bytes), vec![1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 0.0, 0.0]);

        let too_few_rows = ValueType::Matrix {
            columns: 2,
            rows: 1,
        };
        assert!(encode_matrix(too_few_rows, &Mat2::identity()).is_err());
    }

    #[test]
    fn negative_int_rejected_for_unsigned_slot() {
        let uint = ValueType::Scalar {
            scalar: ScalarType::Uint,
        };
        assert!(encode_int(uint, -1).is_err());
        assert_eq!(encode_int(uint, 7).unwrap(), 7u32.to_ne_bytes().to_vec());
    }

    #[test]
    fn shadow_writes_land_at_offset_and_mark_dirty() {
        let mut shadow = BlockShadow::new(&layout(12));
        assert_eq!(shadow.bytes().len(), 16);
        shadow.dirty = false;

        shadow.write(8, &encode_scalar(FLOAT, 2.5).unwrap());
        assert!(shadow.is_dirty());
        assert_eq!(floats(shadow.bytes()), vec![0.0, 0.0, 2.5, 0.0]);

        shadow.dirty = false;
        shadow.write(8, &encode_scalar(FLOAT, 2.5).unwrap());
        assert!(!shadow.is_dirty(), "identical write must not dirty the block");
    }

    #[test]
    fn out_of_range_write_is_dropped() {
        let mut shadow = BlockShadow::new(&layout(16));
        shadow.dirty = false;
        shadow.write(12, &[0u8; 8]);
        assert!(!shadow.is_dirty());
    }
}
