//! Just enough matrix math for demo transforms.
//!
//! Matrices are column-major: `columns[c][r]` is row `r` of column `c`, the
//! same order the GPU reads them in.

use std::ops::Mul;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix<const N: usize> {
    columns: [[f32; N]; N],
}

pub type Mat2 = Matrix<2>;
pub type Mat3 = Matrix<3>;
pub type Mat4 = Matrix<4>;

impl<const N: usize> Matrix<N> {
    pub fn identity() -> Self {
        let mut columns = [[0.0; N]; N];
        for (index, column) in columns.iter_mut().enumerate() {
            column[index] = 1.0;
        }
        Self { columns }
    }

    pub fn from_columns(columns: [[f32; N]; N]) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[[f32; N]; N] {
        &self.columns
    }

    pub fn at(&self, row: usize, column: usize) -> f32 {
        self.columns[column][row]
    }

    /// Applies the matrix to a column vector.
    pub fn transform(&self, vector: [f32; N]) -> [f32; N] {
        let mut out = [0.0; N];
        for (column, scale) in self.columns.iter().zip(vector) {
            for (row, value) in column.iter().enumerate() {
                out[row] += value * scale;
            }
        }
        out
    }
}

impl<const N: usize> Default for Matrix<N> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<const N: usize> Mul for Matrix<N> {
    type Output = Matrix<N>;

    fn mul(self, rhs: Matrix<N>) -> Matrix<N> {
        let mut columns = [[0.0; N]; N];
        for (column, out) in columns.iter_mut().enumerate() {
            *out = self.transform(rhs.columns[column]);
        }
        Matrix { columns }
    }
}

/// Multiplies `transforms` left to right: `m0 · m1 · … · mk`.
///
/// Applied to a vertex, the last matrix acts first. An empty list is the
/// identity.
pub fn compose<const N: usize>(transforms: &[Matrix<N>]) -> Matrix<N> {
    let mut result = Matrix::identity();
    for transform in transforms {
        result = result * *transform;
    }
    result
}

impl Mat4 {
    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut matrix = Self::identity();
        matrix.columns[3] = [x, y, z, 1.0];
        matrix
    }

    pub fn scale(x: f32, y: f32, z: f32) -> Self {
        Self::from_columns([
            [x, 0.0, 0.0, 0.0],
            [0.0, y, 0.0, 0.0],
            [0.0, 0.0, z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotation_x(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_columns([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, c, s, 0.0],
            [0.0, -s, c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotation_y(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_columns([
            [c, 0.0, -s, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [s, 0.0, c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotation_z(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_columns([
            [c, s, 0.0, 0.0],
            [-s, c, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Right-handed perspective projection mapping depth onto `0..=1`.
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let focal = 1.0 / (fov_y * 0.5).tan();
        let range = far / (near - far);
        Self::from_columns([
            [focal / aspect, 0.0, 0.0, 0.0],
            [0.0, focal, 0.0, 0.0],
            [0.0, 0.0, range, -1.0],
            [0.0, 0.0, range * near, 0.0],
        ])
    }
}

impl Mat3 {
    /// 2-D rotation in homogeneous coordinates.
    pub fn rotation(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_columns([[c, s, 0.0], [-s, c, 0.0], [0.0, 0.0, 1.0]])
    }

    pub fn translation(x: f32, y: f32) -> Self {
        Self::from_columns([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [x, y, 1.0]])
    }
}
