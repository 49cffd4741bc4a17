//! 6-DoF pose as a row-major 4x4 matrix.

use serde::{Deserialize, Serialize};

/// Number of components in a [`Transform`].
pub const TRANSFORM_LEN: usize = 16;

/// Rigid transform in the shared coordinate frame.
///
/// Stored as 16 `f64` in row-major order, matching the wire layout. The
/// translation lives in the last column (`m[3]`, `m[7]`, `m[11]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform([f64; TRANSFORM_LEN]);

impl Transform {
    /// Identity transform.
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Build a transform from its row-major components.
    pub const fn from_row_major(values: [f64; TRANSFORM_LEN]) -> Self {
        Self(values)
    }

    /// Build a transform from four rows.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        let mut values = [0.0; TRANSFORM_LEN];
        for (r, row) in rows.iter().enumerate() {
            values[r * 4..r * 4 + 4].copy_from_slice(row);
        }
        Self(values)
    }

    /// Pure translation.
    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        let mut t = Self::IDENTITY;
        t.0[3] = x;
        t.0[7] = y;
        t.0[11] = z;
        t
    }

    /// Row-major components.
    pub const fn as_row_major(&self) -> &[f64; TRANSFORM_LEN] {
        &self.0
    }

    /// The matrix as four rows.
    pub fn rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            row.copy_from_slice(&self.0[r * 4..r * 4 + 4]);
        }
        rows
    }

    /// Translation component.
    pub fn position(&self) -> [f64; 3] {
        [self.0[3], self.0[7], self.0[11]]
    }

    /// True if every component is finite.
    ///
    /// Non-finite poses cannot be placed and are rejected on decode.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
