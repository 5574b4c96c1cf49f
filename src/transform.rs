//! 4x4 transforms with a tracked category.
//!
//! The category records the strongest structural guarantee the matrix still
//! satisfies. The traversal dispatches on it: pure translations fold into the
//! offset accumulator without touching the modelview stack, 2D-affine
//! transforms push a composed frame, and everything else is General.

use crate::geometry::Rect;

/// How much structure a [`Transform`] is known to have, ordered from weakest
/// to strongest. Composing two transforms takes the weaker category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransformCategory {
    /// Arbitrary 4x4 matrix, including rotations and projections.
    General,
    /// Scale and translate in the XY plane only.
    Affine2d,
    /// Translate in the XY plane only.
    Translate2d,
    Identity,
}

/// A 4x4 transformation matrix stored in row-major order, with its category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Matrix data in row-major order: [row0, row1, row2, row3]
    data: [f32; 16],
    category: TransformCategory,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        data: [
            1.0, 0.0, 0.0, 0.0, // row 0
            0.0, 1.0, 0.0, 0.0, // row 1
            0.0, 0.0, 1.0, 0.0, // row 2
            0.0, 0.0, 0.0, 1.0, // row 3
        ],
        category: TransformCategory::Identity,
    };

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            data: [
                1.0, 0.0, 0.0, x, // row 0
                0.0, 1.0, 0.0, y, // row 1
                0.0, 0.0, 1.0, 0.0, // row 2
                0.0, 0.0, 0.0, 1.0, // row 3
            ],
            category: if x == 0.0 && y == 0.0 {
                TransformCategory::Identity
            } else {
                TransformCategory::Translate2d
            },
        }
    }

    pub fn scale(s: f32) -> Self {
        Self::scale_xy(s, s)
    }

    pub fn scale_xy(sx: f32, sy: f32) -> Self {
        Self {
            data: [
                sx, 0.0, 0.0, 0.0, // row 0
                0.0, sy, 0.0, 0.0, // row 1
                0.0, 0.0, 1.0, 0.0, // row 2
                0.0, 0.0, 0.0, 1.0, // row 3
            ],
            category: if sx == 1.0 && sy == 1.0 {
                TransformCategory::Identity
            } else {
                TransformCategory::Affine2d
            },
        }
    }

    /// 2D rotation around the Z axis. Rotations are General: they cannot be
    /// folded into the offset accumulator or expressed as an axis-aligned
    /// scale.
    pub fn rotate(angle_radians: f32) -> Self {
        let cos = angle_radians.cos();
        let sin = angle_radians.sin();
        Self {
            data: [
                cos, -sin, 0.0, 0.0, // row 0
                sin, cos, 0.0, 0.0, // row 1
                0.0, 0.0, 1.0, 0.0, // row 2
                0.0, 0.0, 0.0, 1.0, // row 3
            ],
            category: TransformCategory::General,
        }
    }

    pub fn rotate_degrees(angle_degrees: f32) -> Self {
        Self::rotate(angle_degrees.to_radians())
    }

    /// An arbitrary caller-supplied matrix, row-major.
    pub fn from_matrix(data: [f32; 16]) -> Self {
        Self {
            data,
            category: TransformCategory::General,
        }
    }

    /// Orthographic projection mapping the given planes onto clip space.
    pub fn ortho(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Self {
        Self {
            data: [
                2.0 / (right - left),
                0.0,
                0.0,
                -(right + left) / (right - left),
                0.0,
                2.0 / (top - bottom),
                0.0,
                -(top + bottom) / (top - bottom),
                0.0,
                0.0,
                -2.0 / (far - near),
                -(far + near) / (far - near),
                0.0,
                0.0,
                0.0,
                1.0,
            ],
            category: TransformCategory::General,
        }
    }

    pub fn category(&self) -> TransformCategory {
        self.category
    }

    pub fn is_identity(&self) -> bool {
        self.category == TransformCategory::Identity
    }

    /// Compose this transform with another: self * other.
    /// Applies `other` first, then `self`. The result takes the weaker of the
    /// two categories.
    pub fn then(&self, other: &Transform) -> Transform {
        if self.is_identity() {
            return *other;
        }
        if other.is_identity() {
            return *self;
        }

        let a = &self.data;
        let b = &other.data;

        // Row-major indexing: element at row i, col j is at index i*4 + j
        let mut result = [0.0f32; 16];
        for i in 0..4 {
            for j in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += a[i * 4 + k] * b[k * 4 + j];
                }
                result[i * 4 + j] = sum;
            }
        }

        Transform {
            data: result,
            category: self.category.min(other.category),
        }
    }

    /// The translation components. Only meaningful for `Translate2d` and
    /// narrower categories.
    pub fn to_translate(&self) -> (f32, f32) {
        (self.data[3], self.data[7])
    }

    /// (sx, sy, dx, dy) for `Affine2d` and narrower categories.
    pub fn to_affine(&self) -> (f32, f32, f32, f32) {
        (self.data[0], self.data[5], self.data[3], self.data[7])
    }

    /// The scale this transform applies along the X and Y axes. Exact for
    /// affine categories; for General matrices the lengths of the transformed
    /// basis vectors.
    pub fn scale_factors(&self) -> (f32, f32) {
        match self.category {
            TransformCategory::Identity | TransformCategory::Translate2d => (1.0, 1.0),
            TransformCategory::Affine2d => (self.data[0].abs(), self.data[5].abs()),
            TransformCategory::General => {
                let sx = (self.data[0] * self.data[0] + self.data[4] * self.data[4]).sqrt();
                let sy = (self.data[1] * self.data[1] + self.data[5] * self.data[5]).sqrt();
                (sx, sy)
            }
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        // Homogeneous (x, y, 0, 1) with perspective divide for projective
        // matrices.
        let d = &self.data;
        let new_x = d[0] * x + d[1] * y + d[3];
        let new_y = d[4] * x + d[5] * y + d[7];
        let w = d[12] * x + d[13] * y + d[15];
        if w == 1.0 || w == 0.0 {
            (new_x, new_y)
        } else {
            (new_x / w, new_y / w)
        }
    }

    /// Axis-aligned bounding box of the four transformed corners.
    pub fn transform_bounds(&self, rect: &Rect) -> Rect {
        match self.category {
            TransformCategory::Identity => *rect,
            TransformCategory::Translate2d => rect.offset(self.data[3], self.data[7]),
            _ => Rect::from_points(&[
                self.transform_point(rect.x, rect.y),
                self.transform_point(rect.x + rect.width, rect.y),
                self.transform_point(rect.x, rect.y + rect.height),
                self.transform_point(rect.x + rect.width, rect.y + rect.height),
            ]),
        }
    }

    /// Column-major layout for the matrix uniform upload.
    pub fn to_cols(&self) -> [f32; 16] {
        let d = &self.data;
        [
            d[0], d[4], d[8], d[12], // col 0
            d[1], d[5], d[9], d[13], // col 1
            d[2], d[6], d[10], d[14], // col 2
            d[3], d[7], d[11], d[15], // col 3
        ]
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
