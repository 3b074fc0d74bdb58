// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Affine transforms for view nodes.

use paracore_property::Placement;

/// A row-major 4×4 affine transform applied to a view node and its children.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// The matrix rows. The last row is always `[0, 0, 0, 1]`.
    pub rows: [[f64; 4]; 4],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Builds the transform of a placement: its rotation followed by its
    /// translation.
    ///
    /// A zero quaternion is treated as no rotation.
    #[must_use]
    pub fn from_placement(placement: &Placement) -> Self {
        let [tx, ty, tz] = placement.base;
        let [x, y, z, w] = placement.rotation;
        let norm = (x * x + y * y + z * z + w * w).sqrt();
        let (x, y, z, w) = if norm > 0.0 {
            (x / norm, y / norm, z / norm, w / norm)
        } else {
            (0.0, 0.0, 0.0, 1.0)
        };
        Self {
            rows: [
                [
                    1.0 - 2.0 * (y * y + z * z),
                    2.0 * (x * y - z * w),
                    2.0 * (x * z + y * w),
                    tx,
                ],
                [
                    2.0 * (x * y + z * w),
                    1.0 - 2.0 * (x * x + z * z),
                    2.0 * (y * z - x * w),
                    ty,
                ],
                [
                    2.0 * (x * z - y * w),
                    2.0 * (y * z + x * w),
                    1.0 - 2.0 * (x * x + y * y),
                    tz,
                ],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Maps a point through the transform.
    #[must_use]
    pub fn apply(&self, point: [f64; 3]) -> [f64; 3] {
        let [px, py, pz] = point;
        let row = |r: &[f64; 4]| r[0] * px + r[1] * py + r[2] * pz + r[3];
        [row(&self.rows[0]), row(&self.rows[1]), row(&self.rows[2])]
    }

    /// Returns `true` if this is the identity.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f64; 3], b: [f64; 3]) -> bool {
        a.iter().zip(b).all(|(a, b)| (a - b).abs() < 1e-12)
    }

    #[test]
    fn identity_placement_is_identity() {
        assert!(Transform::from_placement(&Placement::IDENTITY).is_identity());
        assert!(Transform::default().is_identity());
    }

    #[test]
    fn translation_moves_points() {
        let t = Transform::from_placement(&Placement::from_translation(1.0, 2.0, 3.0));
        assert_eq!(t.apply([1.0, 1.0, 1.0]), [2.0, 3.0, 4.0]);
    }

    #[test]
    fn quarter_turn_about_z() {
        let half = core::f64::consts::FRAC_1_SQRT_2;
        let placement = Placement {
            base: [0.0, 0.0, 5.0],
            rotation: [0.0, 0.0, half, half],
        };
        let t = Transform::from_placement(&placement);
        assert!(close(t.apply([1.0, 0.0, 0.0]), [0.0, 1.0, 5.0]));
        assert!(close(t.apply([0.0, 1.0, 0.0]), [-1.0, 0.0, 5.0]));
    }

    #[test]
    fn unnormalized_and_zero_rotations() {
        let scaled = Placement {
            base: [0.0; 3],
            rotation: [0.0, 0.0, 2.0, 2.0],
        };
        let t = Transform::from_placement(&scaled);
        assert!(close(t.apply([1.0, 0.0, 0.0]), [0.0, 1.0, 0.0]));

        let zero = Placement {
            base: [0.0; 3],
            rotation: [0.0; 4],
        };
        assert!(Transform::from_placement(&zero).is_identity());
    }
}
