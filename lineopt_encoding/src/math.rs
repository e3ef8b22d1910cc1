// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::ops::Mul;

use bytemuck::{Pod, Zeroable};

/// Column major 4x4 matrix.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Mat4(pub [f32; 16]);

impl Mat4 {
    /// Identity matrix.
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Right handed view matrix looking from `eye` toward `target`.
    pub fn look_at(eye: [f32; 3], target: [f32; 3], up: [f32; 3]) -> Self {
        let f = normalize(sub(target, eye));
        let s = normalize(cross(f, up));
        let u = cross(s, f);
        Self([
            s[0],
            u[0],
            -f[0],
            0.0,
            s[1],
            u[1],
            -f[1],
            0.0,
            s[2],
            u[2],
            -f[2],
            0.0,
            -dot(s, eye),
            -dot(u, eye),
            dot(f, eye),
            1.0,
        ])
    }

    /// Right handed perspective projection mapping depth to `[0, 1]`.
    ///
    /// `fov_y` is in radians.
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let h = 1.0 / (0.5 * fov_y).tan();
        let w = h / aspect;
        let r = far / (near - far);
        Self([
            w,
            0.0,
            0.0,
            0.0,
            0.0,
            h,
            0.0,
            0.0,
            0.0,
            0.0,
            r,
            -1.0,
            0.0,
            0.0,
            r * near,
            0.0,
        ])
    }

    /// Transforms a point, returning homogeneous clip coordinates.
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 4] {
        let m = &self.0;
        std::array::from_fn(|row| m[row] * p[0] + m[4 + row] * p[1] + m[8 + row] * p[2] + m[12 + row])
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Mat4 {
    type Output = Self;

    #[inline]
    fn mul(self, other: Self) -> Self {
        let (a, b) = (&self.0, &other.0);
        Self(std::array::from_fn(|i| {
            let (col, row) = (i / 4, i % 4);
            (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum()
        }))
    }
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(a: [f32; 3]) -> [f32; 3] {
    let len = dot(a, a).sqrt();
    if len > 0.0 {
        [a[0] / len, a[1] / len, a[2] / len]
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::Mat4;

    fn assert_near(a: [f32; 4], b: [f32; 4]) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn identity_is_neutral() {
        let m = Mat4::look_at([1.0, 2.0, 3.0], [0.0; 3], [0.0, 1.0, 0.0]);
        assert_eq!(m * Mat4::IDENTITY, m);
        assert_eq!(Mat4::IDENTITY * m, m);
    }

    #[test]
    fn look_at_moves_target_onto_negative_z() {
        let view = Mat4::look_at([0.0, 0.0, 5.0], [0.0; 3], [0.0, 1.0, 0.0]);
        assert_near(view.transform_point([0.0; 3]), [0.0, 0.0, -5.0, 1.0]);
    }

    #[test]
    fn perspective_maps_near_and_far() {
        let proj = Mat4::perspective(1.0, 1.0, 0.5, 10.0);
        let near = proj.transform_point([0.0, 0.0, -0.5]);
        let far = proj.transform_point([0.0, 0.0, -10.0]);
        assert!((near[2] / near[3]).abs() < 1e-5);
        assert!((far[2] / far[3] - 1.0).abs() < 1e-5);
    }
}
