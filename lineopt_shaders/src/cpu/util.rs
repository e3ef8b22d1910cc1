// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

//! Utility types

use std::ops::{Add, Mul, Sub};

use lineopt_encoding::{INVALID_INDEX, Mat4};

#[derive(Clone, Copy, Default, Debug, PartialEq)]
#[repr(C)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(self, other: Self) -> f32 {
        let d = self - other;
        d.dot(d).sqrt()
    }

    pub fn mix(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }
}

pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Same as the WGSL builtin.
pub fn unpack4x8unorm(x: u32) -> [f32; 4] {
    x.to_le_bytes().map(|b| b as f32 / 255.0)
}

/// Same as the WGSL builtin.
pub fn pack4x8unorm(x: [f32; 4]) -> u32 {
    u32::from_le_bytes(x.map(|c| (c.clamp(0.0, 1.0) * 255.0 + 0.5).floor() as u8))
}

/// Control point alpha cells hold f32 bits. Untouched cells are fully opaque.
pub fn decode_alpha(bits: u32) -> f32 {
    if bits == INVALID_INDEX {
        1.0
    } else {
        f32::from_bits(bits)
    }
}

fn cdf_at(cdf: &[f32], i: i32, n_bins: u32) -> f32 {
    if i < 0 {
        return 0.0;
    }
    cdf[(i as u32).min(n_bins - 1) as usize]
}

/// Linear lookup of `v` in the CDF, with an implicit zero before the first bin.
pub fn remap(cdf: &[f32], v: f32, n_bins: u32) -> f32 {
    let pos = v.clamp(0.0, 1.0) * n_bins as f32 - 1.0;
    let i = pos.floor();
    let lo = cdf_at(cdf, i as i32, n_bins);
    let hi = cdf_at(cdf, i as i32 + 1, n_bins);
    mix(lo, hi, pos - i)
}

pub struct ScreenSegment {
    /// Endpoints in pixels, y pointing down.
    pub a: Vec2,
    pub b: Vec2,
    pub depth_a: f32,
    pub depth_b: f32,
    /// Range of the original segment parameter covered after near plane clipping.
    pub t0: f32,
    pub t1: f32,
}

fn to_screen(clip: [f32; 4], size: Vec2) -> Vec2 {
    let x = clip[0] / clip[3];
    let y = clip[1] / clip[3];
    Vec2::new((x * 0.5 + 0.5) * size.x, (0.5 - y * 0.5) * size.y)
}

fn mix4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    std::array::from_fn(|i| mix(a[i], b[i], t))
}

/// Projects a segment, clipped against the near plane.
pub fn setup_segment(
    view_proj: &Mat4,
    pa: [f32; 3],
    pb: [f32; 3],
    size: Vec2,
) -> Option<ScreenSegment> {
    let ca = view_proj.transform_point(pa);
    let cb = view_proj.transform_point(pb);
    if ca[2] < 0.0 && cb[2] < 0.0 {
        return None;
    }
    let mut t0 = 0.0;
    let mut t1 = 1.0;
    if ca[2] < 0.0 {
        t0 = ca[2] / (ca[2] - cb[2]);
    }
    if cb[2] < 0.0 {
        t1 = ca[2] / (ca[2] - cb[2]);
    }
    let c0 = mix4(ca, cb, t0);
    let c1 = mix4(ca, cb, t1);
    Some(ScreenSegment {
        a: to_screen(c0, size),
        b: to_screen(c1, size),
        depth_a: (c0[2] / c0[3]).max(0.0),
        depth_b: (c1[2] / c1[3]).max(0.0),
        t0,
        t1,
    })
}

/// Position along the segment of the projection of `p`, unclamped.
pub fn segment_param(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len2 = ab.dot(ab);
    if len2 <= 1e-12 {
        return 0.0;
    }
    (p - a).dot(ab) / len2
}
