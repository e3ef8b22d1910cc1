// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bytemuck::{Pod, Zeroable};

/// End of a per-pixel list, an empty list head, and an unconstrained control point.
pub const INVALID_INDEX: u32 = 0xffff_ffff;

/// Bits of [`Fragment::coverage`] holding the antialiasing coverage.
pub const COVERAGE_MASK: u32 = 0xff;

/// Bit of [`Fragment::coverage`] set for fragments in the halo of a line.
pub const HALO_FLAG: u32 = 1 << 8;

/// Full resolution fragment.
///
/// This must be kept in sync with the struct in `shader/shared/fragment.wgsl`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct Fragment {
    /// Packed RGBA8 color.
    pub color: u32,
    /// Depth, stored as the bits of a non-negative `f32`.
    pub depth: u32,
    /// Coverage in the low 8 bits, [`HALO_FLAG`] above.
    pub coverage: u32,
    /// Scalar value used for color mapping and the histogram.
    pub scalar: f32,
    /// Opacity contribution of this fragment.
    pub transparency: f32,
    /// Product of `1 - transparency` of all nearer fragments.
    pub transmittance: f32,
    /// Index of the next fragment of the pixel.
    pub next: u32,
    pub _padding: u32,
}

/// Low resolution fragment used to estimate opacity targets.
///
/// This must be kept in sync with the struct in `shader/shared/fragment.wgsl`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct FragmentLowRes {
    pub depth: u32,
    /// Global control point coordinate. The integer part is the control point
    /// index, the fractional part the position toward the next one.
    pub alpha_weight: f32,
    pub importance: f32,
    pub next: u32,
}

/// Line vertex as consumed by the list builders.
///
/// This must be kept in sync with the struct in `shader/shared/vertex.wgsl`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub line_id: u32,
    pub importance: f32,
    pub scalar: f32,
    pub alpha_weight: f32,
    pub _padding: u32,
}

impl Fragment {
    pub fn coverage(&self) -> f32 {
        (self.coverage & COVERAGE_MASK) as f32 / 255.0
    }

    pub fn is_halo(&self) -> bool {
        self.coverage & HALO_FLAG != 0
    }

    pub fn depth(&self) -> f32 {
        f32::from_bits(self.depth)
    }
}

impl FragmentLowRes {
    pub fn depth(&self) -> f32 {
        f32::from_bits(self.depth)
    }
}

/// Converts a depth to the representation stored in fragments.
///
/// Negative depths and NaN are clamped to zero so that the integer order of the
/// result equals the order of the depths.
pub fn depth_to_bits(depth: f32) -> u32 {
    if depth > 0.0 { depth.to_bits() } else { 0 }
}

/// Packs a color as little endian RGBA8, the layout used by all stages.
pub fn pack_color(color: peniko::Color) -> u32 {
    let c = color.to_rgba8();
    u32::from_le_bytes([c.r, c.g, c.b, c.a])
}
