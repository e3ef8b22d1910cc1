// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{Fragment, FragmentLowRes, HISTOGRAM_SEGMENTS_MAX, Segments, Vertex};
use bytemuck::{Pod, Zeroable};

/// Invocations per workgroup of the one dimensional stages.
pub const WORKGROUP_SIZE: u32 = 256;

/// Side of the square workgroups of the per-pixel stages.
const TILE_SIZE: u32 = 16;

/// Expected number of fragments per pixel a pool is sized for.
pub const EXPECTED_OVERDRAW: u32 = 16;

/// Upper bound on the size of a fragment pool.
///
/// This is the default `max_storage_buffer_binding_size` of wgpu.
pub const MAX_POOL_BYTES: u32 = 128 << 20;

/// Append counters of a fragment pool.
///
/// This must be kept in sync with the struct in `shader/shared/fragment.wgsl`
#[derive(Clone, Copy, Debug, Default, Zeroable, Pod)]
#[repr(C)]
pub struct FragmentCounters {
    /// Number of fragments stored in the pool, never larger than its capacity.
    pub count: u32,
    /// Number of fragments discarded because the pool was full.
    pub dropped: u32,
    pub _padding: [u32; 2],
}

/// Storage of indirect dispatch size values.
#[derive(Clone, Copy, Debug, Default, Zeroable, Pod)]
#[repr(C)]
pub struct IndirectCount {
    pub count_x: u32,
    pub count_y: u32,
    pub count_z: u32,
    pub pad0: u32,
}

/// Uniform render configuration data used by all stages.
///
/// This data structure must be kept in sync with the definition in
/// `shader/shared/config.wgsl`.
#[derive(Clone, Copy, Debug, Default, Zeroable, Pod)]
#[repr(C)]
pub struct ConfigUniform {
    /// Column major view-projection matrix.
    pub view_proj: [f32; 16],
    /// Width of the target in pixels.
    pub width: u32,
    /// Height of the target in pixels.
    pub height: u32,
    /// Width of the low resolution pass in pixels.
    pub low_width: u32,
    /// Height of the low resolution pass in pixels.
    pub low_height: u32,
    pub n_vertices: u32,
    pub n_control_points: u32,
    /// Capacity of the low resolution pool (in [`FragmentLowRes`]s).
    pub low_capacity: u32,
    /// Capacity of the full resolution pool (in [`Fragment`]s).
    pub capacity: u32,
    /// Penalty for occluding important fragments behind.
    pub q: f32,
    /// Penalty for fragments in front of important ones.
    pub r: f32,
    /// Importance blend exponent.
    pub lambda: f32,
    /// Step toward the target alpha per frame.
    pub fade_rate: f32,
    /// Half of the line width in full resolution pixels.
    pub half_width: f32,
    /// Half of the line width in low resolution pixels.
    pub low_half_width: f32,
    /// Portion of the half width drawn with the line color, the rest is halo.
    pub halo_portion: f32,
    /// A [`HistogramMode`](crate::HistogramMode) discriminant.
    pub histogram_mode: u32,
    /// Packed line color.
    pub line_color: u32,
    /// Packed halo color.
    pub halo_color: u32,
    /// Packed background color.
    pub background: u32,
    pub n_bins: u32,
    /// Number of entries of the colormap.
    pub colormap_len: u32,
    /// Weight of the previous damped CDF, `2^(-dt / halflife)`.
    pub damping: f32,
    pub _padding: [u32; 2],
}

/// Parameters of one smoothing half-round.
#[derive(Clone, Copy, Debug, Default, Zeroable, Pod)]
#[repr(C)]
pub struct SmoothUniform {
    pub weight: f32,
    pub _padding: [u32; 3],
}

/// Parameters of the `fill` stage.
#[derive(Clone, Copy, Debug, Default, Zeroable, Pod)]
#[repr(C)]
pub struct FillUniform {
    /// Number of `u32` words to fill.
    pub len: u32,
    pub value: u32,
    pub _padding: [u32; 2],
}

/// Parameters of the CDF stage.
///
/// `breakpoints` is declared as `array<vec4<f32>, 2>` in
/// `shader/cdf.wgsl`.
#[derive(Clone, Copy, Debug, Default, Zeroable, Pod)]
#[repr(C)]
pub struct CdfUniform {
    pub n_bins: u32,
    /// Added to every bin before the CDF is computed.
    pub bias: f32,
    pub n_breakpoints: u32,
    pub _padding: u32,
    pub breakpoints: [f32; HISTOGRAM_SEGMENTS_MAX],
}

impl SmoothUniform {
    pub fn new(weight: f32) -> Self {
        Self {
            weight,
            ..Default::default()
        }
    }
}

impl FillUniform {
    pub fn new(len: u32, value: u32) -> Self {
        Self {
            len,
            value,
            ..Default::default()
        }
    }
}

impl CdfUniform {
    pub fn new(n_bins: u32, bias: f32, segments: &Segments) -> Self {
        Self {
            n_bins,
            bias,
            n_breakpoints: segments.as_slice().len() as u32,
            _padding: 0,
            breakpoints: segments.padded(),
        }
    }

    /// Converts the bin counts into the histogram without touching the CDF.
    pub fn histogram_only(n_bins: u32, bias: f32) -> Self {
        Self {
            n_bins,
            bias,
            n_breakpoints: 0,
            _padding: 0,
            breakpoints: [-1.0; HISTOGRAM_SEGMENTS_MAX],
        }
    }
}

/// CPU side setup and configuration.
#[derive(Default)]
pub struct RenderConfig {
    /// GPU side configuration.
    pub gpu: ConfigUniform,
    /// Workgroup counts for all compute pipelines.
    pub workgroup_counts: WorkgroupCounts,
    /// Sizes of all buffer resources.
    pub buffer_sizes: BufferSizes,
}

impl RenderConfig {
    /// Sizes a frame of `width` by `height` pixels.
    ///
    /// Only the size related fields of [`RenderConfig::gpu`] are filled in, the
    /// caller sets the camera, colors and solver parameters.
    pub fn new(
        n_vertices: u32,
        n_control_points: u32,
        width: u32,
        height: u32,
        downscale: u32,
        n_bins: u32,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let downscale = downscale.max(1);
        let low_width = (width / downscale).max(1);
        let low_height = (height / downscale).max(1);
        let low_capacity = pool_capacity::<FragmentLowRes>(low_width * low_height);
        let capacity = pool_capacity::<Fragment>(width * height);
        let workgroup_counts = WorkgroupCounts::new(
            n_vertices,
            n_control_points,
            (width, height),
            (low_width, low_height),
            n_bins,
        );
        let buffer_sizes = BufferSizes {
            heads_low: BufferSize::new(low_width * low_height),
            heads: BufferSize::new(width * height),
            pool_low: BufferSize::new(low_capacity),
            pool: BufferSize::new(capacity),
            counters: BufferSize::new(1),
            indirect_count: BufferSize::new(1),
            vertices: BufferSize::new(n_vertices),
            current_alpha: BufferSize::new(n_vertices),
            alpha: BufferSize::new(n_control_points),
            control_point_lines: BufferSize::new(n_control_points),
            bins: BufferSize::new(n_bins),
            histogram: BufferSize::new(n_bins),
            cdf: BufferSize::new(n_bins),
            pixels: BufferSize::new(width * height),
        };
        Self {
            gpu: ConfigUniform {
                width,
                height,
                low_width,
                low_height,
                n_vertices,
                n_control_points,
                low_capacity,
                capacity,
                n_bins,
                ..Default::default()
            },
            workgroup_counts,
            buffer_sizes,
        }
    }
}

fn pool_capacity<T>(pixels: u32) -> u32 {
    let max = MAX_POOL_BYTES / size_of::<T>() as u32;
    pixels.saturating_mul(EXPECTED_OVERDRAW).min(max)
}

/// Type alias for a workgroup size.
pub type WorkgroupSize = (u32, u32, u32);

/// Computed sizes for all dispatches.
#[derive(Copy, Clone, Debug, Default)]
pub struct WorkgroupCounts {
    pub fill_heads_low: WorkgroupSize,
    pub fill_heads: WorkgroupSize,
    pub fill_alpha: WorkgroupSize,
    /// One invocation per vertex, each owns the segment starting there.
    pub build_lists: WorkgroupSize,
    pub sort_lists_low: WorkgroupSize,
    pub min_gather: WorkgroupSize,
    pub smooth_alpha: WorkgroupSize,
    pub fade_alpha: WorkgroupSize,
    pub sort_lists: WorkgroupSize,
    pub histogram_setup: WorkgroupSize,
    // Note: `histogram` and `normalize_scalars` must use an indirect dispatch
    pub cdf: WorkgroupSize,
    pub exponential_damping: WorkgroupSize,
    pub composite: WorkgroupSize,
    pub write_target: WorkgroupSize,
}

impl WorkgroupCounts {
    pub fn new(
        n_vertices: u32,
        n_control_points: u32,
        (width, height): (u32, u32),
        (low_width, low_height): (u32, u32),
        n_bins: u32,
    ) -> Self {
        let linear = |n: u32| (n.div_ceil(WORKGROUP_SIZE), 1, 1);
        let tiled = |w: u32, h: u32| (w.div_ceil(TILE_SIZE), h.div_ceil(TILE_SIZE), 1);
        Self {
            fill_heads_low: linear(low_width * low_height),
            fill_heads: linear(width * height),
            fill_alpha: linear(n_control_points),
            build_lists: linear(n_vertices),
            sort_lists_low: tiled(low_width, low_height),
            min_gather: tiled(low_width, low_height),
            smooth_alpha: linear(n_control_points),
            fade_alpha: linear(n_vertices),
            sort_lists: tiled(width, height),
            histogram_setup: (1, 1, 1),
            cdf: (1, 1, 1),
            exponential_damping: linear(n_bins),
            composite: tiled(width, height),
            write_target: tiled(width, height),
        }
    }
}

/// Typed buffer size primitive.
#[derive(Copy, Clone, Eq, Default, Debug)]
pub struct BufferSize<T: Sized> {
    len: u32,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: Sized> BufferSize<T> {
    /// Creates a new buffer size from number of elements.
    pub const fn new(len: u32) -> Self {
        Self {
            // Each buffer binding must be large enough to hold at least one element to avoid
            // triggering validation errors.
            len: if len > 0 { len } else { 1 },
            _phantom: std::marker::PhantomData,
        }
    }

    /// Returns the number of elements.
    #[expect(clippy::len_without_is_empty, reason = "The buffer can never be empty")]
    pub const fn len(self) -> u32 {
        self.len
    }

    /// Returns the size in bytes.
    pub const fn size_in_bytes(self) -> u32 {
        size_of::<T>() as u32 * self.len
    }
}

impl<T: Sized> PartialEq for BufferSize<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
    }
}

/// Computed sizes for all buffers.
#[derive(Copy, Clone, Debug, Default)]
pub struct BufferSizes {
    // Per-pixel lists
    pub heads_low: BufferSize<u32>,
    pub heads: BufferSize<u32>,
    pub pool_low: BufferSize<FragmentLowRes>,
    pub pool: BufferSize<Fragment>,
    pub counters: BufferSize<FragmentCounters>,
    pub indirect_count: BufferSize<IndirectCount>,
    // Line state
    pub vertices: BufferSize<Vertex>,
    pub current_alpha: BufferSize<f32>,
    pub alpha: BufferSize<u32>,
    pub control_point_lines: BufferSize<u32>,
    // Histogram, one entry per bin
    pub bins: BufferSize<u32>,
    pub histogram: BufferSize<f32>,
    pub cdf: BufferSize<f32>,
    pub pixels: BufferSize<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layouts_match_shaders() {
        assert_eq!(size_of::<ConfigUniform>(), 160);
        assert_eq!(size_of::<CdfUniform>(), 48);
        assert_eq!(size_of::<SmoothUniform>(), 16);
        assert_eq!(size_of::<FillUniform>(), 16);
        assert_eq!(size_of::<FragmentCounters>(), 16);
    }

    #[test]
    fn low_res_pass_is_downscaled() {
        let config = RenderConfig::new(100, 20, 640, 480, 4, 256);
        assert_eq!((config.gpu.low_width, config.gpu.low_height), (160, 120));
        assert_eq!(config.gpu.low_capacity, 160 * 120 * EXPECTED_OVERDRAW);
        assert_eq!(config.buffer_sizes.heads_low.len(), 160 * 120);
        assert_eq!(config.workgroup_counts.min_gather, (10, 8, 1));
        assert_eq!(config.workgroup_counts.composite, (40, 30, 1));
    }

    #[test]
    fn pools_are_capped() {
        let config = RenderConfig::new(2, 2, 3840, 2160, 1, 256);
        assert_eq!(config.gpu.capacity, MAX_POOL_BYTES / 32);
        assert!(config.buffer_sizes.pool.size_in_bytes() <= MAX_POOL_BYTES);
        assert!(config.buffer_sizes.pool_low.size_in_bytes() <= MAX_POOL_BYTES);
    }

    #[test]
    fn empty_buffers_hold_one_element() {
        let config = RenderConfig::new(0, 0, 0, 0, 0, 2);
        assert_eq!(config.buffer_sizes.vertices.len(), 1);
        assert_eq!(config.buffer_sizes.alpha.len(), 1);
        assert_eq!(config.gpu.width, 1);
        assert_eq!(config.workgroup_counts.build_lists, (0, 1, 1));
    }
}
