// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Run whole frames in host memory, without a GPU.
//!
//! [`CpuFrame`] executes the same stages as the GPU pipeline by calling the typed
//! `*_main` stage functions of `lineopt_shaders` directly, and keeps every
//! intermediate buffer inspectable.

use lineopt_encoding::{
    BufferSize, ConfigUniform, Fragment, FragmentCounters, FragmentLowRes, INVALID_INDEX,
    LineSet, SmoothUniform, Vertex,
};
use lineopt_shaders::cpu::{
    build_lists_low_main, build_lists_main, cdf_main, composite_main, exponential_damping_main,
    fade_alpha_main, histogram_main, min_gather_main, normalize_scalars_main, smooth_alpha_main,
    sort_lists_low_main, sort_lists_main, util::decode_alpha,
};
use peniko::Color;

use crate::params::{
    HistogramParams, HistogramSettings, OpacityParams, RenderParams, Settings, StyleParams,
    pack_colormap,
};
use crate::render::{FrameSetup, Stage, identity_cdf, smoothing_schedule};
use crate::{Diagnostics, Error};

#[derive(Default)]
pub struct Buffer<T: bytemuck::Zeroable + bytemuck::NoUninit> {
    inner: Vec<T>,
}

impl<T: bytemuck::Zeroable + bytemuck::NoUninit> Buffer<T> {
    fn to_fit(&mut self, size: BufferSize<T>) -> &mut [T] {
        self.inner
            .resize_with(size.len().try_into().expect("32 bit platform"), || {
                T::zeroed()
            });
        &mut self.inner
    }

    fn fill_to_fit(&mut self, size: BufferSize<T>, value: T) -> &mut [T] {
        let buf = self.to_fit(size);
        buf.fill(value);
        buf
    }

    pub fn as_slice(&self) -> &[T] {
        &self.inner
    }
}

/// Histogram state of a [`CpuFrame`].
#[derive(Default)]
struct HistogramState {
    histogram: Vec<f32>,
    cdf: Vec<f32>,
    cdf_prev: Vec<f32>,
    cdf_damped: Vec<f32>,
    normalized_histogram: Vec<f32>,
    normalized_cdf: Vec<f32>,
}

impl HistogramState {
    fn new(n_bins: u32) -> Self {
        let ramp = identity_cdf(n_bins);
        Self {
            histogram: vec![0.0; ramp.len()],
            normalized_histogram: vec![0.0; ramp.len()],
            cdf: ramp.clone(),
            cdf_prev: ramp.clone(),
            cdf_damped: ramp.clone(),
            normalized_cdf: ramp,
        }
    }
}

/// A renderer that runs every stage on the CPU.
///
/// Holds the same state across frames as [`Renderer`](crate::Renderer): the
/// ping-pong control point alpha, the displayed per-vertex alpha and the CDFs.
pub struct CpuFrame {
    settings: Settings,
    colormap: Vec<u32>,
    vertices: Vec<Vertex>,
    control_point_lines: Vec<u32>,
    current_alpha: Vec<f32>,
    alpha: [Buffer<u32>; 2],
    ping: usize,
    config: ConfigUniform,
    heads_low: Buffer<u32>,
    pool_low: Buffer<FragmentLowRes>,
    heads: Buffer<u32>,
    pool: Buffer<Fragment>,
    counters_low: FragmentCounters,
    counters: FragmentCounters,
    bins: Buffer<u32>,
    histogram: HistogramState,
    pixels: Buffer<u32>,
}

impl Default for CpuFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuFrame {
    pub fn new() -> Self {
        let settings = Settings::default();
        Self {
            histogram: HistogramState::new(settings.histogram.bins),
            settings,
            colormap: pack_colormap(&[]),
            vertices: Vec::new(),
            control_point_lines: Vec::new(),
            current_alpha: Vec::new(),
            alpha: Default::default(),
            ping: 0,
            config: ConfigUniform::default(),
            heads_low: Buffer::default(),
            pool_low: Buffer::default(),
            heads: Buffer::default(),
            pool: Buffer::default(),
            counters_low: FragmentCounters::default(),
            counters: FragmentCounters::default(),
            bins: Buffer::default(),
            pixels: Buffer::default(),
        }
    }

    /// Replaces the line set and resets the solved and displayed alpha.
    pub fn set_lines(&mut self, lines: &LineSet) {
        self.vertices = lines.vertices().to_vec();
        self.control_point_lines = lines.control_point_lines().to_vec();
        self.current_alpha = vec![1.0; self.vertices.len()];
        let n = self.control_point_lines.len().max(1);
        for alpha in &mut self.alpha {
            alpha.inner = vec![INVALID_INDEX; n];
        }
        self.ping = 0;
    }

    /// Sets the colors looked up by scalar value, an empty slice restores the default.
    pub fn set_colormap(&mut self, colors: &[Color]) {
        self.colormap = pack_colormap(colors);
    }

    pub fn set_opacity_params(&mut self, params: &OpacityParams) {
        self.settings.opacity = *params;
    }

    pub fn set_style_params(&mut self, params: &StyleParams) {
        self.settings.style = *params;
    }

    pub fn set_histogram_params(&mut self, params: &HistogramParams) -> Result<(), Error> {
        let histogram = HistogramSettings::new(params)?;
        if histogram.bins != self.settings.histogram.bins {
            self.histogram = HistogramState::new(histogram.bins);
        }
        self.settings.histogram = histogram;
        Ok(())
    }

    /// Renders a frame and returns its packed RGBA8 pixels.
    pub fn render(&mut self, params: &RenderParams) -> &[u32] {
        self.render_observed(params, |_, _| {})
    }

    /// Renders a frame, calling `observer` after every stage that ran.
    pub fn render_observed(
        &mut self,
        params: &RenderParams,
        mut observer: impl FnMut(Stage, &Self),
    ) -> &[u32] {
        let config = self.settings.render_config(
            self.vertices.len() as u32,
            self.control_point_lines.len() as u32,
            self.colormap.len() as u32,
            params,
        );
        self.config = config.gpu;
        let settings = self.settings.clone();
        let setup = FrameSetup::new(&settings, &config);
        self.histogram
            .cdf_prev
            .copy_from_slice(&self.histogram.cdf);
        for stage in Stage::ALL {
            if stage.is_active(setup.mode) {
                self.run_stage(stage, &setup);
                observer(stage, self);
            }
        }
        if setup.normalized_diagnostics && setup.mode.uses_cdf() {
            self.normalize(&setup);
        }
        self.pixels.as_slice()
    }

    fn run_stage(&mut self, stage: Stage, setup: &FrameSetup<'_>) {
        let config = &setup.config.gpu;
        let sizes = &setup.config.buffer_sizes;
        match stage {
            Stage::BuildLowRes => {
                let heads = self.heads_low.fill_to_fit(sizes.heads_low, INVALID_INDEX);
                let pool = self.pool_low.to_fit(sizes.pool_low);
                self.counters_low = FragmentCounters::default();
                build_lists_low_main(config, &self.vertices, &mut self.counters_low, heads, pool);
            }
            Stage::SortLowRes => {
                let heads = self.heads_low.to_fit(sizes.heads_low);
                let pool = self.pool_low.to_fit(sizes.pool_low);
                sort_lists_low_main(config, heads, pool);
            }
            Stage::MinGather => {
                let alpha = self.alpha[self.ping].fill_to_fit(sizes.alpha, INVALID_INDEX);
                min_gather_main(
                    config,
                    self.heads_low.as_slice(),
                    self.pool_low.as_slice(),
                    &self.control_point_lines,
                    alpha,
                );
            }
            Stage::Smooth => {
                let (passes, ping) =
                    smoothing_schedule(setup.smoothing_iterations, setup.laplace_weight, self.ping);
                self.alpha[1 - self.ping].to_fit(sizes.alpha);
                for pass in passes {
                    let [a0, a1] = &mut self.alpha;
                    let (src, dst) = if pass.src == 0 { (a0, a1) } else { (a1, a0) };
                    smooth_alpha_main(
                        config,
                        &SmoothUniform::new(pass.weight),
                        &self.control_point_lines,
                        src.as_slice(),
                        dst.to_fit(sizes.alpha),
                    );
                }
                self.ping = ping;
            }
            Stage::FadeToVertex => {
                fade_alpha_main(
                    config,
                    &self.vertices,
                    self.alpha[self.ping].as_slice(),
                    &mut self.current_alpha,
                );
            }
            Stage::BuildHighRes => {
                let heads = self.heads.fill_to_fit(sizes.heads, INVALID_INDEX);
                let pool = self.pool.to_fit(sizes.pool);
                self.counters = FragmentCounters::default();
                build_lists_main(
                    config,
                    &self.vertices,
                    &mut self.counters,
                    heads,
                    pool,
                    &self.current_alpha,
                );
            }
            Stage::SortHighRes => {
                let heads = self.heads.to_fit(sizes.heads);
                let pool = self.pool.to_fit(sizes.pool);
                sort_lists_main(config, heads, pool);
            }
            Stage::Histogram => {
                let bins = self.bins.fill_to_fit(sizes.bins, 0);
                histogram_main(config, &self.counters, self.pool.as_slice(), bins);
            }
            Stage::Cdf => {
                let state = &mut self.histogram;
                cdf_main(
                    &setup.cdf_uniform(),
                    self.bins.as_slice(),
                    &mut state.histogram,
                    &mut state.cdf,
                );
            }
            Stage::Damping => {
                let state = &mut self.histogram;
                exponential_damping_main(config, &state.cdf, &mut state.cdf_damped);
            }
            Stage::Composite => {
                let pixels = self.pixels.to_fit(sizes.pixels);
                composite_main(
                    config,
                    self.heads.as_slice(),
                    self.pool.as_slice(),
                    &self.histogram.cdf_damped,
                    &self.colormap,
                    pixels,
                );
            }
        }
    }

    // Equalizes the fragment scalars and builds the histogram and CDF of the result.
    fn normalize(&mut self, setup: &FrameSetup<'_>) {
        let config = &setup.config.gpu;
        let sizes = &setup.config.buffer_sizes;
        let pool = self.pool.to_fit(sizes.pool);
        normalize_scalars_main(config, &self.counters, pool, &self.histogram.cdf);
        let bins = self.bins.fill_to_fit(sizes.bins, 0);
        histogram_main(config, &self.counters, self.pool.as_slice(), bins);
        let state = &mut self.histogram;
        cdf_main(
            &setup.normalized_cdf_uniform(),
            self.bins.as_slice(),
            &mut state.normalized_histogram,
            &mut state.normalized_cdf,
        );
    }

    /// The configuration of the last frame.
    pub fn config(&self) -> &ConfigUniform {
        &self.config
    }

    /// Index of the alpha buffer holding the solved control point alpha.
    pub fn ping(&self) -> usize {
        self.ping
    }

    pub fn pixels(&self) -> &[u32] {
        self.pixels.as_slice()
    }

    pub fn heads_low(&self) -> &[u32] {
        self.heads_low.as_slice()
    }

    pub fn pool_low(&self) -> &[FragmentLowRes] {
        self.pool_low.as_slice()
    }

    pub fn heads(&self) -> &[u32] {
        self.heads.as_slice()
    }

    pub fn pool(&self) -> &[Fragment] {
        self.pool.as_slice()
    }

    pub fn counters_low(&self) -> FragmentCounters {
        self.counters_low
    }

    pub fn counters(&self) -> FragmentCounters {
        self.counters
    }

    /// Raw cells of one of the two alpha buffers, as `f32` bits.
    pub fn alpha_bits(&self, index: usize) -> &[u32] {
        self.alpha[index & 1].as_slice()
    }

    /// The solved control point alpha, untouched cells read as 1.
    pub fn alpha(&self) -> Vec<f32> {
        decode(self.alpha[self.ping].as_slice(), self.control_point_lines.len())
    }

    pub fn current_alpha(&self) -> &[f32] {
        &self.current_alpha
    }

    pub fn bins(&self) -> &[u32] {
        self.bins.as_slice()
    }

    pub fn histogram(&self) -> &[f32] {
        &self.histogram.histogram
    }

    pub fn cdf(&self) -> &[f32] {
        &self.histogram.cdf
    }

    pub fn cdf_prev(&self) -> &[f32] {
        &self.histogram.cdf_prev
    }

    pub fn cdf_damped(&self) -> &[f32] {
        &self.histogram.cdf_damped
    }

    /// The same readback as [`Renderer::read_diagnostics`](crate::Renderer::read_diagnostics).
    pub fn diagnostics(&self) -> Diagnostics {
        let normalized = self.settings.histogram.normalized_diagnostics;
        let diagnostics = Diagnostics {
            histogram: self.histogram.histogram.clone(),
            cdf: self.histogram.cdf.clone(),
            cdf_prev: self.histogram.cdf_prev.clone(),
            cdf_damped: self.histogram.cdf_damped.clone(),
            normalized_histogram: normalized.then(|| self.histogram.normalized_histogram.clone()),
            normalized_cdf: normalized.then(|| self.histogram.normalized_cdf.clone()),
            alpha: self.alpha(),
            current_alpha: self.current_alpha.clone(),
            counters_low: self.counters_low,
            counters: self.counters,
        };
        diagnostics.warn_on_overflow();
        diagnostics
    }
}

pub(crate) fn decode(bits: &[u32], len: usize) -> Vec<f32> {
    bits.iter().take(len).copied().map(decode_alpha).collect()
}
