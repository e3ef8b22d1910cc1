// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Record the commands of a frame.

use lineopt_encoding::{
    BufferSize, CdfUniform, FillUniform, HistogramMode, INVALID_INDEX, IndirectCount,
    RenderConfig, Segments, SmoothUniform,
};

use crate::params::Settings;
use crate::recording::{BufferProxy, ImageProxy, Recording, ResourceProxy};
use crate::shaders::FullShaders;

/// Weight of the anti-diffusion half-round relative to the smoothing weight.
pub const ANTI_DIFFUSION_FACTOR: f32 = 1.01;

/// Bias added to every histogram bin before the displayed CDF is computed.
pub const HISTOGRAM_BIAS: f32 = 0.001;

/// The stages of a frame, in execution order.
///
/// The order never changes: every stage reads only what earlier stages of the
/// same frame wrote, plus the damped CDF of the previous frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    BuildLowRes,
    SortLowRes,
    MinGather,
    Smooth,
    FadeToVertex,
    BuildHighRes,
    SortHighRes,
    Histogram,
    Cdf,
    Damping,
    Composite,
}

impl Stage {
    pub const ALL: [Self; 11] = [
        Self::BuildLowRes,
        Self::SortLowRes,
        Self::MinGather,
        Self::Smooth,
        Self::FadeToVertex,
        Self::BuildHighRes,
        Self::SortHighRes,
        Self::Histogram,
        Self::Cdf,
        Self::Damping,
        Self::Composite,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::BuildLowRes => "build_low_res",
            Self::SortLowRes => "sort_low_res",
            Self::MinGather => "min_gather",
            Self::Smooth => "smooth",
            Self::FadeToVertex => "fade_to_vertex",
            Self::BuildHighRes => "build_high_res",
            Self::SortHighRes => "sort_high_res",
            Self::Histogram => "histogram",
            Self::Cdf => "cdf",
            Self::Damping => "damping",
            Self::Composite => "composite",
        }
    }

    /// Whether the stage does any work for `mode`.
    ///
    /// The histogram is built whenever scalars are colored, damping only runs
    /// when a CDF is used for coloring.
    pub fn is_active(self, mode: HistogramMode) -> bool {
        match self {
            Self::Histogram | Self::Cdf => mode.uses_colormap(),
            Self::Damping => mode.uses_cdf(),
            _ => true,
        }
    }
}

/// One dispatch of the smoothing stage.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SmoothPass {
    pub weight: f32,
    /// Index of the alpha buffer read.
    pub src: usize,
    /// Index of the alpha buffer written.
    pub dst: usize,
}

/// Plans the smoothing dispatches, starting with the solved alpha in buffer `ping`.
///
/// Every round is a smoothing half-round that flips the buffers, and an
/// anti-diffusion half-round with a negated, slightly larger weight that writes the
/// other buffer without flipping. The anti-diffusion result is never read, the next
/// round overwrites it. Returns the passes and the buffer holding the result.
pub fn smoothing_schedule(iterations: u32, weight: f32, ping: usize) -> (Vec<SmoothPass>, usize) {
    let mut ping = ping & 1;
    let mut passes = Vec::with_capacity(2 * iterations as usize);
    for _ in 0..iterations {
        passes.push(SmoothPass {
            weight,
            src: ping,
            dst: 1 - ping,
        });
        ping = 1 - ping;
        passes.push(SmoothPass {
            weight: -ANTI_DIFFUSION_FACTOR * weight,
            src: ping,
            dst: 1 - ping,
        });
    }
    (passes, ping)
}

/// Buffers that outlive a frame.
#[derive(Copy, Clone, Debug)]
pub struct LineBuffers {
    pub vertices: BufferProxy,
    /// Displayed alpha of every vertex.
    pub current_alpha: BufferProxy,
    /// Ping-pong control point alpha, as `f32` bits.
    pub alpha: [BufferProxy; 2],
    pub control_point_lines: BufferProxy,
    pub n_vertices: u32,
    pub n_control_points: u32,
}

/// Histogram state that outlives a frame, sized for one bin count.
#[derive(Copy, Clone, Debug)]
pub struct HistogramBuffers {
    pub n_bins: u32,
    pub histogram: BufferProxy,
    pub cdf: BufferProxy,
    /// The CDF of the previous frame.
    pub cdf_prev: BufferProxy,
    /// The CDF used for coloring.
    pub cdf_damped: BufferProxy,
    pub normalized_histogram: BufferProxy,
    pub normalized_cdf: BufferProxy,
    pub counters_low: BufferProxy,
    pub counters: BufferProxy,
}

impl LineBuffers {
    /// Uploads a line set.
    ///
    /// The displayed alpha starts fully opaque and fades toward the solution.
    pub fn upload(
        recording: &mut Recording,
        vertices: &[lineopt_encoding::Vertex],
        control_point_lines: &[u32],
    ) -> Self {
        let n_vertices = vertices.len() as u32;
        let n_control_points = control_point_lines.len() as u32;
        let vertex_data: Vec<u8> = if vertices.is_empty() {
            vec![0; size_of::<lineopt_encoding::Vertex>()]
        } else {
            bytemuck::cast_slice::<_, u8>(vertices).to_vec()
        };
        let current_alpha = vec![1.0_f32; vertices.len().max(1)];
        let lines = if control_point_lines.is_empty() {
            vec![0]
        } else {
            control_point_lines.to_vec()
        };
        let alpha = vec![INVALID_INDEX; BufferSize::<u32>::new(n_control_points).len() as usize];
        let alpha: &[u8] = bytemuck::cast_slice(&alpha);
        let current_alpha: &[u8] = bytemuck::cast_slice(&current_alpha);
        let lines: &[u8] = bytemuck::cast_slice(&lines);
        Self {
            vertices: recording.upload("vertices", vertex_data),
            current_alpha: recording.upload("current_alpha", current_alpha),
            alpha: [
                recording.upload("alpha_0", alpha),
                recording.upload("alpha_1", alpha),
            ],
            control_point_lines: recording.upload("control_point_lines", lines),
            n_vertices,
            n_control_points,
        }
    }

    pub fn free(&self, recording: &mut Recording) {
        recording.free_buffer(self.vertices);
        recording.free_buffer(self.current_alpha);
        recording.free_buffer(self.alpha[0]);
        recording.free_buffer(self.alpha[1]);
        recording.free_buffer(self.control_point_lines);
    }
}

impl HistogramBuffers {
    /// Allocates the histogram state with every CDF set to the identity ramp.
    pub fn upload(recording: &mut Recording, n_bins: u32) -> Self {
        let ramp = identity_cdf(n_bins);
        let ramp: &[u8] = bytemuck::cast_slice(&ramp);
        let zeros = vec![0_u8; ramp.len()];
        let counters = lineopt_encoding::FragmentCounters::default();
        Self {
            n_bins,
            histogram: recording.upload("histogram", zeros.as_slice()),
            cdf: recording.upload("cdf", ramp),
            cdf_prev: recording.upload("cdf_prev", ramp),
            cdf_damped: recording.upload("cdf_damped", ramp),
            normalized_histogram: recording.upload("normalized_histogram", zeros),
            normalized_cdf: recording.upload("normalized_cdf", ramp),
            counters_low: recording.upload("counters_low", bytemuck::bytes_of(&counters)),
            counters: recording.upload("counters", bytemuck::bytes_of(&counters)),
        }
    }

    pub fn free(&self, recording: &mut Recording) {
        for buf in [
            self.histogram,
            self.cdf,
            self.cdf_prev,
            self.cdf_damped,
            self.normalized_histogram,
            self.normalized_cdf,
            self.counters_low,
            self.counters,
        ] {
            recording.free_buffer(buf);
        }
    }
}

/// The CDF of a uniform distribution over `n_bins` bins.
pub fn identity_cdf(n_bins: u32) -> Vec<f32> {
    let n = n_bins.max(1);
    (0..n).map(|i| (i + 1) as f32 / n as f32).collect()
}

/// Everything a frame needs besides the persistent buffers.
pub struct FrameSetup<'a> {
    pub config: &'a RenderConfig,
    pub smoothing_iterations: u32,
    pub laplace_weight: f32,
    pub mode: HistogramMode,
    pub segments: &'a Segments,
    pub normalized_diagnostics: bool,
}

impl<'a> FrameSetup<'a> {
    pub(crate) fn new(settings: &'a Settings, config: &'a RenderConfig) -> Self {
        Self {
            config,
            smoothing_iterations: settings.opacity.smoothing_iterations,
            laplace_weight: settings.opacity.laplace_weight,
            mode: settings.histogram.mode,
            segments: &settings.histogram.segments,
            normalized_diagnostics: settings.histogram.normalized_diagnostics,
        }
    }

    /// The parameters of the displayed CDF.
    ///
    /// Without equalization only the histogram is computed, the CDF is left as is.
    pub fn cdf_uniform(&self) -> CdfUniform {
        let n_bins = self.config.gpu.n_bins;
        if self.mode.uses_cdf() {
            CdfUniform::new(n_bins, HISTOGRAM_BIAS, &self.mode.breakpoints(self.segments))
        } else {
            CdfUniform::histogram_only(n_bins, HISTOGRAM_BIAS)
        }
    }

    /// The parameters of the CDF of the equalized values.
    pub fn normalized_cdf_uniform(&self) -> CdfUniform {
        CdfUniform::new(self.config.gpu.n_bins, 0.0, &Segments::full())
    }
}

/// Resources that only live for one frame.
struct FrameResources {
    config_buf: BufferProxy,
    heads_low: BufferProxy,
    pool_low: BufferProxy,
    heads: BufferProxy,
    pool: BufferProxy,
    bins: BufferProxy,
    indirect: BufferProxy,
    pixels: BufferProxy,
    uniforms: Vec<BufferProxy>,
}

/// State for a render in progress.
pub struct Render {
    /// Index of the alpha buffer holding the current solution.
    ping: usize,
}

impl Render {
    pub fn new(ping: usize) -> Self {
        Self { ping: ping & 1 }
    }

    /// Index of the alpha buffer holding the solution once the recorded frame ran.
    pub fn ping(&self) -> usize {
        self.ping
    }

    /// Records a whole frame, ending with the copy of the image into `target`.
    pub fn record_frame(
        &mut self,
        shaders: &FullShaders,
        setup: &FrameSetup<'_>,
        lines: &LineBuffers,
        histogram: &HistogramBuffers,
        colormap: BufferProxy,
        target: ImageProxy,
    ) -> Recording {
        let mut recording = Recording::default();
        let sizes = &setup.config.buffer_sizes;
        let mut frame = FrameResources {
            config_buf: recording.upload_uniform("config", bytemuck::bytes_of(&setup.config.gpu)),
            heads_low: BufferProxy::new(sizes.heads_low.size_in_bytes().into(), "heads_low"),
            pool_low: BufferProxy::new(sizes.pool_low.size_in_bytes().into(), "pool_low"),
            heads: BufferProxy::new(sizes.heads.size_in_bytes().into(), "heads"),
            pool: BufferProxy::new(sizes.pool.size_in_bytes().into(), "pool"),
            bins: BufferProxy::new(sizes.bins.size_in_bytes().into(), "bins"),
            indirect: BufferProxy::new(sizes.indirect_count.size_in_bytes().into(), "indirect"),
            pixels: BufferProxy::new(sizes.pixels.size_in_bytes().into(), "pixels"),
            uniforms: Vec::new(),
        };
        // The CDF of this frame replaces the previous one.
        recording.copy_buffer(histogram.cdf, histogram.cdf_prev);
        for stage in Stage::ALL {
            if stage.is_active(setup.mode) {
                recording.push_scope(stage.name());
                self.record_stage(
                    stage,
                    shaders,
                    setup,
                    lines,
                    histogram,
                    colormap,
                    &mut frame,
                    &mut recording,
                );
                recording.pop_scope();
            }
        }
        if setup.normalized_diagnostics && setup.mode.uses_cdf() {
            recording.push_scope("normalized_histogram");
            record_normalized_histogram(shaders, setup, histogram, &mut frame, &mut recording);
            recording.pop_scope();
        }
        recording.push_scope("write_target");
        recording.dispatch(
            shaders.write_target,
            setup.config.workgroup_counts.write_target,
            [
                ResourceProxy::Buffer(frame.config_buf),
                ResourceProxy::Buffer(frame.pixels),
                ResourceProxy::Image(target),
            ],
        );
        recording.pop_scope();
        for buf in [
            frame.config_buf,
            frame.heads_low,
            frame.pool_low,
            frame.heads,
            frame.pool,
            frame.bins,
            frame.indirect,
            frame.pixels,
        ] {
            recording.free_buffer(buf);
        }
        for buf in frame.uniforms {
            recording.free_buffer(buf);
        }
        recording
    }

    #[expect(clippy::too_many_arguments, reason = "Internal helper")]
    fn record_stage(
        &mut self,
        stage: Stage,
        shaders: &FullShaders,
        setup: &FrameSetup<'_>,
        lines: &LineBuffers,
        histogram: &HistogramBuffers,
        colormap: BufferProxy,
        frame: &mut FrameResources,
        recording: &mut Recording,
    ) {
        let wg_counts = &setup.config.workgroup_counts;
        let sizes = &setup.config.buffer_sizes;
        let config_buf = ResourceProxy::Buffer(frame.config_buf);
        match stage {
            Stage::BuildLowRes => {
                fill(
                    recording,
                    shaders,
                    &mut frame.uniforms,
                    frame.heads_low,
                    sizes.heads_low.len(),
                    wg_counts.fill_heads_low,
                );
                recording.clear_all(histogram.counters_low);
                recording.dispatch(
                    shaders.build_lists_low,
                    wg_counts.build_lists,
                    [
                        config_buf,
                        ResourceProxy::Buffer(lines.vertices),
                        ResourceProxy::Buffer(histogram.counters_low),
                        ResourceProxy::Buffer(frame.heads_low),
                        ResourceProxy::Buffer(frame.pool_low),
                    ],
                );
            }
            Stage::SortLowRes => {
                recording.dispatch(
                    shaders.sort_lists_low,
                    wg_counts.sort_lists_low,
                    [
                        config_buf,
                        ResourceProxy::Buffer(frame.heads_low),
                        ResourceProxy::Buffer(frame.pool_low),
                    ],
                );
            }
            Stage::MinGather => {
                let alpha = lines.alpha[self.ping];
                fill(
                    recording,
                    shaders,
                    &mut frame.uniforms,
                    alpha,
                    lines.n_control_points.max(1),
                    wg_counts.fill_alpha,
                );
                recording.dispatch(
                    shaders.min_gather,
                    wg_counts.min_gather,
                    [
                        config_buf,
                        ResourceProxy::Buffer(frame.heads_low),
                        ResourceProxy::Buffer(frame.pool_low),
                        ResourceProxy::Buffer(lines.control_point_lines),
                        ResourceProxy::Buffer(alpha),
                    ],
                );
            }
            Stage::Smooth => {
                let (passes, ping) =
                    smoothing_schedule(setup.smoothing_iterations, setup.laplace_weight, self.ping);
                // Every pass uses one of two weights, upload each weight once.
                let mut weights: Vec<(f32, BufferProxy)> = Vec::with_capacity(2);
                for pass in passes {
                    let params = match weights.iter().find(|(w, _)| *w == pass.weight) {
                        Some((_, buf)) => *buf,
                        None => {
                            let buf = recording.upload_uniform(
                                "smooth_params",
                                bytemuck::bytes_of(&SmoothUniform::new(pass.weight)),
                            );
                            frame.uniforms.push(buf);
                            weights.push((pass.weight, buf));
                            buf
                        }
                    };
                    recording.dispatch(
                        shaders.smooth_alpha,
                        wg_counts.smooth_alpha,
                        [
                            config_buf,
                            ResourceProxy::Buffer(params),
                            ResourceProxy::Buffer(lines.control_point_lines),
                            ResourceProxy::Buffer(lines.alpha[pass.src]),
                            ResourceProxy::Buffer(lines.alpha[pass.dst]),
                        ],
                    );
                }
                self.ping = ping;
            }
            Stage::FadeToVertex => {
                recording.dispatch(
                    shaders.fade_alpha,
                    wg_counts.fade_alpha,
                    [
                        config_buf,
                        ResourceProxy::Buffer(lines.vertices),
                        ResourceProxy::Buffer(lines.alpha[self.ping]),
                        ResourceProxy::Buffer(lines.current_alpha),
                    ],
                );
            }
            Stage::BuildHighRes => {
                fill(
                    recording,
                    shaders,
                    &mut frame.uniforms,
                    frame.heads,
                    sizes.heads.len(),
                    wg_counts.fill_heads,
                );
                recording.clear_all(histogram.counters);
                recording.dispatch(
                    shaders.build_lists,
                    wg_counts.build_lists,
                    [
                        config_buf,
                        ResourceProxy::Buffer(lines.vertices),
                        ResourceProxy::Buffer(histogram.counters),
                        ResourceProxy::Buffer(frame.heads),
                        ResourceProxy::Buffer(frame.pool),
                        ResourceProxy::Buffer(lines.current_alpha),
                    ],
                );
            }
            Stage::SortHighRes => {
                recording.dispatch(
                    shaders.sort_lists,
                    wg_counts.sort_lists,
                    [
                        config_buf,
                        ResourceProxy::Buffer(frame.heads),
                        ResourceProxy::Buffer(frame.pool),
                    ],
                );
            }
            Stage::Histogram => {
                record_histogram(shaders, setup, histogram, frame, recording);
            }
            Stage::Cdf => {
                let params =
                    recording.upload_uniform("cdf_params", bytemuck::bytes_of(&setup.cdf_uniform()));
                frame.uniforms.push(params);
                recording.dispatch(
                    shaders.cdf,
                    wg_counts.cdf,
                    [
                        ResourceProxy::Buffer(params),
                        ResourceProxy::Buffer(frame.bins),
                        ResourceProxy::Buffer(histogram.histogram),
                        ResourceProxy::Buffer(histogram.cdf),
                    ],
                );
            }
            Stage::Damping => {
                recording.dispatch(
                    shaders.exponential_damping,
                    wg_counts.exponential_damping,
                    [
                        config_buf,
                        ResourceProxy::Buffer(histogram.cdf),
                        ResourceProxy::Buffer(histogram.cdf_damped),
                    ],
                );
            }
            Stage::Composite => {
                recording.dispatch(
                    shaders.composite,
                    wg_counts.composite,
                    [
                        config_buf,
                        ResourceProxy::Buffer(frame.heads),
                        ResourceProxy::Buffer(frame.pool),
                        ResourceProxy::Buffer(histogram.cdf_damped),
                        ResourceProxy::Buffer(colormap),
                        ResourceProxy::Buffer(frame.pixels),
                    ],
                );
            }
        }
    }
}

fn fill(
    recording: &mut Recording,
    shaders: &FullShaders,
    uniforms: &mut Vec<BufferProxy>,
    buf: BufferProxy,
    len: u32,
    wg_count: (u32, u32, u32),
) {
    let params = recording.upload_uniform(
        "fill_params",
        bytemuck::bytes_of(&FillUniform::new(len, INVALID_INDEX)),
    );
    uniforms.push(params);
    recording.dispatch(shaders.fill, wg_count, [params, buf]);
}

// Counts the fragments of the full resolution pool into `frame.bins`.
fn record_histogram(
    shaders: &FullShaders,
    setup: &FrameSetup<'_>,
    histogram: &HistogramBuffers,
    frame: &FrameResources,
    recording: &mut Recording,
) {
    debug_assert_eq!(
        frame.indirect.size,
        size_of::<IndirectCount>() as u64,
        "indirect buffer holds one dispatch"
    );
    recording.clear_all(frame.bins);
    recording.dispatch(
        shaders.histogram_setup,
        setup.config.workgroup_counts.histogram_setup,
        [
            ResourceProxy::Buffer(histogram.counters),
            ResourceProxy::Buffer(frame.indirect),
        ],
    );
    recording.dispatch_indirect(
        shaders.histogram,
        frame.indirect,
        0,
        [
            ResourceProxy::Buffer(frame.config_buf),
            ResourceProxy::Buffer(histogram.counters),
            ResourceProxy::Buffer(frame.pool),
            ResourceProxy::Buffer(frame.bins),
        ],
    );
}

// Replaces every fragment's scalar by its CDF value and equalizes the result again.
// Runs after compositing, so the image is not affected.
fn record_normalized_histogram(
    shaders: &FullShaders,
    setup: &FrameSetup<'_>,
    histogram: &HistogramBuffers,
    frame: &mut FrameResources,
    recording: &mut Recording,
) {
    recording.dispatch_indirect(
        shaders.normalize_scalars,
        frame.indirect,
        0,
        [
            ResourceProxy::Buffer(frame.config_buf),
            ResourceProxy::Buffer(histogram.counters),
            ResourceProxy::Buffer(frame.pool),
            ResourceProxy::Buffer(histogram.cdf),
        ],
    );
    record_histogram(shaders, setup, histogram, frame, recording);
    let params = recording.upload_uniform(
        "normalized_cdf_params",
        bytemuck::bytes_of(&setup.normalized_cdf_uniform()),
    );
    frame.uniforms.push(params);
    recording.dispatch(
        shaders.cdf,
        setup.config.workgroup_counts.cdf,
        [
            ResourceProxy::Buffer(params),
            ResourceProxy::Buffer(frame.bins),
            ResourceProxy::Buffer(histogram.normalized_histogram),
            ResourceProxy::Buffer(histogram.normalized_cdf),
        ],
    );
}
