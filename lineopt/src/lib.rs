// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lineopt renders dense sets of 3D lines with [`wgpu`], choosing the opacity of every
//! line automatically so that important lines stay visible through unimportant ones.
//!
//! Every frame builds per-pixel fragment lists of all lines, derives an opacity target
//! for a fixed number of control points along each line from the importance of the
//! fragments in front of and behind them, smooths those targets along the lines, and
//! blends the lines front to back with the resulting opacities. Lines can be colored by
//! a scalar attribute through a colormap, optionally after histogram equalization of
//! the visible scalar values.
//!
//! ## Getting started
//!
//! ```ignore
//! let mut renderer = lineopt::Renderer::new(
//!     &device,
//!     lineopt::RendererOptions {
//!         use_cpu: false,
//!         num_init_threads: NonZeroUsize::new(1),
//!         pipeline_cache: None,
//!     },
//! )?;
//! let lines = lineopt::LineSet::new(&polylines, &importance, &scalar, 2_000)?;
//! renderer.set_lines(&device, &queue, &lines)?;
//! renderer.render_to_texture(
//!     &device,
//!     &queue,
//!     &target_view,
//!     &lineopt::RenderParams {
//!         width,
//!         height,
//!         camera,
//!         dt: 1.0 / 60.0,
//!         background: lineopt::peniko::color::palette::css::WHITE,
//!     },
//! )?;
//! ```
//!
//! The target must be an `Rgba8Unorm` texture with the `STORAGE_BINDING` usage, see
//! [`util::RenderTarget`]. The opacities converge over several frames.
//!
//! Without the `wgpu` feature, [`CpuFrame`] runs the same frames in host memory.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![allow(missing_docs, reason = "We have many as-yet undocumented items.")]
#![allow(
    missing_debug_implementations,
    unnameable_types,
    unreachable_pub,
    clippy::cast_possible_truncation,
    clippy::missing_assert_message,
    reason = "Deferred, only apply in some feature sets so not expect"
)]

mod params;
mod recording;
mod render;
mod shaders;

pub mod cpu;
#[cfg(feature = "wgpu")]
pub mod util;
#[cfg(feature = "wgpu")]
mod wgpu_engine;

pub mod low_level {
    //! Utilities which can be used to drive the frame pipeline without [`Renderer`][crate::Renderer].
    //!
    //! These APIs have not been carefully designed, and might not be powerful enough for this use case.

    pub use crate::recording::{
        BindType, BufferProxy, Command, Dispatch, DispatchSize, ImageProxy, Recording, ResourceId,
        ResourceProxy, ShaderId,
    };
    pub use crate::render::{
        ANTI_DIFFUSION_FACTOR, FrameSetup, HISTOGRAM_BIAS, HistogramBuffers, LineBuffers, Render,
        SmoothPass, identity_cdf, smoothing_schedule,
    };
    pub use crate::shaders::FullShaders;
}

pub use lineopt_encoding::{
    FragmentCounters, HistogramMode, LineSet, LineSetError, Mat4, SegmentError,
};
pub use peniko;
/// Re-export wgpu, for use by consumers.
#[cfg(feature = "wgpu")]
pub use wgpu;
#[cfg(feature = "wgpu-profiler")]
#[doc(hidden)]
pub use wgpu_profiler;

pub use cpu::CpuFrame;
pub use params::{
    Camera, HistogramParams, OpacityParams, RenderParams, StyleParams, default_colormap,
};
pub use render::Stage;

#[cfg(feature = "wgpu")]
use std::num::NonZeroUsize;

#[cfg(feature = "wgpu")]
use peniko::Color;
#[cfg(feature = "wgpu")]
use wgpu::{Device, PipelineCache, Queue, TextureView};
#[cfg(all(feature = "wgpu", feature = "wgpu-profiler"))]
use wgpu_profiler::{GpuProfiler, GpuProfilerSettings};

#[cfg(feature = "wgpu")]
use crate::{
    low_level::{
        BufferProxy, FrameSetup, FullShaders, HistogramBuffers, ImageProxy, LineBuffers,
        Recording, Render,
    },
    params::{HistogramSettings, Settings, pack_colormap},
    wgpu_engine::{Download, ExternalResource, WgpuEngine},
};

use thiserror::Error;

/// Errors that can occur in lineopt.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// There is no available device with the features required by lineopt.
    #[cfg(feature = "wgpu")]
    #[error("Couldn't find suitable device")]
    NoCompatibleDevice,
    /// Used a buffer inside a recording while it was not available.
    /// Check if you have created it and not freed before its last usage.
    #[cfg(feature = "wgpu")]
    #[error("Buffer '{0}' is not available but used for {1}")]
    UnavailableBufferUsed(&'static str, &'static str),
    /// A shader was dispatched before its pipeline was created.
    #[cfg(feature = "wgpu")]
    #[error("Shader '{0}' has no pipeline")]
    MissingPipeline(&'static str),
    /// A shader bound an image that was not supplied to the recording.
    #[cfg(feature = "wgpu")]
    #[error("Image bound by '{0}' was not supplied")]
    MissingImage(&'static str),
    /// Failed to async map a buffer.
    /// See [`wgpu::BufferAsyncError`] for more information.
    #[cfg(feature = "wgpu")]
    #[error("Failed to async map a buffer")]
    BufferAsyncError(#[from] wgpu::BufferAsyncError),
    #[cfg(feature = "wgpu")]
    #[error("wgpu Error from scope")]
    WgpuErrorFromScope(#[from] wgpu::Error),
    /// Failed to download an internal buffer for diagnostics.
    #[cfg(feature = "wgpu")]
    #[error("Failed to download internal buffer '{0}'")]
    DownloadError(&'static str),
    /// See [`wgpu_profiler::CreationError`] for more information.
    #[cfg(feature = "wgpu-profiler")]
    #[error("Couldn't create wgpu profiler")]
    #[doc(hidden)] // End-users of lineopt should not have `wgpu-profiler` enabled.
    ProfilerCreationError(#[from] wgpu_profiler::CreationError),

    /// The histogram segment breakpoints were rejected.
    #[error("Invalid histogram segments")]
    InvalidSegments(#[from] SegmentError),
    /// The line set could not be built.
    #[error("Invalid line set")]
    LineSet(#[from] LineSetError),
}

#[cfg_attr(
    not(feature = "wgpu"),
    expect(dead_code, reason = "this can be unused when wgpu feature is not used")
)]
pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// Intermediate results of the most recent frame.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    /// Biased histogram of the visible scalar values, one entry per bin.
    pub histogram: Vec<f32>,
    pub cdf: Vec<f32>,
    /// The CDF before the most recent frame.
    pub cdf_prev: Vec<f32>,
    /// The CDF used for coloring.
    pub cdf_damped: Vec<f32>,
    /// Histogram of the equalized scalar values, if enabled with
    /// [`HistogramParams::normalized_diagnostics`].
    pub normalized_histogram: Option<Vec<f32>>,
    pub normalized_cdf: Option<Vec<f32>>,
    /// Solved alpha of every control point.
    pub alpha: Vec<f32>,
    /// Displayed alpha of every vertex.
    pub current_alpha: Vec<f32>,
    pub counters_low: FragmentCounters,
    pub counters: FragmentCounters,
}

impl Diagnostics {
    /// Number of fragments discarded in the last frame because a pool was full.
    pub fn dropped_fragments(&self) -> u32 {
        self.counters_low
            .dropped
            .saturating_add(self.counters.dropped)
    }

    pub(crate) fn warn_on_overflow(&self) {
        if self.counters_low.dropped > 0 {
            log::warn!(
                "Low resolution fragment pool overflowed, {} fragments dropped",
                self.counters_low.dropped
            );
        }
        if self.counters.dropped > 0 {
            log::warn!(
                "Fragment pool overflowed, {} fragments dropped",
                self.counters.dropped
            );
        }
    }
}

/// Renders line sets into a texture.
#[cfg(feature = "wgpu")]
pub struct Renderer {
    engine: WgpuEngine,
    shaders: FullShaders,
    settings: Settings,
    lines: LineBuffers,
    histogram: HistogramBuffers,
    colormap: BufferProxy,
    colormap_len: u32,
    /// Index of the alpha buffer holding the solved control point alpha.
    ping: usize,
    /// Uploads and frees to run before the next frame.
    pending: Recording,
    #[cfg(feature = "wgpu-profiler")]
    #[doc(hidden)] // End-users of lineopt should not have `wgpu-profiler` enabled.
    /// Times every stage of a frame. This is *not* treated as public API.
    pub profiler: GpuProfiler,
    #[cfg(feature = "wgpu-profiler")]
    #[doc(hidden)] // End-users of lineopt should not have `wgpu-profiler` enabled.
    /// Stage timings of the most recent finished frame. This is *not* treated as public API.
    pub profile_result: Option<Vec<wgpu_profiler::GpuTimerQueryResult>>,
}
// This is not `Send` (or `Sync`) on WebAssembly as the
// underlying wgpu types are not. This can be enabled with the
// `fragile-send-sync-non-atomic-wasm` feature in wgpu.
// See https://github.com/gfx-rs/wgpu/discussions/4127 for
// further discussion of this topic.
#[cfg(all(feature = "wgpu", not(target_arch = "wasm32")))]
static_assertions::assert_impl_all!(Renderer: Send);

#[cfg(feature = "wgpu")]
/// Options which are set at renderer creation time, used in [`Renderer::new`].
pub struct RendererOptions {
    /// If true, run every compute stage on the CPU.
    ///
    /// Only the final copy into the target texture uses the GPU.
    pub use_cpu: bool,

    /// How many threads to use for initialisation of shaders.
    ///
    /// Use `Some(1)` to use a single thread. This is recommended when on macOS
    /// (see <https://github.com/bevyengine/bevy/pull/10812#discussion_r1496138004>)
    ///
    /// Set to `None` to use a heuristic which will use many but not all threads
    ///
    /// Has no effect on WebAssembly
    pub num_init_threads: Option<NonZeroUsize>,

    /// The pipeline cache to use when creating the shaders.
    ///
    /// For much more discussion of expected usage patterns, see the documentation on that type.
    pub pipeline_cache: Option<PipelineCache>,
}

#[cfg(feature = "wgpu")]
impl Renderer {
    /// Creates a new renderer for the specified device.
    ///
    /// The renderer starts without lines and draws only the background.
    pub fn new(device: &Device, options: RendererOptions) -> Result<Self> {
        let mut engine = WgpuEngine::new(options.use_cpu, options.pipeline_cache);
        // If we are running in parallel (i.e. the number of threads is not 1)
        if options.num_init_threads != NonZeroUsize::new(1) {
            #[cfg(not(target_arch = "wasm32"))]
            engine.use_parallel_initialisation();
        }
        let shaders = shaders::full_shaders(device, &mut engine);
        #[cfg(not(target_arch = "wasm32"))]
        engine.build_shaders_if_needed(device, options.num_init_threads);

        let settings = Settings::default();
        let mut pending = Recording::default();
        let lines = LineBuffers::upload(&mut pending, &[], &[]);
        let histogram = HistogramBuffers::upload(&mut pending, settings.histogram.bins);
        let colors = pack_colormap(&[]);
        let colormap = pending.upload("colormap", bytemuck::cast_slice::<u32, u8>(&colors));
        Ok(Self {
            engine,
            shaders,
            settings,
            lines,
            histogram,
            colormap,
            colormap_len: colors.len() as u32,
            ping: 0,
            pending,
            #[cfg(feature = "wgpu-profiler")]
            profiler: GpuProfiler::new(device, GpuProfilerSettings::default())?,
            #[cfg(feature = "wgpu-profiler")]
            profile_result: None,
        })
    }

    /// Replaces the rendered lines.
    ///
    /// The solved and displayed opacities start over, every line is fully opaque until
    /// the first frames have faded toward the solution.
    pub fn set_lines(&mut self, device: &Device, queue: &Queue, lines: &LineSet) -> Result<()> {
        self.lines.free(&mut self.pending);
        self.lines = LineBuffers::upload(
            &mut self.pending,
            lines.vertices(),
            lines.control_point_lines(),
        );
        self.ping = 0;
        log::debug!(
            "Uploaded {} lines with {} vertices and {} control points",
            lines.n_lines(),
            self.lines.n_vertices,
            self.lines.n_control_points,
        );
        self.flush(device, queue)
    }

    /// Sets the colors looked up by scalar value, an empty slice restores the default.
    pub fn set_colormap(&mut self, colors: &[Color]) {
        let colors = pack_colormap(colors);
        self.pending.free_buffer(self.colormap);
        self.colormap = self
            .pending
            .upload("colormap", bytemuck::cast_slice::<u32, u8>(&colors));
        self.colormap_len = colors.len() as u32;
    }

    pub fn set_opacity_params(&mut self, params: &OpacityParams) {
        self.settings.opacity = *params;
    }

    pub fn set_style_params(&mut self, params: &StyleParams) {
        self.settings.style = *params;
    }

    /// Sets the histogram parameters, rejecting invalid segment breakpoints.
    ///
    /// Changing the number of bins resets every CDF to the identity.
    pub fn set_histogram_params(&mut self, params: &HistogramParams) -> Result<()> {
        let histogram = HistogramSettings::new(params)?;
        if histogram.bins != self.histogram.n_bins {
            self.histogram.free(&mut self.pending);
            self.histogram = HistogramBuffers::upload(&mut self.pending, histogram.bins);
        }
        self.settings.histogram = histogram;
        Ok(())
    }

    /// Renders a frame of the current lines to the target texture.
    ///
    /// The texture is assumed to be of the specified dimensions and have been created with
    /// the [`wgpu::TextureFormat::Rgba8Unorm`] format and the [`wgpu::TextureUsages::STORAGE_BINDING`]
    /// flag set.
    pub fn render_to_texture(
        &mut self,
        device: &Device,
        queue: &Queue,
        texture: &TextureView,
        params: &RenderParams,
    ) -> Result<()> {
        self.flush(device, queue)?;
        let config = self.settings.render_config(
            self.lines.n_vertices,
            self.lines.n_control_points,
            self.colormap_len,
            params,
        );
        let setup = FrameSetup::new(&self.settings, &config);
        let target = ImageProxy::new(params.width, params.height);
        let mut render = Render::new(self.ping);
        let recording = render.record_frame(
            &self.shaders,
            &setup,
            &self.lines,
            &self.histogram,
            self.colormap,
            target,
        );
        let external_resources = [ExternalResource::Image(target, texture)];
        self.engine.run_recording(
            device,
            queue,
            &recording,
            &external_resources,
            "render_to_texture",
            #[cfg(feature = "wgpu-profiler")]
            &mut self.profiler,
        )?;
        self.ping = render.ping();
        #[cfg(feature = "wgpu-profiler")]
        self.end_profiler_frame(queue);
        Ok(())
    }

    #[cfg(feature = "wgpu-profiler")]
    fn end_profiler_frame(&mut self, queue: &Queue) {
        if let Err(err) = self.profiler.end_frame() {
            log::warn!("Dropped the stage timings of a frame: {err:?}");
            return;
        }
        if let Some(result) = self
            .profiler
            .process_finished_frame(queue.get_timestamp_period())
        {
            self.profile_result = Some(result);
        }
    }

    /// Downloads the intermediate results of the most recent frame.
    ///
    /// Mapping the downloads needs the device to be polled, for example by awaiting
    /// this with [`util::block_on_wgpu`].
    pub async fn read_diagnostics(&mut self, device: &Device, queue: &Queue) -> Result<Diagnostics> {
        self.flush(device, queue)?;
        let h = self.histogram;
        let lines = self.lines;
        let normalized = self.settings.histogram.normalized_diagnostics;
        let mut targets = vec![
            h.histogram,
            h.cdf,
            h.cdf_prev,
            h.cdf_damped,
            lines.alpha[self.ping],
            lines.current_alpha,
            h.counters_low,
            h.counters,
        ];
        if normalized {
            targets.extend([h.normalized_histogram, h.normalized_cdf]);
        }
        let mut recording = Recording::default();
        for buf in &targets {
            recording.download(*buf);
        }
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.engine
            .run_recording(
                device,
                queue,
                &recording,
                &[],
                "read_diagnostics",
                #[cfg(feature = "wgpu-profiler")]
                &mut self.profiler,
            )?;
        if let Some(error) = device.pop_error_scope().await {
            return Err(error.into());
        }

        let mut data = Vec::with_capacity(targets.len());
        for buf in targets {
            data.push(self.read_download(buf).await?);
        }
        let floats = |bytes: &[u8]| bytemuck::pod_collect_to_vec::<u8, f32>(bytes);
        let counters = |bytes: &[u8]| {
            bytemuck::pod_read_unaligned::<FragmentCounters>(
                &bytes[..size_of::<FragmentCounters>()],
            )
        };
        let n_vertices = lines.n_vertices as usize;
        let alpha_bits = bytemuck::pod_collect_to_vec::<u8, u32>(&data[4]);
        let mut current_alpha = floats(&data[5]);
        current_alpha.truncate(n_vertices);
        let diagnostics = Diagnostics {
            histogram: floats(&data[0]),
            cdf: floats(&data[1]),
            cdf_prev: floats(&data[2]),
            cdf_damped: floats(&data[3]),
            normalized_histogram: normalized.then(|| floats(&data[8])),
            normalized_cdf: normalized.then(|| floats(&data[9])),
            alpha: cpu::decode(&alpha_bits, lines.n_control_points as usize),
            current_alpha,
            counters_low: counters(&data[6]),
            counters: counters(&data[7]),
        };
        diagnostics.warn_on_overflow();
        Ok(diagnostics)
    }

    async fn read_download(&mut self, buf: BufferProxy) -> Result<Vec<u8>> {
        let download = self
            .engine
            .take_download(buf)
            .ok_or(Error::DownloadError(buf.name))?;
        let buffer = match download {
            Download::Host(bytes) => return Ok(bytes),
            Download::Device(buffer) => buffer,
        };
        let buf_slice = buffer.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        buf_slice.map_async(wgpu::MapMode::Read, move |v| sender.send(v).unwrap());
        receiver
            .receive()
            .await
            .ok_or(Error::DownloadError(buf.name))??;
        let bytes = buf_slice.get_mapped_range()[..buf.size as usize].to_vec();
        Ok(bytes)
    }

    // Runs the uploads and frees recorded since the last frame.
    fn flush(&mut self, device: &Device, queue: &Queue) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let recording = std::mem::take(&mut self.pending);
        self.engine.run_recording(
            device,
            queue,
            &recording,
            &[],
            "upload",
            #[cfg(feature = "wgpu-profiler")]
            &mut self.profiler,
        )
    }
}
