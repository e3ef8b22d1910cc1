// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lineopt tests.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(
    missing_debug_implementations,
    unreachable_pub,
    missing_docs,
    clippy::missing_assert_message,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::allow_attributes_without_reason
)]

use std::env;
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::Result;
use lineopt::peniko::{Color, color::palette};
use lineopt::util::{RenderContext, RenderTarget, block_on_wgpu};
use lineopt::{
    Camera, CpuFrame, Diagnostics, HistogramParams, LineSet, Mat4, OpacityParams, RenderParams,
    Renderer, RendererOptions, StyleParams,
};
use lineopt_encoding::INVALID_INDEX;

// Used in the integration tests.
use lineopt_shaders as _;

pub struct TestParams {
    pub width: u32,
    pub height: u32,
    pub background: Color,
    pub use_cpu: bool,
    pub name: String,
    /// Number of frames rendered before the result is inspected.
    pub frames: u32,
    pub dt: f32,
}

impl TestParams {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: palette::css::WHITE,
            use_cpu: false,
            name: name.into(),
            frames: 1,
            dt: 1.0 / 60.0,
        }
    }

    /// A camera at `z = 3` looking at the origin, seeing about `[-1.7, 1.7]` vertically.
    pub fn camera(&self) -> Camera {
        let aspect = self.width as f32 / self.height.max(1) as f32;
        Camera {
            view: Mat4::look_at([0.0, 0.0, 3.0], [0.0; 3], [0.0, 1.0, 0.0]),
            projection: Mat4::perspective(60_f32.to_radians(), aspect, 0.1, 10.0),
        }
    }

    pub fn render_params(&self) -> RenderParams {
        RenderParams {
            width: self.width,
            height: self.height,
            camera: self.camera(),
            dt: self.dt,
            background: self.background,
        }
    }
}

/// Settings applied to a renderer before the first frame.
#[derive(Clone, Debug, Default)]
pub struct FrameSettings {
    pub opacity: OpacityParams,
    pub style: StyleParams,
    pub histogram: HistogramParams,
}

/// Polylines with their per-vertex attributes, before preprocessing.
#[derive(Clone, Debug, Default)]
pub struct LineScene {
    pub polylines: Vec<Vec<[f32; 3]>>,
    pub importance: Vec<Vec<f32>>,
    pub scalar: Vec<Vec<f32>>,
}

impl LineScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a line with constant importance and a scalar ramping from 0 to 1.
    pub fn add_line(&mut self, points: Vec<[f32; 3]>, importance: f32) -> &mut Self {
        let n = points.len();
        let scalar = (0..n)
            .map(|i| i as f32 / (n.max(2) - 1) as f32)
            .collect();
        self.importance.push(vec![importance; n]);
        self.scalar.push(scalar);
        self.polylines.push(points);
        self
    }

    /// Adds a line whose vertices all carry the same scalar.
    pub fn add_line_with_scalar(
        &mut self,
        points: Vec<[f32; 3]>,
        importance: f32,
        scalar: f32,
    ) -> &mut Self {
        let n = points.len();
        self.importance.push(vec![importance; n]);
        self.scalar.push(vec![scalar; n]);
        self.polylines.push(points);
        self
    }

    /// A horizontal line in front of a vertical one.
    pub fn crossing(front_importance: f32, back_importance: f32) -> Self {
        let mut scene = Self::new();
        scene
            .add_line(straight([-1.0, 0.0, 0.5], [1.0, 0.0, 0.5], 16), front_importance)
            .add_line(straight([0.0, -1.0, -0.5], [0.0, 1.0, -0.5], 16), back_importance);
        scene
    }

    /// `n` horizontal lines stacked in depth, all covering the same pixels.
    pub fn stacked(n: usize, importance: f32) -> Self {
        let mut scene = Self::new();
        for i in 0..n {
            let z = 0.5 - i as f32 / n.max(1) as f32;
            scene.add_line(straight([-1.5, 0.0, z], [1.5, 0.0, z], 8), importance);
        }
        scene
    }

    /// A bundle of helices around the z axis, with importance increasing outward.
    pub fn helix_bundle(n_lines: usize, n_vertices: usize) -> Self {
        let mut scene = Self::new();
        for l in 0..n_lines {
            let phase = l as f32 / n_lines as f32 * std::f32::consts::TAU;
            let radius = 0.3 + 0.7 * (l % 4) as f32 / 3.0;
            let points = (0..n_vertices)
                .map(|i| {
                    let t = i as f32 / (n_vertices - 1) as f32;
                    let angle = phase + t * 3.0 * std::f32::consts::TAU;
                    [radius * angle.cos(), radius * angle.sin(), 1.6 * t - 0.8]
                })
                .collect();
            scene.add_line(points, radius);
        }
        scene
    }

    pub fn line_set(&self, budget: u32) -> Result<LineSet> {
        Ok(LineSet::new(
            &self.polylines,
            &self.importance,
            &self.scalar,
            budget,
        )?)
    }
}

/// `n` evenly spaced points from `a` to `b`.
pub fn straight(a: [f32; 3], b: [f32; 3], n: usize) -> Vec<[f32; 3]> {
    (0..n)
        .map(|i| {
            let t = i as f32 / (n - 1) as f32;
            std::array::from_fn(|k| a[k] + (b[k] - a[k]) * t)
        })
        .collect()
}

/// Renders `params.frames` frames in host memory.
pub fn run_cpu(lines: &LineSet, settings: &FrameSettings, params: &TestParams) -> Result<CpuFrame> {
    let mut frame = CpuFrame::new();
    frame.set_opacity_params(&settings.opacity);
    frame.set_style_params(&settings.style);
    frame.set_histogram_params(&settings.histogram)?;
    frame.set_lines(lines);
    let render_params = params.render_params();
    for _ in 0..params.frames {
        frame.render(&render_params);
    }
    Ok(frame)
}

/// The pixels of the last frame as RGBA8 bytes.
pub fn cpu_rgba(frame: &CpuFrame) -> Vec<u8> {
    frame.pixels().iter().flat_map(|p| p.to_le_bytes()).collect()
}

pub struct GpuResult {
    pub rgba: Vec<u8>,
    pub diagnostics: Diagnostics,
}

pub fn run_gpu_sync(
    lines: &LineSet,
    settings: &FrameSettings,
    params: &TestParams,
) -> Result<GpuResult> {
    pollster::block_on(run_gpu(lines, settings, params))
}

/// Renders `params.frames` frames with the wgpu renderer and reads back the last one.
pub async fn run_gpu(
    lines: &LineSet,
    settings: &FrameSettings,
    params: &TestParams,
) -> Result<GpuResult> {
    let mut context = RenderContext::new();
    let handle = context.device().await?;
    let device = &handle.device;
    let queue = &handle.queue;
    let mut renderer = Renderer::new(
        device,
        RendererOptions {
            use_cpu: params.use_cpu,
            num_init_threads: NonZeroUsize::new(1),
            pipeline_cache: None,
        },
    )?;
    renderer.set_opacity_params(&settings.opacity);
    renderer.set_style_params(&settings.style);
    renderer.set_histogram_params(&settings.histogram)?;
    renderer.set_lines(device, queue, lines)?;
    let target = RenderTarget::new(device, params.width, params.height);
    let render_params = params.render_params();
    for _ in 0..params.frames {
        renderer.render_to_texture(device, queue, &target.view, &render_params)?;
    }
    let rgba = block_on_wgpu(device, target.read_rgba8(device, queue))?;
    let diagnostics = block_on_wgpu(device, renderer.read_diagnostics(device, queue))?;
    debug_output(params, &rgba)?;
    Ok(GpuResult { rgba, diagnostics })
}

/// Writes the image to `debug_outputs` when `LINEOPT_DEBUG_TEST` names the test.
pub fn debug_output(params: &TestParams, rgba: &[u8]) -> Result<()> {
    let suffix = if params.use_cpu { "cpu" } else { "gpu" };
    let name = format!("{}_{suffix}", &params.name);
    let out_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("debug_outputs")
        .join(name)
        .with_extension("png");
    if env_var_relates_to("LINEOPT_DEBUG_TEST", &params.name) {
        if let Some(dir) = out_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        write_png_to_file(params, &out_path, rgba)?;
        println!(
            "Wrote debug result ({}x{}) to {out_path:?}",
            params.width, params.height
        );
    } else {
        match std::fs::remove_file(&out_path) {
            Ok(()) => (),
            Err(e) if e.kind() == ErrorKind::NotFound => (),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

pub fn write_png_to_file(params: &TestParams, out_path: &Path, rgba: &[u8]) -> Result<()> {
    let mut data = Vec::new();
    let mut encoder = png::Encoder::new(&mut data, params.width, params.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(rgba)?;
    writer.finish()?;
    std::fs::write(out_path, &data)?;
    Ok(())
}

/// Determine whether the value of the environment variable `env_var`
/// includes a specific test.
fn env_var_relates_to(env_var: &'static str, name: &str) -> bool {
    if let Ok(val) = env::var(env_var) {
        if val.eq_ignore_ascii_case("all") {
            return true;
        }
        return val.split(',').any(|test| test.eq_ignore_ascii_case(name));
    }
    false
}

/// Largest difference of any channel of any pixel.
pub fn max_channel_difference(a: &[u8], b: &[u8]) -> u8 {
    assert_eq!(a.len(), b.len(), "images differ in size");
    a.iter().zip(b).map(|(x, y)| x.abs_diff(*y)).max().unwrap_or(0)
}

/// Follows a per-pixel list, returning the visited pool indices.
///
/// Returns `None` if the list is longer than `limit`, which means it has a cycle.
pub fn walk_list(head: u32, limit: usize, next: impl Fn(u32) -> u32) -> Option<Vec<u32>> {
    let mut visited = Vec::new();
    let mut ix = head;
    while ix != INVALID_INDEX {
        if visited.len() >= limit {
            return None;
        }
        visited.push(ix);
        ix = next(ix);
    }
    Some(visited)
}
