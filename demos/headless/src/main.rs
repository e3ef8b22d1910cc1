// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Headless

// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(
    clippy::cast_possible_truncation,
    clippy::allow_attributes_without_reason
)]

use std::f32::consts::TAU;
use std::fs::File;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use lineopt::peniko::color::palette;
use lineopt::util::{RenderContext, RenderTarget, block_on_wgpu};
use lineopt::{
    Camera, CpuFrame, HistogramMode, HistogramParams, LineSet, Mat4, OpacityParams, RenderParams,
    Renderer, RendererOptions,
};

fn main() -> Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::init();
    let args = Args::parse();
    let lines = helix_lines(&args)?;
    let rgba = if args.host {
        render_on_host(&lines, &args)?
    } else {
        pollster::block_on(render(&lines, &args))?
    };
    let out_path = args.out_directory.join("lines").with_extension("png");
    std::fs::create_dir_all(&args.out_directory)?;
    let mut file = File::create(&out_path)?;
    let mut png_encoder = png::Encoder::new(&mut file, args.width, args.height);
    png_encoder.set_color(png::ColorType::Rgba);
    png_encoder.set_depth(png::BitDepth::Eight);
    let mut writer = png_encoder.write_header()?;
    writer.write_image_data(&rgba)?;
    writer.finish()?;
    println!(
        "Wrote result ({}x{}) to {out_path:?}",
        args.width, args.height
    );
    Ok(())
}

/// A bundle of intertwined helices. Importance and scalar grow with the radius.
fn helix_lines(args: &Args) -> Result<LineSet> {
    let n_lines = args.lines.max(1);
    let n_vertices = args.vertices.max(2);
    let mut polylines = Vec::with_capacity(n_lines);
    let mut importance = Vec::with_capacity(n_lines);
    let mut scalar = Vec::with_capacity(n_lines);
    for l in 0..n_lines {
        let phase = l as f32 / n_lines as f32 * TAU;
        let radius = 0.2 + 0.8 * ((l * 7) % n_lines) as f32 / n_lines as f32;
        let points: Vec<[f32; 3]> = (0..n_vertices)
            .map(|i| {
                let t = i as f32 / (n_vertices - 1) as f32;
                let angle = phase + t * args.turns * TAU;
                [radius * angle.cos(), radius * angle.sin(), 2.0 * t - 1.0]
            })
            .collect();
        importance.push(vec![radius; n_vertices]);
        scalar.push(
            (0..n_vertices)
                .map(|i| radius * i as f32 / (n_vertices - 1) as f32)
                .collect(),
        );
        polylines.push(points);
    }
    let minimum = 2 * n_lines as u32;
    let mut budget = args.control_points;
    if budget < minimum {
        log::warn!(
            "{budget} control points are too few for {n_lines} lines, using {minimum} instead"
        );
        budget = minimum;
    }
    Ok(LineSet::new(&polylines, &importance, &scalar, budget)?)
}

fn render_params(args: &Args, time: f32) -> RenderParams {
    let angle = args.orbit * time;
    let eye = [3.0 * angle.sin(), 0.8, 3.0 * angle.cos()];
    RenderParams {
        width: args.width,
        height: args.height,
        camera: Camera {
            view: Mat4::look_at(eye, [0.0; 3], [0.0, 1.0, 0.0]),
            projection: Mat4::perspective(
                45_f32.to_radians(),
                args.width as f32 / args.height.max(1) as f32,
                0.1,
                20.0,
            ),
        },
        dt: 1.0 / args.fps,
        background: palette::css::WHITE,
    }
}

fn opacity_params(args: &Args) -> OpacityParams {
    OpacityParams {
        q: args.q,
        r: args.r,
        lambda: args.lambda,
        resolution_downscale: args.downscale,
        ..Default::default()
    }
}

fn histogram_params(args: &Args) -> HistogramParams {
    HistogramParams {
        mode: args.mode.into(),
        bins: args.bins,
        ..Default::default()
    }
}

async fn render(lines: &LineSet, args: &Args) -> Result<Vec<u8>> {
    let mut context = RenderContext::new();
    let handle = context.device().await?;
    let device = &handle.device;
    let queue = &handle.queue;
    let mut renderer = Renderer::new(
        device,
        RendererOptions {
            use_cpu: args.use_cpu,
            num_init_threads: NonZeroUsize::new(1),
            pipeline_cache: None,
        },
    )?;
    renderer.set_opacity_params(&opacity_params(args));
    renderer.set_histogram_params(&histogram_params(args))?;
    renderer.set_lines(device, queue, lines)?;
    let target = RenderTarget::new(device, args.width, args.height);
    for frame in 0..args.frames.max(1) {
        let params = render_params(args, frame as f32 / args.fps);
        renderer.render_to_texture(device, queue, &target.view, &params)?;
    }
    let diagnostics = block_on_wgpu(device, renderer.read_diagnostics(device, queue))?;
    log::info!(
        "{} fragments, {} dropped",
        diagnostics.counters.count,
        diagnostics.dropped_fragments()
    );
    let rgba = block_on_wgpu(device, target.read_rgba8(device, queue))?;
    #[cfg(feature = "wgpu-profiler")]
    if let Some(timings) = &renderer.profile_result {
        log_timings(timings, 0);
    }
    Ok(rgba)
}

#[cfg(feature = "wgpu-profiler")]
fn log_timings(timings: &[lineopt::wgpu_profiler::GpuTimerQueryResult], depth: usize) {
    for timing in timings {
        if let Some(time) = &timing.time {
            let ms = (time.end - time.start) * 1000.0;
            log::info!("{:indent$}{}: {ms:.3} ms", "", timing.label, indent = 2 * depth);
        }
        log_timings(&timing.nested_queries, depth + 1);
    }
}

fn render_on_host(lines: &LineSet, args: &Args) -> Result<Vec<u8>> {
    let mut frame = CpuFrame::new();
    frame.set_opacity_params(&opacity_params(args));
    frame.set_histogram_params(&histogram_params(args))?;
    frame.set_lines(lines);
    for i in 0..args.frames.max(1) {
        frame.render(&render_params(args, i as f32 / args.fps));
    }
    let diagnostics = frame.diagnostics();
    log::info!(
        "{} fragments, {} dropped",
        diagnostics.counters.count,
        diagnostics.dropped_fragments()
    );
    Ok(frame.pixels().iter().flat_map(|p| p.to_le_bytes()).collect())
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    None,
    Equalization,
    BiEqualization,
    ScalarColor,
}

impl From<Mode> for HistogramMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::None => Self::None,
            Mode::Equalization => Self::Equalization,
            Mode::BiEqualization => Self::BiEqualization,
            Mode::ScalarColor => Self::ScalarColor,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about, long_about = None, bin_name="cargo run -p headless --")]
struct Args {
    #[arg(long, short = 'x', default_value_t = 800)]
    width: u32,
    #[arg(long, short = 'y', default_value_t = 800)]
    height: u32,
    /// Number of helices
    #[arg(long, default_value_t = 200)]
    lines: usize,
    /// Vertices per helix
    #[arg(long, default_value_t = 256)]
    vertices: usize,
    #[arg(long, default_value_t = 2.0)]
    turns: f32,
    /// Total number of control points shared by all lines
    #[arg(long, default_value_t = 4000)]
    control_points: u32,
    /// Frames to render, the opacities fade in over the first frames
    #[arg(long, short, default_value_t = 60)]
    frames: u32,
    #[arg(long, default_value_t = 60.0)]
    fps: f32,
    /// Camera rotation in radians per second
    #[arg(long, default_value_t = 0.3)]
    orbit: f32,
    #[arg(long, default_value_t = 60.0)]
    q: f32,
    #[arg(long, default_value_t = 500.0)]
    r: f32,
    #[arg(long, default_value_t = 1.0)]
    lambda: f32,
    #[arg(long, default_value_t = 1)]
    downscale: u32,
    #[arg(long, value_enum, default_value_t = Mode::Equalization)]
    mode: Mode,
    #[arg(long, default_value_t = 256)]
    bins: u32,
    /// Directory to store the result into
    #[arg(long, default_value_os_t = default_directory())]
    out_directory: PathBuf,
    #[arg(long)]
    /// Whether to use CPU shaders
    use_cpu: bool,
    /// Render without a GPU
    #[arg(long, conflicts_with = "use_cpu")]
    host: bool,
}

fn default_directory() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("outputs")
}
