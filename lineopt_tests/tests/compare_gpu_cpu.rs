// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests to ensure that the GPU pipeline and the frames run in host memory agree.

// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(
    clippy::missing_assert_message,
    clippy::allow_attributes_without_reason
)]

use anyhow::Result;
use lineopt::HistogramParams;
use lineopt::peniko::color::palette;
use lineopt_tests::{
    FrameSettings, LineScene, TestParams, cpu_rgba, max_channel_difference, run_cpu, run_gpu_sync,
};

fn compare(
    scene: &LineScene,
    budget: u32,
    settings: &FrameSettings,
    mut params: TestParams,
) -> Result<()> {
    let lines = scene.line_set(budget)?;
    let cpu = run_cpu(&lines, settings, &params)?;
    let expected = cpu_rgba(&cpu);

    // The engine's CPU shaders must match exactly, up to the texture round trip.
    params.use_cpu = true;
    let engine_cpu = run_gpu_sync(&lines, settings, &params)?;
    assert!(max_channel_difference(&expected, &engine_cpu.rgba) <= 1);
    assert_eq!(engine_cpu.diagnostics.counters.count, cpu.counters().count);

    params.use_cpu = false;
    let gpu = run_gpu_sync(&lines, settings, &params)?;
    let differing = expected
        .chunks_exact(4)
        .zip(gpu.rgba.chunks_exact(4))
        .filter(|(a, b)| max_channel_difference(a, b) > 16)
        .count();
    let pixels = (params.width * params.height) as usize;
    assert!(
        differing * 100 <= pixels,
        "{differing} of {pixels} pixels differ"
    );
    Ok(())
}

#[test]
#[cfg_attr(skip_gpu_tests, ignore)]
fn compare_helix_bundle() -> Result<()> {
    let mut params = TestParams::new("compare_helix_bundle", 128, 128);
    params.frames = 4;
    compare(
        &LineScene::helix_bundle(24, 96),
        1000,
        &FrameSettings::default(),
        params,
    )
}

#[test]
#[cfg_attr(skip_gpu_tests, ignore)]
fn compare_crossing_without_colormap() -> Result<()> {
    let mut params = TestParams::new("compare_crossing_without_colormap", 64, 64);
    params.background = palette::css::BLACK;
    let settings = FrameSettings {
        histogram: HistogramParams {
            mode: lineopt::HistogramMode::None,
            ..Default::default()
        },
        ..Default::default()
    };
    compare(&LineScene::crossing(0.1, 1.0), 32, &settings, params)
}

#[test]
#[cfg_attr(skip_gpu_tests, ignore)]
fn compare_downscaled_bi_equalization() -> Result<()> {
    let params = TestParams::new("compare_downscaled_bi_equalization", 96, 64);
    let settings = FrameSettings {
        opacity: lineopt::OpacityParams {
            resolution_downscale: 2,
            ..Default::default()
        },
        histogram: HistogramParams {
            mode: lineopt::HistogramMode::BiEqualization,
            bins: 64,
            normalized_diagnostics: true,
            ..Default::default()
        },
        ..Default::default()
    };
    compare(&LineScene::helix_bundle(8, 64), 256, &settings, params)
}

#[test]
#[cfg_attr(skip_gpu_tests, ignore)]
fn gpu_diagnostics_match_cpu() -> Result<()> {
    let lines = LineScene::helix_bundle(12, 64).line_set(300)?;
    let mut params = TestParams::new("gpu_diagnostics_match_cpu", 64, 64);
    params.frames = 2;
    let settings = FrameSettings::default();
    let cpu = run_cpu(&lines, &settings, &params)?.diagnostics();
    let gpu = run_gpu_sync(&lines, &settings, &params)?.diagnostics;

    assert_eq!(gpu.alpha.len(), cpu.alpha.len());
    assert_eq!(gpu.current_alpha.len(), cpu.current_alpha.len());
    assert_eq!(gpu.cdf.len(), cpu.cdf.len());
    assert_eq!(gpu.dropped_fragments(), 0);
    let last = gpu.cdf.len() - 1;
    assert!((gpu.cdf[last] - 1.0).abs() < 1e-6);
    for pair in gpu.cdf.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
    let mean_difference = gpu
        .current_alpha
        .iter()
        .zip(&cpu.current_alpha)
        .map(|(g, c)| (g - c).abs())
        .sum::<f32>()
        / cpu.current_alpha.len() as f32;
    assert!(mean_difference < 0.05, "{mean_difference}");
    Ok(())
}

#[test]
#[cfg_attr(skip_gpu_tests, ignore)]
fn empty_scene_gpu() -> Result<()> {
    // The only line is behind the camera.
    let mut scene = LineScene::new();
    scene.add_line(lineopt_tests::straight([-1.0, 0.0, 5.0], [1.0, 0.0, 5.0], 4), 1.0);
    let params = TestParams::new("empty_scene_gpu", 32, 32);
    let gpu = run_gpu_sync(&scene.line_set(2)?, &FrameSettings::default(), &params)?;
    assert!(gpu.rgba.iter().all(|&c| c == 255));
    assert_eq!(gpu.diagnostics.counters.count, 0);
    Ok(())
}
