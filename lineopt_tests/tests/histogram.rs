// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Properties of the histogram equalization and its temporal damping.

// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(
    clippy::missing_assert_message,
    clippy::allow_attributes_without_reason
)]

use anyhow::Result;
use lineopt::low_level::{HISTOGRAM_BIAS, identity_cdf};
use lineopt::{CpuFrame, HistogramMode, HistogramParams, LineSet};
use lineopt_encoding::{CdfUniform, ConfigUniform, Segments, distribute_control_points};
use lineopt_shaders::cpu::{cdf_main, exponential_damping_main};
use lineopt_tests::{FrameSettings, LineScene, TestParams, run_cpu};

const BINS: [u32; 8] = [5, 1, 0, 2, 3, 0, 4, 1];

fn run_cdf(bins: &[u32], segments: &Segments) -> Vec<f32> {
    let n = bins.len();
    let params = CdfUniform::new(n as u32, 0.0, segments);
    let mut histogram = vec![0.0; n];
    let mut cdf = vec![0.0; n];
    cdf_main(&params, bins, &mut histogram, &mut cdf);
    cdf
}

fn helix_lines() -> Result<LineSet> {
    // Scalars ramp along every line, so the histogram is far from flat on screen.
    LineScene::helix_bundle(16, 64).line_set(512)
}

fn equalized_frame(histogram: HistogramParams, name: &str) -> Result<CpuFrame> {
    let params = TestParams::new(name, 64, 64);
    let settings = FrameSettings {
        histogram,
        ..Default::default()
    };
    run_cpu(&helix_lines()?, &settings, &params)
}

// Fragments that are not part of a halo.
fn line_fragments(frame: &CpuFrame) -> usize {
    let count = frame.counters().count as usize;
    frame.pool()[..count].iter().filter(|f| !f.is_halo()).count()
}

#[test]
fn cdf_is_monotone_and_ends_at_one() -> Result<()> {
    let frame = equalized_frame(
        HistogramParams {
            bins: 64,
            ..Default::default()
        },
        "cdf_is_monotone_and_ends_at_one",
    )?;
    let cdf = frame.cdf();
    assert_eq!(cdf.len(), 64);
    assert!(frame.bins().iter().sum::<u32>() > 0);
    for pair in cdf.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
    assert!(cdf.iter().all(|c| (0.0..=1.0).contains(c)));
    assert_eq!(cdf[63], 1.0);
    Ok(())
}

#[test]
fn bi_equalization_splits_at_half() -> Result<()> {
    let cdf = run_cdf(&BINS, &HistogramMode::BiEqualization.breakpoints(&Segments::full()));
    // The lower half ends exactly at bin n/2 - 1.
    assert_eq!(cdf[3], 0.5);
    assert_eq!(cdf[7], 1.0);
    assert!(cdf[..4].iter().all(|&c| c <= 0.5));
    assert!(cdf[4..].iter().all(|&c| c > 0.5));
    // 5 of the 8 samples of the lower half are in the first bin.
    assert!((cdf[0] - 0.5 * 5.0 / 8.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn two_segments_equal_bi_equalization() -> Result<()> {
    let segments = Segments::new(&[0.0, 0.5, 1.0])?;
    assert_eq!(
        run_cdf(&BINS, &segments),
        run_cdf(&BINS, &HistogramMode::BiEqualization.breakpoints(&segments))
    );

    let bi = equalized_frame(
        HistogramParams {
            mode: HistogramMode::BiEqualization,
            bins: 32,
            ..Default::default()
        },
        "two_segments_equal_bi_equalization",
    )?;
    let segmented = equalized_frame(
        HistogramParams {
            mode: HistogramMode::SegmentedEqualization,
            bins: 32,
            segments: vec![0.0, 0.5, 1.0],
            ..Default::default()
        },
        "two_segments_equal_bi_equalization",
    )?;
    assert_eq!(bi.cdf(), segmented.cdf());
    assert_eq!(bi.pixels(), segmented.pixels());
    Ok(())
}

#[test]
fn segmented_frame_respects_every_breakpoint() -> Result<()> {
    let frame = equalized_frame(
        HistogramParams {
            mode: HistogramMode::SegmentedEqualization,
            bins: 13,
            segments: vec![0.0, 0.2, 0.7, 1.0],
            ..Default::default()
        },
        "segmented_frame_respects_every_breakpoint",
    )?;
    let cdf = frame.cdf();
    assert!(frame.bins().iter().sum::<u32>() > 0);
    assert!(cdf.windows(2).all(|w| w[0] <= w[1]));
    // round(0.2 * 13) = 3 and round(0.7 * 13) = 9.
    for (last_bin, breakpoint) in [(2, 0.2), (8, 0.7), (12, 1.0)] {
        assert!((cdf[last_bin] - breakpoint).abs() < 1e-6, "bin {last_bin}");
    }
    assert!(cdf[..3].iter().all(|&c| c <= 0.2 + 1e-6));
    assert!(cdf[3..9].iter().all(|&c| c > 0.2 && c <= 0.7 + 1e-6));
    assert!(cdf[9..].iter().all(|&c| c > 0.7));
    Ok(())
}

#[test]
fn single_occupied_bin_gives_identity() {
    let cdf = run_cdf(&[0, 0, 7, 0], &Segments::full());
    assert_eq!(cdf, identity_cdf(4));
}

#[test]
fn damping_converges_exponentially() {
    let n_bins = 16;
    let config = ConfigUniform {
        n_bins,
        damping: 0.8,
        ..Default::default()
    };
    let identity = identity_cdf(n_bins);
    let target: Vec<f32> = identity.iter().map(|x| x * x).collect();
    let mut damped = identity.clone();
    for frame in 1..=30 {
        exponential_damping_main(&config, &target, &mut damped);
        let k = 0.8_f32.powi(frame);
        for ((&d, &c), &i) in damped.iter().zip(&target).zip(&identity) {
            assert!((d - (c + (i - c) * k)).abs() < 1e-5);
        }
    }
}

#[test]
fn damping_impulse_decays_geometrically() {
    let config = ConfigUniform {
        n_bins: 4,
        damping: 0.5,
        ..Default::default()
    };
    let identity = identity_cdf(4);
    let impulse = [1.0; 4];
    let mut damped = identity.clone();
    exponential_damping_main(&config, &impulse, &mut damped);
    let mut deviation: Vec<f32> = damped.iter().zip(&identity).map(|(d, i)| d - i).collect();
    for _ in 0..8 {
        exponential_damping_main(&config, &identity, &mut damped);
        for ((&d, &i), dev) in damped.iter().zip(&identity).zip(&mut deviation) {
            *dev *= 0.5;
            assert!((d - i - *dev).abs() < 1e-6);
        }
    }
}

#[test]
fn damped_cdf_trails_the_cdf() -> Result<()> {
    let mut params = TestParams::new("damped_cdf_trails_the_cdf", 64, 64);
    params.frames = 3;
    let settings = FrameSettings::default();
    let frame = run_cpu(&helix_lines()?, &settings, &params)?;
    // The scene is static, so the CDF is the same every frame.
    assert_eq!(frame.cdf(), frame.cdf_prev());
    let identity = identity_cdf(frame.cdf().len() as u32);
    let mut moved = false;
    for ((&d, &c), &i) in frame.cdf_damped().iter().zip(frame.cdf()).zip(&identity) {
        assert!(d >= c.min(i) - 1e-6 && d <= c.max(i) + 1e-6);
        moved |= (d - i).abs() > 1e-4;
    }
    assert!(moved);
    Ok(())
}

#[test]
fn changing_bins_resets_the_cdf() -> Result<()> {
    let mut frame = equalized_frame(HistogramParams::default(), "changing_bins_resets_the_cdf")?;
    frame.set_histogram_params(&HistogramParams {
        bins: 16,
        ..Default::default()
    })?;
    assert_eq!(frame.cdf(), identity_cdf(16));
    assert_eq!(frame.cdf_damped(), identity_cdf(16));
    Ok(())
}

#[test]
fn normalized_diagnostics_count_every_fragment() -> Result<()> {
    let frame = equalized_frame(
        HistogramParams {
            bins: 16,
            normalized_diagnostics: true,
            damping_halflife: 0.0,
            ..Default::default()
        },
        "normalized_diagnostics_count_every_fragment",
    )?;
    let diagnostics = frame.diagnostics();
    let histogram = diagnostics.normalized_histogram.expect("enabled");
    let cdf = diagnostics.normalized_cdf.expect("enabled");
    assert_eq!(histogram.len(), 16);
    // Unbiased, so the bins add up to the number of line fragments.
    let total: f32 = histogram.iter().sum();
    assert_eq!(total, line_fragments(&frame) as f32);
    assert_eq!(cdf[15], 1.0);
    Ok(())
}

#[test]
fn control_point_budget_is_spent_exactly() -> Result<()> {
    assert_eq!(distribute_control_points(&[10.0, 5.0, 1.0], 12), [7, 3, 2]);

    let mut scene = LineScene::new();
    for length in [10.0, 5.0, 1.0] {
        scene.add_line(lineopt_tests::straight([0.0; 3], [length, 0.0, 0.0], 4), 1.0);
    }
    let lines = scene.line_set(12)?;
    assert_eq!(lines.n_control_points(), 12);
    assert_eq!(lines.control_points_per_line(), [7, 3, 2]);
    assert!(scene.line_set(5).is_err());
    Ok(())
}

#[test]
fn halos_are_not_counted() -> Result<()> {
    let frame = equalized_frame(HistogramParams::default(), "halos_are_not_counted")?;
    let count = frame.counters().count as usize;
    let halos = frame.pool()[..count].iter().filter(|f| f.is_halo()).count();
    assert!(halos > 0);
    let counted = frame.bins().iter().sum::<u32>() as usize;
    assert_eq!(counted, count - halos);
    Ok(())
}

#[test]
fn scalar_color_keeps_the_histogram_current() -> Result<()> {
    let frame = equalized_frame(
        HistogramParams {
            mode: HistogramMode::ScalarColor,
            bins: 16,
            ..Default::default()
        },
        "scalar_color_keeps_the_histogram_current",
    )?;
    let counted = frame.bins().iter().sum::<u32>();
    assert!(counted > 0);
    assert_eq!(counted as usize, line_fragments(&frame));

    let diagnostics = frame.diagnostics();
    assert_eq!(diagnostics.histogram.len(), 16);
    for (&h, &b) in diagnostics.histogram.iter().zip(frame.bins()) {
        assert_eq!(h, b as f32 + HISTOGRAM_BIAS);
    }
    // The colormap is addressed by the raw scalar, the CDF is never computed.
    assert_eq!(diagnostics.cdf, identity_cdf(16));
    assert_eq!(diagnostics.cdf_damped, identity_cdf(16));
    Ok(())
}
