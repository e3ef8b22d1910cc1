// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Properties of the per-pixel fragment lists.

// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(
    clippy::missing_assert_message,
    clippy::allow_attributes_without_reason
)]

use anyhow::Result;
use lineopt::{CpuFrame, Stage};
use lineopt_shaders::cpu::sort_lists_main;
use lineopt_tests::{FrameSettings, LineScene, TestParams, run_cpu, walk_list};

fn helix_frame(name: &str) -> Result<CpuFrame> {
    let lines = LineScene::helix_bundle(12, 64).line_set(400)?;
    let params = TestParams::new(name, 64, 64);
    run_cpu(&lines, &FrameSettings::default(), &params)
}

#[test]
fn lists_are_sorted_front_to_back() -> Result<()> {
    let frame = helix_frame("lists_are_sorted_front_to_back")?;
    let pool = frame.pool();
    let count = frame.counters().count as usize;
    let mut non_empty = 0;
    for &head in frame.heads() {
        let list = walk_list(head, count, |ix| pool[ix as usize].next).expect("list has a cycle");
        if !list.is_empty() {
            non_empty += 1;
        }
        let mut transmittance = 1.0_f32;
        for pair in list.windows(2) {
            assert!(pool[pair[0] as usize].depth <= pool[pair[1] as usize].depth);
        }
        for &ix in &list {
            let frag = &pool[ix as usize];
            assert!((frag.transmittance - transmittance).abs() < 1e-5);
            transmittance *= 1.0 - frag.transparency;
        }
    }
    assert!(non_empty > 0);
    Ok(())
}

#[test]
fn sorting_twice_changes_nothing() -> Result<()> {
    let frame = helix_frame("sorting_twice_changes_nothing")?;
    let config = *frame.config();
    let mut heads = frame.heads().to_vec();
    let mut pool = frame.pool().to_vec();
    sort_lists_main(&config, &mut heads, &mut pool);
    assert_eq!(heads, frame.heads());
    assert_eq!(pool, frame.pool());
    Ok(())
}

#[test]
fn low_res_lists_are_sorted() -> Result<()> {
    let lines = LineScene::helix_bundle(12, 64).line_set(400)?;
    let params = TestParams::new("low_res_lists_are_sorted", 64, 64);
    let settings = FrameSettings {
        opacity: lineopt::OpacityParams {
            resolution_downscale: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let frame = run_cpu(&lines, &settings, &params)?;
    assert_eq!(frame.config().low_width, 32);
    assert_eq!(frame.heads_low().len(), 32 * 32);
    let pool = frame.pool_low();
    let count = frame.counters_low().count as usize;
    for &head in frame.heads_low() {
        let list = walk_list(head, count, |ix| pool[ix as usize].next).expect("list has a cycle");
        for pair in list.windows(2) {
            assert!(pool[pair[0] as usize].depth <= pool[pair[1] as usize].depth);
        }
    }
    Ok(())
}

#[test]
fn full_pool_drops_fragments() -> Result<()> {
    // Every line covers whole rows of a tiny image, far more than the pools hold.
    let lines = LineScene::stacked(64, 0.5).line_set(128)?;
    let params = TestParams::new("full_pool_drops_fragments", 8, 8);
    let frame = run_cpu(&lines, &FrameSettings::default(), &params)?;
    let config = *frame.config();

    let counters = frame.counters();
    assert_eq!(counters.count, config.capacity);
    assert!(counters.dropped > 0);
    let counters_low = frame.counters_low();
    assert_eq!(counters_low.count, config.low_capacity);
    assert!(counters_low.dropped > 0);

    let diagnostics = frame.diagnostics();
    assert_eq!(
        diagnostics.dropped_fragments(),
        counters.dropped + counters_low.dropped
    );

    // The stored fragments still form well formed lists.
    let pool = frame.pool();
    let mut seen = vec![false; counters.count as usize];
    for &head in frame.heads() {
        let list = walk_list(head, seen.len(), |ix| pool[ix as usize].next)
            .expect("list has a cycle");
        for ix in list {
            assert!((ix as usize) < seen.len());
            assert!(!seen[ix as usize], "fragment {ix} is in two lists");
            seen[ix as usize] = true;
        }
    }
    assert!(seen.iter().all(|&s| s));
    Ok(())
}

#[test]
fn stages_run_in_order() -> Result<()> {
    let lines = LineScene::crossing(0.5, 0.5).line_set(32)?;
    let params = TestParams::new("stages_run_in_order", 32, 32);
    let mut frame = run_cpu(&lines, &FrameSettings::default(), &params)?;

    let mut stages = Vec::new();
    frame.render_observed(&params.render_params(), |stage, _| stages.push(stage));
    assert_eq!(stages, Stage::ALL);

    frame.set_histogram_params(&lineopt::HistogramParams {
        mode: lineopt::HistogramMode::None,
        ..Default::default()
    })?;
    stages.clear();
    frame.render_observed(&params.render_params(), |stage, _| stages.push(stage));
    let expected: Vec<Stage> = Stage::ALL
        .into_iter()
        .filter(|s| !matches!(s, Stage::Histogram | Stage::Cdf | Stage::Damping))
        .collect();
    assert_eq!(stages, expected);
    Ok(())
}

#[test]
fn fragments_follow_the_camera() -> Result<()> {
    // A line through the middle of the screen covers the middle rows only.
    let mut scene = LineScene::new();
    scene.add_line(lineopt_tests::straight([-2.0, 0.0, 0.0], [2.0, 0.0, 0.0], 8), 1.0);
    let lines = scene.line_set(16)?;
    let params = TestParams::new("fragments_follow_the_camera", 16, 16);
    let frame = run_cpu(&lines, &FrameSettings::default(), &params)?;
    for (ix, &head) in frame.heads().iter().enumerate() {
        let y = ix / 16;
        let covered = head != lineopt_encoding::INVALID_INDEX;
        assert_eq!(covered, (6..10).contains(&y), "row {y}");
    }
    Ok(())
}
