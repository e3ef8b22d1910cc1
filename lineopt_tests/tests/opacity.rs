// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Properties of the solved line opacities.

// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(
    clippy::missing_assert_message,
    clippy::allow_attributes_without_reason
)]

use anyhow::Result;
use lineopt::{CpuFrame, LineSet, OpacityParams};
use lineopt_tests::{FrameSettings, LineScene, TestParams, cpu_rgba, run_cpu};

fn solve(lines: &LineSet, opacity: OpacityParams, name: &str) -> Result<CpuFrame> {
    let params = TestParams::new(name, 64, 64);
    let settings = FrameSettings {
        opacity,
        ..Default::default()
    };
    run_cpu(lines, &settings, &params)
}

/// Smallest solved alpha among the control points of `line`.
fn min_alpha(frame: &CpuFrame, lines: &LineSet, line: u32) -> f32 {
    frame
        .alpha()
        .iter()
        .zip(lines.control_point_lines())
        .filter(|&(_, &l)| l == line)
        .map(|(&a, _)| a)
        .fold(1.0, f32::min)
}

#[test]
fn no_penalty_keeps_lines_opaque() -> Result<()> {
    let lines = LineScene::helix_bundle(8, 48).line_set(200)?;
    let opacity = OpacityParams {
        q: 0.0,
        r: 0.0,
        ..Default::default()
    };
    let frame = solve(&lines, opacity, "no_penalty_keeps_lines_opaque")?;
    assert_eq!(frame.alpha().len(), 200);
    for alpha in frame.alpha() {
        assert!((alpha - 1.0).abs() < 1e-6, "{alpha}");
    }
    for &alpha in frame.current_alpha() {
        assert!((alpha - 1.0).abs() < 1e-6, "{alpha}");
    }
    Ok(())
}

#[test]
fn unimportant_front_line_fades_with_q() -> Result<()> {
    let lines = LineScene::crossing(0.1, 1.0).line_set(32)?;
    let mut previous = 1.0;
    for q in [1.0, 10.0, 100.0] {
        let opacity = OpacityParams {
            q,
            r: 0.0,
            ..Default::default()
        };
        let frame = solve(&lines, opacity, "unimportant_front_line_fades_with_q")?;
        let front = min_alpha(&frame, &lines, 0);
        assert!(front < previous, "q = {q}: {front} >= {previous}");
        previous = front;
        // The important line behind is never penalized.
        assert!((min_alpha(&frame, &lines, 1) - 1.0).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn unimportant_back_line_fades_with_r() -> Result<()> {
    let lines = LineScene::crossing(1.0, 0.1).line_set(32)?;
    let mut previous = 1.0;
    for r in [1.0, 10.0, 100.0] {
        let opacity = OpacityParams {
            q: 0.0,
            r,
            ..Default::default()
        };
        let frame = solve(&lines, opacity, "unimportant_back_line_fades_with_r")?;
        let back = min_alpha(&frame, &lines, 1);
        assert!(back < previous, "r = {r}: {back} >= {previous}");
        previous = back;
        assert!((min_alpha(&frame, &lines, 0) - 1.0).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn displayed_alpha_fades_toward_solution() -> Result<()> {
    let lines = LineScene::crossing(0.1, 1.0).line_set(32)?;
    let mut params = TestParams::new("displayed_alpha_fades_toward_solution", 64, 64);
    params.frames = 1;
    let settings = FrameSettings::default();
    let mut frame = run_cpu(&lines, &settings, &params)?;
    let solved = min_alpha(&frame, &lines, 0);
    assert!(solved < 0.9);
    let min_current = |frame: &CpuFrame| {
        frame
            .current_alpha()
            .iter()
            .zip(lines.vertices())
            .filter(|(_, v)| v.line_id == 0)
            .map(|(&a, _)| a)
            .fold(1.0, f32::min)
    };
    let mut previous = min_current(&frame);
    assert!(previous < 1.0);
    for _ in 0..20 {
        frame.render(&params.render_params());
        let current = min_current(&frame);
        assert!(current <= previous);
        assert!(current >= solved - 1e-4);
        previous = current;
    }
    Ok(())
}

#[test]
fn empty_scene_is_background() -> Result<()> {
    let params = TestParams::new("empty_scene_is_background", 16, 16);
    let mut frame = CpuFrame::new();
    frame.render(&params.render_params());
    let rgba = cpu_rgba(&frame);
    assert_eq!(rgba.len(), 16 * 16 * 4);
    assert!(rgba.iter().all(|&c| c == 255));
    Ok(())
}
