// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::{ConfigUniform, Vertex};

use super::CpuBinding;
use super::util::{decode_alpha, mix};

pub fn fade_alpha_main(
    config: &ConfigUniform,
    vertices: &[Vertex],
    alpha: &[u32],
    current_alpha: &mut [f32],
) {
    let n_cp = config.n_control_points as usize;
    if n_cp == 0 {
        return;
    }
    let n = (config.n_vertices as usize).min(current_alpha.len());
    for ix in 0..n {
        let w = vertices[ix].alpha_weight.max(0.0);
        let cp = (w.floor() as usize).min(n_cp - 1);
        let mut goal = decode_alpha(alpha[cp]);
        if cp + 1 < n_cp {
            goal = mix(goal, decode_alpha(alpha[cp + 1]), w.fract());
        }
        let current = current_alpha[ix];
        current_alpha[ix] = current + config.fade_rate * (goal - current);
    }
}

pub fn fade_alpha(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let config = resources[0].uniform();
    let vertices = resources[1].slice();
    let alpha = resources[2].slice();
    let mut current_alpha = resources[3].slice_mut();
    fade_alpha_main(&config, &vertices, &alpha, &mut current_alpha);
}
