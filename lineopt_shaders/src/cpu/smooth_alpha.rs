// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::{ConfigUniform, SmoothUniform};

use super::CpuBinding;
use super::util::decode_alpha;

pub fn smooth_alpha_main(
    config: &ConfigUniform,
    params: &SmoothUniform,
    control_point_lines: &[u32],
    alpha_in: &[u32],
    alpha_out: &mut [u32],
) {
    let n = (config.n_control_points as usize).min(alpha_out.len());
    let w = params.weight;
    for ix in 0..n {
        let line_id = control_point_lines[ix];
        let has_prev = ix > 0 && control_point_lines[ix - 1] == line_id;
        let has_next = ix + 1 < n && control_point_lines[ix + 1] == line_id;
        let a = decode_alpha(alpha_in[ix]);
        let result = match (has_prev, has_next) {
            (true, true) => {
                let sum = decode_alpha(alpha_in[ix - 1]) + decode_alpha(alpha_in[ix + 1]);
                a + w * (sum - 2.0 * a)
            }
            (true, false) => a + w * (decode_alpha(alpha_in[ix - 1]) - a),
            (false, true) => a + w * (decode_alpha(alpha_in[ix + 1]) - a),
            (false, false) => a,
        };
        alpha_out[ix] = result.clamp(0.0, 1.0).to_bits();
    }
}

pub fn smooth_alpha(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let config = resources[0].uniform();
    let params = resources[1].uniform();
    let control_point_lines = resources[2].slice();
    let alpha_in = resources[3].slice();
    let mut alpha_out = resources[4].slice_mut();
    smooth_alpha_main(
        &config,
        &params,
        &control_point_lines,
        &alpha_in,
        &mut alpha_out,
    );
}
