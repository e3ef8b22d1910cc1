// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::{ConfigUniform, FragmentLowRes, INVALID_INDEX};

use super::CpuBinding;

fn importance_weight(g: f32, lambda: f32) -> f32 {
    let base = (1.0 - g).clamp(0.0, 1.0);
    if lambda <= 0.0 {
        return 1.0;
    }
    if base <= 0.0 {
        return 0.0;
    }
    base.powf(2.0 * lambda)
}

/// Opacity a fragment of importance `g` may have, given the summed squared
/// importance in front of and behind it.
pub fn opacity_target(config: &ConfigUniform, g: f32, front: f32, back: f32) -> f32 {
    let penalty = config.q * back + config.r * front;
    1.0 / (1.0 + importance_weight(g, config.lambda) * penalty)
}

pub fn min_gather_main(
    config: &ConfigUniform,
    heads: &[u32],
    pool: &[FragmentLowRes],
    control_point_lines: &[u32],
    alpha: &mut [u32],
) {
    let n_cp = (config.n_control_points as usize).min(alpha.len());
    let n_pixels = (config.low_width * config.low_height) as usize;
    for &head in &heads[..n_pixels.min(heads.len())] {
        let mut total = 0.0;
        let mut ix = head;
        while ix != INVALID_INDEX {
            let g = pool[ix as usize].importance;
            total += g * g;
            ix = pool[ix as usize].next;
        }
        let mut front = 0.0;
        ix = head;
        while ix != INVALID_INDEX {
            let frag = pool[ix as usize];
            let g2 = frag.importance * frag.importance;
            let back = (total - front - g2).max(0.0);
            let bits = opacity_target(config, frag.importance, front, back).to_bits();
            let cp = frag.alpha_weight.floor().max(0.0) as usize;
            if cp < n_cp {
                alpha[cp] = alpha[cp].min(bits);
                if cp + 1 < n_cp && control_point_lines[cp + 1] == control_point_lines[cp] {
                    alpha[cp + 1] = alpha[cp + 1].min(bits);
                }
            }
            front += g2;
            ix = frag.next;
        }
    }
}

pub fn min_gather(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let config = resources[0].uniform();
    let heads = resources[1].slice();
    let pool = resources[2].slice();
    let control_point_lines = resources[3].slice();
    let mut alpha = resources[4].slice_mut();
    min_gather_main(&config, &heads, &pool, &control_point_lines, &mut alpha);
}
