// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::CdfUniform;

use super::CpuBinding;

// First bin at or after a breakpoint.
fn breakpoint_bin(b: f32, n_bins: u32) -> u32 {
    ((b * n_bins as f32 + 0.5).floor() as u32).min(n_bins)
}

pub fn cdf_main(params: &CdfUniform, bins: &[u32], histogram: &mut [f32], cdf: &mut [f32]) {
    let n = params.n_bins as usize;
    for i in 0..n {
        histogram[i] = bins[i] as f32 + params.bias;
    }
    let n_breakpoints = (params.n_breakpoints as usize).min(params.breakpoints.len());
    for s in 0..n_breakpoints.saturating_sub(1) {
        let b0 = params.breakpoints[s];
        let b1 = params.breakpoints[s + 1];
        let start = breakpoint_bin(b0, params.n_bins) as usize;
        let end = breakpoint_bin(b1, params.n_bins) as usize;
        if end <= start {
            continue;
        }
        let total: f32 = histogram[start..end].iter().sum();
        let occupied = bins[start..end].iter().filter(|&&b| b != 0).count();
        let degenerate = occupied <= 1 || total <= 0.0;
        let len = (end - start) as f32;
        let mut acc = 0.0;
        for i in start..end {
            let mut value = 1.0;
            if i + 1 < end {
                if degenerate {
                    value = (i + 1 - start) as f32 / len;
                } else {
                    acc += histogram[i];
                    value = acc / total;
                }
            }
            cdf[i] = b0 + (b1 - b0) * value;
        }
    }
}

pub fn cdf(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let params = resources[0].uniform();
    let bins = resources[1].slice();
    let mut histogram = resources[2].slice_mut();
    let mut cdf = resources[3].slice_mut();
    cdf_main(&params, &bins, &mut histogram, &mut cdf);
}
