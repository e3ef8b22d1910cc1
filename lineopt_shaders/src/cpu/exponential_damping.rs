// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::ConfigUniform;

use super::CpuBinding;

pub fn exponential_damping_main(config: &ConfigUniform, cdf: &[f32], damped: &mut [f32]) {
    let n = (config.n_bins as usize).min(damped.len());
    for ix in 0..n {
        let c = cdf[ix];
        damped[ix] = c + (damped[ix] - c) * config.damping;
    }
}

pub fn exponential_damping(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let config = resources[0].uniform();
    let cdf = resources[1].slice();
    let mut damped = resources[2].slice_mut();
    exponential_damping_main(&config, &cdf, &mut damped);
}
