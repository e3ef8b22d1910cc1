// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::{ConfigUniform, Fragment, FragmentCounters};

use super::CpuBinding;
use super::util::remap;

pub fn normalize_scalars_main(
    config: &ConfigUniform,
    counters: &FragmentCounters,
    pool: &mut [Fragment],
    cdf: &[f32],
) {
    let count = (counters.count as usize).min(pool.len());
    for frag in &mut pool[..count] {
        frag.scalar = remap(cdf, frag.scalar, config.n_bins);
    }
}

pub fn normalize_scalars(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let config = resources[0].uniform();
    let counters = resources[1].uniform();
    let mut pool = resources[2].slice_mut();
    let cdf = resources[3].slice();
    normalize_scalars_main(&config, &counters, &mut pool, &cdf);
}
