// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::{ConfigUniform, Fragment, FragmentCounters};

use super::CpuBinding;

pub fn histogram_main(
    config: &ConfigUniform,
    counters: &FragmentCounters,
    pool: &[Fragment],
    bins: &mut [u32],
) {
    let n_bins = config.n_bins.min(bins.len() as u32);
    if n_bins == 0 {
        return;
    }
    let count = (counters.count as usize).min(pool.len());
    // Halos are drawn in the halo color, their scalar is never seen.
    for frag in pool[..count].iter().filter(|frag| !frag.is_halo()) {
        let s = frag.scalar.clamp(0.0, 1.0);
        let bin = ((s * n_bins as f32).floor() as u32).min(n_bins - 1);
        bins[bin as usize] += 1;
    }
}

pub fn histogram(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let config = resources[0].uniform();
    let counters = resources[1].uniform();
    let pool = resources[2].slice();
    let mut bins = resources[3].slice_mut();
    histogram_main(&config, &counters, &pool, &mut bins);
}
