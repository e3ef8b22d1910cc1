// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::{FragmentCounters, IndirectCount, WORKGROUP_SIZE};

use super::CpuBinding;

pub fn histogram_setup_main(counters: &FragmentCounters, indirect: &mut IndirectCount) {
    indirect.count_x = counters.count.div_ceil(WORKGROUP_SIZE);
    indirect.count_y = 1;
    indirect.count_z = 1;
}

pub fn histogram_setup(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let counters = resources[0].uniform();
    let mut indirect = resources[1].typed_mut();
    histogram_setup_main(&counters, &mut indirect);
}
